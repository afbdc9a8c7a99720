//! Small general purpose tools shared by the other crates in this workspace.

pub mod channels;
pub mod debug_log;
pub mod drop_join_thread;
mod eprint_and_exit;
