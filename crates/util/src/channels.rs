//! This module contains [request_channel], a queue-based two-way message
//! passing system for one thread making requests and another responding.

pub mod request_channel;

use thiserror::Error;

/// An alias for a [Result] that has [ChannelError] as the error type.
pub type ChannelResult<T> = Result<T, ChannelError>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChannelError {
    #[error("One side of the connection was dropped.")]
    ConnectionDropped,
    #[error("A response has already been received for this request.")]
    ResponseAlreadyReceived,
}

const THREAD_PANIC_MSG: &str = "Another thread panicked while holding a resource this one needs.";
