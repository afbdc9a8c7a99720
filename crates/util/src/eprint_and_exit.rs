//! Defines [eprintln_and_exit].

/// The equivalent to calling [eprintln], then calling [std::process::exit]
/// with an exit code of `1`.
///
/// Useful for exiting gracefully with an error message from a binary's `main`.
#[macro_export]
macro_rules! eprintln_and_exit {
    ($($arg:tt)*) => {{
        eprintln!($($arg)*);
        ::std::process::exit(1);
    }};
}
