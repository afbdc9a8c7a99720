//! Contains tools for debug-mode logging.
//!
//! Logging cannot be enabled when `cfg!(debug_assertions)` is false, otherwise
//! it's enabled by default. All three macros funnel into [emit], which decides
//! on colors, the output stream and whether an error should panic.

use std::fmt::{self, Arguments, Display, Formatter};
use std::io::{self, IsTerminal, Write};
use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Log some info to stdout if both `cfg!(debug_assertions)` and [enabled] are
/// true.
#[macro_export]
macro_rules! debug_log_info {
    ($($arg:tt)*) => {{
        #[cfg(debug_assertions)]
        if $crate::debug_log::enabled() {
            $crate::debug_log::emit(
                $crate::debug_log::Level::Info,
                ::std::module_path!(),
                ::std::format_args!($($arg)*),
            );
        }
    }};
}

/// Log a warning to stderr if both `cfg!(debug_assertions)` and [enabled] are
/// true.
#[macro_export]
macro_rules! debug_log_warning {
    ($($arg:tt)*) => {{
        #[cfg(debug_assertions)]
        if $crate::debug_log::enabled() {
            $crate::debug_log::emit(
                $crate::debug_log::Level::Warning,
                ::std::module_path!(),
                ::std::format_args!($($arg)*),
            );
        }
    }};
}

/// Log an error to stderr if both `cfg!(debug_assertions)` and [enabled] are
/// true.
///
/// If [panic_on_errors::enabled] is also true, the thread panics after the
/// message is written.
#[macro_export]
macro_rules! debug_log_error {
    ($($arg:tt)*) => {{
        #[cfg(debug_assertions)]
        if $crate::debug_log::enabled() {
            $crate::debug_log::emit(
                $crate::debug_log::Level::Error,
                ::std::module_path!(),
                ::std::format_args!($($arg)*),
            );
        }
    }};
}

/// The severity of a debug log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl Level {
    /// The ANSI escape code used to color this level's name.
    const fn color(self) -> &'static str {
        match self {
            Level::Info => "\x1b[35m",
            Level::Warning => "\x1b[33m",
            Level::Error => "\x1b[31m",
        }
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        })
    }
}

/// Whether logging is enabled or not.
///
/// Logging cannot be enabled when `cfg!(debug_assertions)` is false, otherwise
/// it's enabled by default.
#[inline(always)]
pub fn enabled() -> bool {
    LOGGING.get()
}

/// Disable logging.
pub fn disable() {
    LOGGING.set(false);
}

/// Enable logging.
///
/// Trying to manually enable logging when `cfg!(debug_assertions)` is false
/// will result in the program panicking.
pub fn enable() {
    LOGGING.set(true);
}

/// Whether [crate::debug_log_error] panics after writing its message. This is
/// on by default in debug builds (and can't be turned on otherwise).
pub mod panic_on_errors {
    use super::PANIC_ON_ERRORS;

    /// [super::enabled] must also be true for this to have any effect.
    pub fn enabled() -> bool {
        PANIC_ON_ERRORS.get()
    }

    pub fn disable() {
        PANIC_ON_ERRORS.set(false);
    }

    pub fn enable() {
        PANIC_ON_ERRORS.set(true);
    }
}

/// A runtime on/off switch that always reads as off without
/// `debug_assertions`.
struct Switch {
    on: AtomicBool,
    name: &'static str,
}

impl Switch {
    const fn new(name: &'static str, on: bool) -> Self {
        Self {
            on: AtomicBool::new(on),
            name,
        }
    }

    #[inline(always)]
    fn get(&self) -> bool {
        cfg!(debug_assertions) && self.on.load(Ordering::Relaxed)
    }

    fn set(&self, on: bool) {
        if on && !cfg!(debug_assertions) {
            panic!("{} can't be enabled without `debug_assertions`.", self.name);
        }
        self.on.store(on, Ordering::Relaxed);
    }
}

static LOGGING: Switch = Switch::new("Debug logging", true);
static PANIC_ON_ERRORS: Switch = Switch::new("Panicking on logged errors", true);

/// Write one log message. Info goes to stdout, everything else to stderr.
///
/// This function gets called by the debug log macros (e.g. [debug_log_info])
/// and generally shouldn't be called directly.
#[track_caller]
pub fn emit(level: Level, module: &str, message: Arguments<'_>) {
    let is_terminal = match level {
        Level::Info => io::stdout().is_terminal(),
        Level::Warning | Level::Error => io::stderr().is_terminal(),
    };
    let (blue, color, reset_color) = if is_terminal {
        ("\x1b[34m", level.color(), "\x1b[0m")
    } else {
        ("", "", "")
    };

    let where_and_when = where_and_when(module, blue, reset_color);
    let line = format!(
        "{blue}DEBUG LOG{reset_color} [{color}{level}{reset_color}]: {message}\n{where_and_when}\n"
    );

    // A failed write to stdout/stderr has nowhere better to be reported.
    _ = match level {
        Level::Info => io::stdout().lock().write_all(line.as_bytes()),
        Level::Warning | Level::Error => io::stderr().lock().write_all(line.as_bytes()),
    };

    if level == Level::Error && panic_on_errors::enabled() {
        panic!("Panicking on error logging enabled.");
    }
}

/// The location of the caller, the module that logged, and the time this was
/// called, all as strings.
#[track_caller]
fn where_and_when(module: &str, color: &str, reset_color: &str) -> String {
    let now = OffsetDateTime::now_utc();

    let loc = Location::caller();
    let where_ = format!("{}:{}:{}", loc.file(), loc.line(), loc.column());

    let when = now
        .format(&Rfc3339)
        .unwrap_or_else(|e| format!("Unknown time: {e}"));

    format!("\tWhere:  {color}{where_}{reset_color}\n")
        + format!("\tModule: {color}{module}{reset_color}\n").as_str()
        + format!("\tTime:   {color}{when}{reset_color}").as_str()
}
