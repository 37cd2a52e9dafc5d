// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Console logging macros shared by the pipeline stages.
//!
//! Progress lines go through [`verbose!`](crate::verbose) and
//! [`section!`](crate::section) so that `--verbose false` leaves only
//! results, warnings and errors on the terminal. The macros format their
//! arguments and hand them to [`emit`], which owns colouring and stream
//! choice.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;

/// Global verbosity flag.
static VERBOSE: AtomicBool = AtomicBool::new(true);

/// Set the global verbosity flag.
pub fn set_verbose(verbose: bool) {
    VERBOSE.store(verbose, Ordering::Relaxed);
}

/// Check if verbose output is enabled.
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// Kind of console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Plain stdout line, always shown.
    Info,
    /// Yellow prefix on stderr.
    Warn,
    /// Red prefix on stderr.
    Error,
    /// Green tick on stdout.
    Success,
    /// Plain stdout line, hidden unless verbose.
    Verbose,
    /// Blank line plus cyan bold header, hidden unless verbose.
    Section,
}

impl Level {
    /// True when lines of this kind are printed under the current verbosity.
    #[must_use]
    pub fn enabled(self) -> bool {
        !matches!(self, Self::Verbose | Self::Section) || is_verbose()
    }
}

/// Print one formatted line at `level`.
pub fn emit(level: Level, args: fmt::Arguments<'_>) {
    if !level.enabled() {
        return;
    }
    match level {
        Level::Info | Level::Verbose => println!("{args}"),
        Level::Warn => eprintln!("{} {args}", "WARNING ⚠️".yellow().bold()),
        Level::Error => eprintln!("{} {args}", "Error:".red().bold()),
        Level::Success => println!("{} {args}", "✅".green()),
        Level::Section => {
            println!();
            println!("{}", args.to_string().cyan().bold());
        }
    }
}

/// Macro for standard info messages.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::cli::logging::emit($crate::cli::logging::Level::Info, format_args!($($arg)*))
    };
}

/// Macro for warning messages.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::cli::logging::emit($crate::cli::logging::Level::Warn, format_args!($($arg)*))
    };
}

/// Macro for error messages.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::cli::logging::emit($crate::cli::logging::Level::Error, format_args!($($arg)*))
    };
}

/// Macro for success messages.
#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {
        $crate::cli::logging::emit($crate::cli::logging::Level::Success, format_args!($($arg)*))
    };
}

/// Macro for verbose messages.
#[macro_export]
macro_rules! verbose {
    ($($arg:tt)*) => {
        $crate::cli::logging::emit($crate::cli::logging::Level::Verbose, format_args!($($arg)*))
    };
}

/// Macro for section headers.
#[macro_export]
macro_rules! section {
    ($($arg:tt)*) => {
        $crate::cli::logging::emit($crate::cli::logging::Level::Section, format_args!($($arg)*))
    };
}
