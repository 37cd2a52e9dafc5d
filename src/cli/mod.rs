// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Command-line interface of the demo.
//!
//! Argument parsing, console logging and the end-to-end run behind the
//! `retail-yolo-demo` binary.

// Modules
/// CLI arguments.
pub mod args;

/// The demo run.
pub mod demo;

/// Console logging macros.
pub mod logging;
