// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Colors and on-screen display of results.

/// Color definitions and the box palette.
pub mod color;

#[cfg(feature = "visualize")]
pub mod viewer;

pub use color::{Color, TAB20B, sample_colors};

#[cfg(feature = "visualize")]
pub use viewer::Viewer;
