// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Window display of an annotated result.

use std::time::Duration;

use image::RgbImage;
use minifb::{Key, Window, WindowOptions};

use crate::error::{DetectError, Result};
use crate::visualizer::Color;

/// A simple image viewer using minifb.
pub struct Viewer {
    window: Window,
    width: usize,
    height: usize,
    buffer: Vec<u32>,
}

impl Viewer {
    /// Open a window sized to `image` and show it.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::VisualizerError`] if the window can't be created.
    pub fn new(title: &str, image: &RgbImage) -> Result<Self> {
        let (width, height) = (image.width() as usize, image.height() as usize);
        let mut window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: true,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| DetectError::VisualizerError(format!("Failed to create window: {e}")))?;

        // ~60 fps
        window.set_target_fps(60);

        let buffer = image
            .pixels()
            .map(|p| Color::new(p[0], p[1], p[2]).to_u32())
            .collect();

        Ok(Self {
            window,
            width,
            height,
            buffer,
        })
    }

    fn should_close(&self) -> bool {
        !self.window.is_open()
            || self.window.is_key_down(Key::Escape)
            || self.window.is_key_down(Key::Q)
    }

    /// Redraw the image once. Returns `false` once the user closed the window.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::VisualizerError`] if the frame can't be drawn.
    pub fn update(&mut self) -> Result<bool> {
        if self.should_close() {
            return Ok(false);
        }
        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)
            .map_err(|e| DetectError::VisualizerError(format!("Failed to update window: {e}")))?;
        Ok(true)
    }

    /// Keep the window open until it is closed or Esc/Q is pressed, or
    /// until `timeout` elapses when one is given.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::VisualizerError`] if a frame can't be drawn.
    pub fn run(&mut self, timeout: Option<Duration>) -> Result<()> {
        let start = std::time::Instant::now();
        while self.update()? {
            if timeout.is_some_and(|t| start.elapsed() >= t) {
                break;
            }
        }
        Ok(())
    }
}
