// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Showing one random annotated result.

use std::path::{Path, PathBuf};

use rand::Rng;
use rand::seq::SliceRandom;

use crate::error::{DetectError, Result};

/// Pick one regular file of `dir` uniformly at random.
///
/// # Errors
///
/// Returns [`DetectError::NothingToShow`] if `dir` is missing, unreadable
/// or holds no regular files.
pub fn pick_random_output<R: Rng + ?Sized>(dir: &Path, rng: &mut R) -> Result<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Err(DetectError::NothingToShow(dir.to_path_buf()));
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    // read_dir order is platform-dependent; sort so a seed picks the same file
    files.sort();

    files
        .choose(rng)
        .cloned()
        .ok_or_else(|| DetectError::NothingToShow(dir.to_path_buf()))
}

/// Announce the chosen file and display it.
///
/// With the `visualize` feature this opens a window and blocks until it is
/// closed; otherwise only the announcement is printed.
///
/// # Errors
///
/// Returns [`DetectError::ImageError`] if the file can't be decoded and
/// [`DetectError::VisualizerError`] if the window fails.
pub fn present(path: &Path, domain_translated: bool) -> Result<()> {
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    crate::info!("domain translated model = {domain_translated}");
    crate::info!("Showing detections for: {name}");
    show(path, &name)
}

#[cfg(feature = "visualize")]
fn show(path: &Path, title: &str) -> Result<()> {
    let image = crate::preprocessing::load_image(path)?.into_rgb8();
    match window_or_warn(crate::visualizer::Viewer::new(title, &image), path) {
        Some(mut viewer) => viewer.run(None),
        None => Ok(()),
    }
}

/// A window that cannot be opened (no display) is not a failed run.
#[cfg(any(feature = "visualize", test))]
fn window_or_warn<T>(window: Result<T>, path: &Path) -> Option<T> {
    match window {
        Ok(window) => Some(window),
        Err(e) => {
            crate::warn!("{e}; open {} to view the result", path.display());
            None
        }
    }
}

#[cfg(not(feature = "visualize"))]
fn show(path: &Path, _title: &str) -> Result<()> {
    crate::verbose!(
        "Built without the visualize feature; open {} to view it",
        path.display()
    );
    Ok(())
}
