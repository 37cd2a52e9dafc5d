// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! The flat results manifest (`Results.txt`).
//!
//! One line per image whose detections are present:
//!
//! ```text
//! val2019p/20180824-13-47-39-2.jpg;milk,cola,cola,:
//! ```
//!
//! Every class name is followed by a comma and the line ends with `": \n"`.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{DetectError, Result};
use crate::labels::ClassLabels;
use crate::results::Detection;

/// Image path as written into the manifest, with `strip_prefix` removed
/// when the path starts with it.
#[must_use]
pub fn normalize_path<'a>(path: &'a Path, strip_prefix: Option<&str>) -> Cow<'a, str> {
    let text = path.to_string_lossy();
    match strip_prefix {
        Some(prefix) if !prefix.is_empty() && text.starts_with(prefix) => {
            Cow::Owned(text[prefix.len()..].to_string())
        }
        _ => text,
    }
}

/// Format one manifest line, newline included.
///
/// # Errors
///
/// Returns [`DetectError::AnnotationError`] when a detection's class has no label.
pub fn format_line(path: &str, detections: &[Detection], labels: &ClassLabels) -> Result<String> {
    let mut line = String::with_capacity(path.len() + 4 + detections.len() * 8);
    line.push_str(path);
    line.push(';');
    for det in detections {
        line.push_str(labels.name(det.cls_pred)?);
        line.push(',');
    }
    line.push_str(": \n");
    Ok(line)
}

/// Truncated on creation, then append-only.
#[derive(Debug)]
pub struct ResultsManifest {
    path: PathBuf,
    writer: BufWriter<File>,
    lines: usize,
}

impl ResultsManifest {
    /// Create (or truncate) the manifest at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::IoError`] if the file can't be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| {
            DetectError::IoError(format!("Failed to create manifest {}: {e}", path.display()))
        })?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            lines: 0,
        })
    }

    /// Append the line for one image.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::AnnotationError`] for an unlabelled class and
    /// [`DetectError::IoError`] if the write fails; nothing is written in
    /// either case.
    pub fn write_record(
        &mut self,
        path: &str,
        detections: &[Detection],
        labels: &ClassLabels,
    ) -> Result<()> {
        let line = format_line(path, detections, labels)?;
        self.writer.write_all(line.as_bytes()).map_err(|e| {
            DetectError::IoError(format!("Failed to write {}: {e}", self.path.display()))
        })?;
        self.lines += 1;
        Ok(())
    }

    /// Lines written so far.
    #[must_use]
    pub const fn lines(&self) -> usize {
        self.lines
    }

    /// Manifest location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush buffered lines to disk.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::IoError`] if the flush fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(|e| {
            DetectError::IoError(format!("Failed to flush {}: {e}", self.path.display()))
        })
    }

    /// Flush and close, returning the number of lines written.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::IoError`] if the final flush fails.
    pub fn finish(mut self) -> Result<usize> {
        self.flush()?;
        Ok(self.lines)
    }
}
