// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Class label file loading.

use std::fs;
use std::path::Path;

use crate::error::{DetectError, Result};

/// Ordered class names, one per line of the label file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabels {
    names: Vec<String>,
}

impl ClassLabels {
    /// Load labels from a newline-separated file.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::IoError`] if the file can't be read and
    /// [`DetectError::ConfigError`] if it holds no names.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            DetectError::IoError(format!(
                "Failed to read class names {}: {e}",
                path.display()
            ))
        })?;
        Self::parse(&text).map_err(|_| {
            DetectError::ConfigError(format!("No class names in {}", path.display()))
        })
    }

    /// Parse labels from text. Trailing whitespace and trailing blank lines
    /// are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::ConfigError`] if no names remain.
    pub fn parse(text: &str) -> Result<Self> {
        let mut names: Vec<String> = text.lines().map(|l| l.trim_end().to_string()).collect();
        while names.last().is_some_and(String::is_empty) {
            names.pop();
        }
        if names.is_empty() {
            return Err(DetectError::ConfigError(
                "Class label list is empty".to_string(),
            ));
        }
        Ok(Self { names })
    }

    /// Build labels from names already in memory.
    #[must_use]
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Name of the class at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Name of the class at `index`, or an error naming the bad index.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::AnnotationError`] when `index` is out of range.
    pub fn name(&self, index: usize) -> Result<&str> {
        self.get(index).ok_or_else(|| {
            DetectError::AnnotationError(format!(
                "Class index {index} out of range for {} labels",
                self.names.len()
            ))
        })
    }

    /// Number of labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True when there are no labels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// All names in order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }
}
