// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Image folder input and the batch iterator.
//!
//! [`ImageFolder`] lists the images of one directory in sorted order and
//! hands them out as preprocessed [`Batch`]es. Iteration is lazy: an image
//! is decoded only when its batch is requested.

use std::path::{Path, PathBuf};

use ndarray::{Array3, Array4};
use rayon::prelude::*;

use crate::error::{DetectError, Result};
use crate::preprocessing::{load_image, preprocess_image, stack_batch};

/// Extensions treated as images.
const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "bmp", "gif", "webp", "tiff", "tif"];

/// One network batch.
///
/// Images that fail to decode are left out of `paths` and `tensor` and
/// reported in `failed`, so one bad file never costs its neighbours.
#[derive(Debug)]
pub struct Batch {
    /// Image paths in batch order.
    pub paths: Vec<PathBuf>,
    /// `(N, 3, S, S)` tensor in `[0, 1]`.
    pub tensor: Array4<f32>,
    /// Images of this chunk that could not be loaded.
    pub failed: Vec<(PathBuf, DetectError)>,
}

impl Batch {
    /// Number of images in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// True for a batch without images.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Sorted image files of a single directory.
#[derive(Debug, Clone)]
pub struct ImageFolder {
    dir: PathBuf,
    img_size: usize,
    paths: Vec<PathBuf>,
}

impl ImageFolder {
    /// List the images directly under `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::ImageError`] if `dir` is not a directory and
    /// [`DetectError::Io`] if it cannot be read.
    pub fn open<P: AsRef<Path>>(dir: P, img_size: usize) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(DetectError::ImageError(format!(
                "Not a directory: {}",
                dir.display()
            )));
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_image_file(path))
            .collect();
        paths.sort();

        Ok(Self {
            dir: dir.to_path_buf(),
            img_size,
            paths,
        })
    }

    /// The listed directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Image paths in iteration order.
    #[must_use]
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Number of images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// True when the folder holds no images.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Iterate over the folder in batches of `batch_size` (the last one may
    /// be shorter).
    ///
    /// `workers > 0` decodes each batch on a dedicated pool of that many
    /// threads; the batch contents are the same either way. Calling this
    /// again restarts from the first image.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::ConfigError`] for a zero batch size and
    /// [`DetectError::IoError`] if the decode pool cannot be built.
    pub fn batches(&self, batch_size: usize, workers: usize) -> Result<Batches<'_>> {
        if batch_size == 0 {
            return Err(DetectError::ConfigError(
                "batch_size must be at least 1".to_string(),
            ));
        }
        let pool = if workers > 0 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|i| format!("decode-{i}"))
                    .build()
                    .map_err(|e| {
                        DetectError::IoError(format!("Failed to build decode pool: {e}"))
                    })?,
            )
        } else {
            None
        };

        Ok(Batches {
            chunks: self.paths.chunks(batch_size),
            img_size: self.img_size,
            pool,
        })
    }
}

/// Lazy iterator returned by [`ImageFolder::batches`].
pub struct Batches<'a> {
    chunks: std::slice::Chunks<'a, PathBuf>,
    img_size: usize,
    pool: Option<rayon::ThreadPool>,
}

impl Batches<'_> {
    fn load(&self, paths: &[PathBuf]) -> Result<Batch> {
        let img_size = self.img_size;
        let decode = move |path: &PathBuf| -> Result<Array3<f32>> {
            let image = load_image(path)?;
            preprocess_image(&image, img_size)
        };

        let decoded: Vec<Result<Array3<f32>>> = match &self.pool {
            Some(pool) => pool.install(|| paths.par_iter().map(decode).collect()),
            None => paths.iter().map(decode).collect(),
        };

        let mut kept = Vec::with_capacity(paths.len());
        let mut images = Vec::with_capacity(paths.len());
        let mut failed = Vec::new();
        for (path, result) in paths.iter().zip(decoded) {
            match result {
                Ok(image) => {
                    kept.push(path.clone());
                    images.push(image);
                }
                Err(e) => failed.push((path.clone(), e)),
            }
        }

        let tensor = if images.is_empty() {
            Array4::zeros((0, 3, self.img_size, self.img_size))
        } else {
            stack_batch(&images)?
        };
        Ok(Batch {
            paths: kept,
            tensor,
            failed,
        })
    }
}

impl Iterator for Batches<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let paths = self.chunks.next()?;
        Some(self.load(paths))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl std::fmt::Debug for Batches<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batches")
            .field("remaining", &self.chunks.len())
            .field("img_size", &self.img_size)
            .field("workers", &self.pool.as_ref().map(rayon::ThreadPool::current_num_threads))
            .finish()
    }
}

/// Check if a path is an image file based on extension.
fn is_image_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| {
        let ext = ext.to_string_lossy().to_lowercase();
        IMAGE_EXTENSIONS.contains(&ext.as_str())
    })
}
