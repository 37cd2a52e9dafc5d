// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Resolved run options.
//!
//! [`RunOptions`] is built once from the command line and then only read.

use std::path::{Path, PathBuf};

use crate::checkpoint::Checkpoint;
use crate::device::Device;
use crate::download::{AssetPlan, DATASET_URL};
use crate::error::Result;
use crate::inference::InferenceConfig;

/// Everything a demo run needs to know.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Directory of validation images.
    pub image_folder: PathBuf,
    /// Darknet model definition.
    pub model_def: PathBuf,
    /// Newline-separated class names.
    pub class_path: PathBuf,
    /// Selected weights.
    pub checkpoint: Checkpoint,
    /// Directory holding both checkpoint files.
    pub checkpoint_dir: PathBuf,
    /// Thresholds, batch geometry and threads.
    pub config: InferenceConfig,
    /// Where annotated PNGs are written.
    pub output_dir: PathBuf,
    /// Results manifest.
    pub results_path: PathBuf,
    /// Prefix removed from image paths before they enter the manifest.
    pub strip_prefix: Option<String>,
    /// Dataset archive URL.
    pub dataset_url: String,
    /// Domain-translated checkpoint URL.
    pub domain_translated_url: String,
    /// Non-domain-translated checkpoint URL.
    pub non_domain_translated_url: String,
    /// Skip the asset fetcher.
    pub skip_download: bool,
    /// Requested device, `None` for automatic selection.
    pub device: Option<Device>,
    /// Display a random annotated image at the end.
    pub show: bool,
    /// Abort on the first per-image failure.
    pub fail_fast: bool,
    /// Seed for colour sampling and the presenter.
    pub seed: Option<u64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            image_folder: PathBuf::from("val2019p"),
            model_def: PathBuf::from("config/yolov3-custom.cfg"),
            class_path: PathBuf::from("data/custom/classes.names"),
            checkpoint: Checkpoint::DomainTranslated,
            checkpoint_dir: PathBuf::from("."),
            config: InferenceConfig::default(),
            output_dir: PathBuf::from("output"),
            results_path: PathBuf::from("Results.txt"),
            strip_prefix: None,
            dataset_url: DATASET_URL.to_string(),
            domain_translated_url: Checkpoint::DomainTranslated.default_url().to_string(),
            non_domain_translated_url: Checkpoint::NonDomainTranslated.default_url().to_string(),
            skip_download: false,
            device: None,
            show: true,
            fail_fast: false,
            seed: None,
        }
    }
}

impl RunOptions {
    /// Path of the selected checkpoint file.
    #[must_use]
    pub fn checkpoint_path(&self) -> PathBuf {
        self.checkpoint.path_in(&self.checkpoint_dir)
    }

    /// Download URL configured for a checkpoint variant.
    #[must_use]
    pub fn checkpoint_url(&self, checkpoint: Checkpoint) -> &str {
        match checkpoint {
            Checkpoint::DomainTranslated => &self.domain_translated_url,
            Checkpoint::NonDomainTranslated => &self.non_domain_translated_url,
        }
    }

    /// The archive is fetched next to the image folder as `<folder>.zip`.
    #[must_use]
    pub fn archive_path(&self) -> PathBuf {
        let mut name = self
            .image_folder
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "dataset".into());
        name.push(".zip");
        self.image_folder.with_file_name(name)
    }

    /// Assets the fetcher downloads for these options.
    #[must_use]
    pub fn asset_plan(&self) -> AssetPlan {
        AssetPlan {
            dataset_url: self.dataset_url.clone(),
            archive_path: self.archive_path(),
            extract_dir: self.image_folder.clone(),
            checkpoints: Checkpoint::ALL
                .iter()
                .map(|&c| (self.checkpoint_url(c).to_string(), c.path_in(&self.checkpoint_dir)))
                .collect(),
        }
    }

    /// Image path as written into the manifest.
    #[must_use]
    pub fn manifest_path<'a>(&self, path: &'a Path) -> std::borrow::Cow<'a, str> {
        crate::manifest::normalize_path(path, self.strip_prefix.as_deref())
    }

    /// Check option combinations that cannot run.
    ///
    /// # Errors
    ///
    /// Forwards [`InferenceConfig::validate`] failures.
    pub fn validate(&self) -> Result<()> {
        self.config.validate()
    }
}
