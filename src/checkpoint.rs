// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Checkpoint variants shipped with the demo.

use std::fmt;
use std::path::{Path, PathBuf};

/// Published location of the domain-translated checkpoint.
pub const DOMAIN_TRANSLATED_URL: &str =
    "https://www.dropbox.com/s/wveb53yauo63qzg/yolov3_ckpt_6.pth?dl=1";

/// Published location of the checkpoint trained without domain translation.
pub const NON_DOMAIN_TRANSLATED_URL: &str =
    "https://www.dropbox.com/s/4culeqpjhthj5x7/checkpointmodel2.pth?dl=1";

/// Which pretrained weights the detector runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Checkpoint {
    /// Trained on synthetic images translated to the checkout domain.
    DomainTranslated,
    /// Trained on the untranslated synthetic images.
    NonDomainTranslated,
}

impl Checkpoint {
    /// All variants, in download order.
    pub const ALL: [Self; 2] = [Self::DomainTranslated, Self::NonDomainTranslated];

    /// Map the `--domain_translated_model` switch to a variant.
    #[must_use]
    pub const fn from_domain_flag(domain_translated: bool) -> Self {
        if domain_translated {
            Self::DomainTranslated
        } else {
            Self::NonDomainTranslated
        }
    }

    /// True for [`Checkpoint::DomainTranslated`].
    #[must_use]
    pub const fn is_domain_translated(self) -> bool {
        matches!(self, Self::DomainTranslated)
    }

    /// File name of the checkpoint inside the checkpoint directory.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::DomainTranslated => "domain_translated_model.onnx",
            Self::NonDomainTranslated => "non_domain_translated_model.onnx",
        }
    }

    /// Default download URL.
    #[must_use]
    pub const fn default_url(self) -> &'static str {
        match self {
            Self::DomainTranslated => DOMAIN_TRANSLATED_URL,
            Self::NonDomainTranslated => NON_DOMAIN_TRANSLATED_URL,
        }
    }

    /// Path of the checkpoint file under `dir`.
    #[must_use]
    pub fn path_in(self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DomainTranslated => write!(f, "domain-translated"),
            Self::NonDomainTranslated => write!(f, "non-domain-translated"),
        }
    }
}
