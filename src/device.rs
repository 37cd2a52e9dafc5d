// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Compute device selection.
use std::fmt;
use std::str::FromStr;

/// Hardware device for inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    /// CPU (Central Processing Unit).
    Cpu,
    /// CUDA (Compute Unified Device Architecture) for NVIDIA GPUs.
    /// The argument specifies the device index (e.g., 0 for the first GPU).
    Cuda(usize),
}

impl Device {
    /// Pick the device a run executes on.
    ///
    /// An explicit request wins. Otherwise CUDA is used when the crate was
    /// built with the `cuda` feature and the provider reports itself
    /// available; everything else runs on the CPU.
    #[must_use]
    pub fn resolve(requested: Option<Self>) -> Self {
        if let Some(device) = requested {
            return device;
        }
        if cuda_available() {
            Self::Cuda(0)
        } else {
            Self::Cpu
        }
    }

    /// True for any CUDA device.
    #[must_use]
    pub const fn is_cuda(self) -> bool {
        matches!(self, Self::Cuda(_))
    }
}

#[cfg(feature = "cuda")]
fn cuda_available() -> bool {
    use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};
    CUDAExecutionProvider::default().is_available().unwrap_or(false)
}

#[cfg(not(feature = "cuda"))]
const fn cuda_available() -> bool {
    false
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(i) => write!(f, "cuda:{i}"),
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.to_lowercase();
        if s == "cpu" {
            return Ok(Self::Cpu);
        }
        s.strip_prefix("cuda").map_or_else(
            || Err(format!("Unknown device: {s} (expected cpu, cuda or cuda:N)")),
            |rest| {
                if rest.is_empty() {
                    return Ok(Self::Cuda(0));
                }
                parse_device_index(rest)
                    .map(Self::Cuda)
                    .ok_or_else(|| format!("Invalid CUDA device index: {rest}"))
            },
        )
    }
}

/// Helper to parse device index from string (e.g. ":0")
fn parse_device_index(s: &str) -> Option<usize> {
    s.strip_prefix(':')
        .and_then(|index_str| index_str.parse::<usize>().ok())
}
