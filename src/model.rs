// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Detector loading and the forward pass.
//!
//! [`Detector`] wraps an ONNX Runtime session holding an export of the
//! Darknet network. The inference loop only sees the [`Network`] trait, so a
//! stand-in network can drive the rest of the pipeline in tests.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use ndarray::{Array3, Array4};
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::TensorRef;

use crate::darknet::ModelDefinition;
use crate::device::Device;
use crate::error::{DetectError, Result};
use crate::inference::InferenceConfig;

/// Anything that maps an `(N, 3, S, S)` batch to `(N, rows, 5 + classes)`
/// predictions in input-pixel coordinates.
pub trait Network {
    /// Run one forward pass.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::InferenceError`] if the backend fails.
    fn forward(&mut self, input: &Array4<f32>) -> Result<Array3<f32>>;
}

/// A Darknet detector running through ONNX Runtime.
pub struct Detector {
    /// ONNX Runtime session.
    session: Session,
    /// Input tensor name.
    input_name: String,
    /// Output tensor name.
    output_name: String,
    /// Classes predicted by the definition's heads.
    num_classes: usize,
    /// Square input side.
    img_size: usize,
    /// Device the session was built for.
    device: Device,
}

impl Detector {
    /// Load a checkpoint and check it against the model definition.
    ///
    /// # Arguments
    ///
    /// * `definition` - Parsed Darknet definition.
    /// * `checkpoint` - ONNX export of the trained network.
    /// * `config` - Supplies the input size and intra-op thread count.
    /// * `device` - Where the session runs.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::ModelLoadError`] if the checkpoint is missing or
    /// unreadable and [`DetectError::IncompatibleCheckpoint`] if its shapes
    /// disagree with `definition` or `config.imgsz`.
    pub fn load(
        definition: &ModelDefinition,
        checkpoint: &Path,
        config: &InferenceConfig,
        device: Device,
    ) -> Result<Self> {
        if !checkpoint.exists() {
            return Err(DetectError::ModelLoadError(format!(
                "Checkpoint not found: {}",
                checkpoint.display()
            )));
        }
        if is_pytorch_checkpoint(checkpoint) {
            return Err(DetectError::ModelLoadError(format!(
                "{} is a PyTorch checkpoint, not an ONNX export; export it with \
                 torch.onnx.export or point the checkpoint URLs at ONNX files",
                checkpoint.display()
            )));
        }

        #[allow(unused_mut)]
        let mut builder = Session::builder().map_err(|e| {
            DetectError::ModelLoadError(format!("Failed to create session builder: {e}"))
        })?;

        #[cfg(feature = "cuda")]
        if let Device::Cuda(index) = device {
            use ort::execution_providers::CUDAExecutionProvider;
            builder = builder
                .with_execution_providers([CUDAExecutionProvider::default()
                    .with_device_id(i32::try_from(index).unwrap_or(0))
                    .build()])
                .map_err(|e| {
                    DetectError::ModelLoadError(format!("Failed to register CUDA EP: {e}"))
                })?;
        }

        let session = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                DetectError::ModelLoadError(format!("Failed to set optimization level: {e}"))
            })?
            .with_intra_threads(config.num_threads)
            .map_err(|e| {
                DetectError::ModelLoadError(format!("Failed to set intra-thread count: {e}"))
            })?
            .commit_from_file(checkpoint)
            .map_err(|e| {
                DetectError::ModelLoadError(format!(
                    "Failed to load checkpoint {}: {e}",
                    checkpoint.display()
                ))
            })?;

        let input = session.inputs.first().ok_or_else(|| {
            DetectError::IncompatibleCheckpoint("Checkpoint declares no inputs".to_string())
        })?;
        let output = session.outputs.first().ok_or_else(|| {
            DetectError::IncompatibleCheckpoint("Checkpoint declares no outputs".to_string())
        })?;

        let input_shape: Vec<i64> = input
            .input_type
            .tensor_shape()
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        let output_shape: Vec<i64> = output
            .output_type
            .tensor_shape()
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        check_shapes(definition, config.imgsz, &input_shape, &output_shape)?;

        let detector = Self {
            input_name: input.name.clone(),
            output_name: output.name.clone(),
            session,
            num_classes: definition.num_classes(),
            img_size: config.imgsz,
            device,
        };
        crate::verbose!(
            "Loaded {} ({} classes, {}x{} input) on {device}; network in eval mode",
            checkpoint.display(),
            detector.num_classes,
            detector.img_size,
            detector.img_size,
        );
        Ok(detector)
    }

    /// Number of classes the network predicts.
    #[must_use]
    pub const fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Square input side.
    #[must_use]
    pub const fn img_size(&self) -> usize {
        self.img_size
    }

    /// Device the session runs on.
    #[must_use]
    pub const fn device(&self) -> Device {
        self.device
    }
}

impl Network for Detector {
    fn forward(&mut self, input: &Array4<f32>) -> Result<Array3<f32>> {
        let input_contiguous = input.as_standard_layout();
        let input_tensor = TensorRef::from_array_view(&input_contiguous).map_err(|e| {
            DetectError::InferenceError(format!("Failed to create input tensor: {e}"))
        })?;

        let inputs = ort::inputs![self.input_name.as_str() => input_tensor];
        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| DetectError::InferenceError(format!("Inference failed: {e}")))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            DetectError::InferenceError(format!("Output '{}' not found", self.output_name))
        })?;
        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectError::InferenceError(format!("Failed to extract output: {e}")))?;

        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        let &[batch, rows, features] = dims.as_slice() else {
            return Err(DetectError::InferenceError(format!(
                "Expected a 3-D output, got shape {dims:?}"
            )));
        };
        Array3::from_shape_vec((batch, rows, features), data.to_vec())
            .map_err(|e| DetectError::InferenceError(format!("Bad output buffer: {e}")))
    }
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("input", &self.input_name)
            .field("output", &self.output_name)
            .field("num_classes", &self.num_classes)
            .field("img_size", &self.img_size)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

/// `.pth` files are zip archives (torch >= 1.6) or bare pickles.
fn is_pytorch_checkpoint(path: &Path) -> bool {
    let mut head = [0u8; 4];
    let read = File::open(path).and_then(|mut f| f.read_exact(&mut head));
    read.is_ok() && (head == *b"PK\x03\x04" || (head[0] == 0x80 && (2..=5).contains(&head[1])))
}

/// Compare declared session shapes with the definition.
///
/// Dynamic dimensions (reported as negative values) always match.
fn check_shapes(
    definition: &ModelDefinition,
    img_size: usize,
    input_shape: &[i64],
    output_shape: &[i64],
) -> Result<()> {
    let fixed = |d: i64| usize::try_from(d).ok();

    if let Some(&features) = output_shape.last() {
        if let Some(features) = fixed(features) {
            if features != definition.num_outputs() {
                return Err(DetectError::IncompatibleCheckpoint(format!(
                    "Checkpoint predicts {features} values per row but the definition needs {} (5 + {} classes)",
                    definition.num_outputs(),
                    definition.num_classes()
                )));
            }
        }
    }

    if input_shape.len() == 4 {
        if let Some(channels) = fixed(input_shape[1]) {
            if channels != definition.channels() {
                return Err(DetectError::IncompatibleCheckpoint(format!(
                    "Checkpoint takes {channels} input channels but the definition declares {}",
                    definition.channels()
                )));
            }
        }
        for (axis, &dim) in input_shape[2..].iter().enumerate() {
            if let Some(side) = fixed(dim) {
                if side != img_size {
                    return Err(DetectError::IncompatibleCheckpoint(format!(
                        "Checkpoint input {} is {side} but img_size is {img_size}",
                        if axis == 0 { "height" } else { "width" }
                    )));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(classes: usize) -> ModelDefinition {
        ModelDefinition::from_cfg_str(&format!("[net]\nwidth=416\nheight=416\n[yolo]\nclasses={classes}\n"))
            .unwrap()
    }

    #[test]
    fn test_checkpoint_not_found() {
        let result = Detector::load(
            &definition(10),
            Path::new("nonexistent.onnx"),
            &InferenceConfig::default(),
            Device::Cpu,
        );
        assert!(matches!(result, Err(DetectError::ModelLoadError(_))));
    }

    #[test]
    fn test_pytorch_checkpoint_rejected() {
        let dir = std::env::temp_dir().join(format!("retail-yolo-model-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for (name, bytes) in [("zip.onnx", &b"PK\x03\x04rest"[..]), ("pickle.onnx", &[0x80, 0x02, 0x8a, 0x0a][..])] {
            let path = dir.join(name);
            std::fs::write(&path, bytes).unwrap();
            let err = Detector::load(&definition(10), &path, &InferenceConfig::default(), Device::Cpu)
                .unwrap_err();
            assert!(matches!(&err, DetectError::ModelLoadError(msg) if msg.contains("PyTorch")), "{err}");
        }
        assert!(!is_pytorch_checkpoint(Path::new("nonexistent.onnx")));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_channel_mismatch() {
        let def = definition(10);
        let err = check_shapes(&def, 416, &[1, 1, 416, 416], &[1, 10647, 15]).unwrap_err();
        assert!(err.to_string().contains("channels"));
    }

    #[test]
    fn test_shapes_match() {
        let def = definition(10);
        assert!(check_shapes(&def, 416, &[1, 3, 416, 416], &[1, 10647, 15]).is_ok());
        assert!(check_shapes(&def, 416, &[-1, 3, -1, -1], &[-1, -1, 15]).is_ok());
    }

    #[test]
    fn test_class_count_mismatch() {
        let def = definition(10);
        let err = check_shapes(&def, 416, &[1, 3, 416, 416], &[1, 10647, 85]).unwrap_err();
        assert!(matches!(err, DetectError::IncompatibleCheckpoint(_)));
    }

    #[test]
    fn test_input_size_mismatch() {
        let def = definition(10);
        let err = check_shapes(&def, 320, &[1, 3, 416, 416], &[1, 10647, 15]).unwrap_err();
        assert!(err.to_string().contains("height"));
    }
}
