// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

#![allow(clippy::multiple_crate_versions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # Retail Checkout YOLOv3 Demo
//!
//! End-to-end demo for a YOLOv3 detector trained to recognise products at
//! a retail checkout. One run downloads the validation images and two
//! pretrained checkpoints, runs batched inference with non-maximum
//! suppression, draws the detections, writes a flat results manifest and
//! shows one random annotated image.
//!
//! The network is an ONNX export of the Darknet model executed with
//! [ONNX Runtime](https://onnxruntime.ai) through `ort`.
//!
//! ## CLI Usage
//!
//! ```bash
//! # Download everything and run with the domain-translated checkpoint
//! retail-yolo-demo
//!
//! # Compare against the checkpoint trained without domain translation
//! retail-yolo-demo --skip_download --domain_translated_model false
//!
//! # Larger batches, parallel decoding, no window
//! retail-yolo-demo --skip_download --batch_size 8 --n_cpu 4 --show false
//! ```
//!
//! **CLI Options:**
//!
//! | Option | Description | Default |
//! |--------|-------------|---------|
//! | `--image_folder` | Validation images | `val2019p` |
//! | `--model_def` | Darknet `.cfg` | `config/yolov3-custom.cfg` |
//! | `--class_path` | Class names | `data/custom/classes.names` |
//! | `--conf_thres` | Objectness threshold | `0.6` |
//! | `--nms_thres` | NMS `IoU` threshold | `0.4` |
//! | `--batch_size` | Images per batch | `1` |
//! | `--n_cpu` | Decode workers | `0` |
//! | `--img_size` | Network input size | `416` |
//! | `--domain_translated_model` | Checkpoint variant | `true` |
//! | `--output_dir` | Annotated PNGs | `output` |
//! | `--results_path` | Manifest | `Results.txt` |
//! | `--show` | Display a random result | `true` |
//!
//! ## Quick Start (Library)
//!
//! ```no_run
//! use retail_yolo_demo::{
//!     ClassLabels, Detector, Device, ImageFolder, InferenceConfig, ModelDefinition, run_inference,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = InferenceConfig::new().with_confidence(0.5).with_batch_size(4);
//!     let definition = ModelDefinition::from_file("config/yolov3-custom.cfg")?;
//!     let labels = ClassLabels::load("data/custom/classes.names")?;
//!     let mut detector = Detector::load(
//!         &definition,
//!         "domain_translated_model.onnx".as_ref(),
//!         &config,
//!         Device::Cpu,
//!     )?;
//!
//!     let folder = ImageFolder::open("val2019p", config.imgsz)?;
//!     let records = run_inference(&mut detector, folder.batches(config.batch_size, 0)?, &config, false)?;
//!     for record in &records {
//!         for det in record.detections.iter().flatten() {
//!             println!("{}: {} {:.2}", record.path.display(), labels.name(det.cls_pred)?, det.conf);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`download`] | Dataset and checkpoint fetching |
//! | [`options`] | [`RunOptions`] resolved from the command line |
//! | [`darknet`] | Darknet `.cfg` parsing ([`ModelDefinition`]) |
//! | [`model`] | [`Detector`] and the [`Network`] seam |
//! | [`source`] | [`ImageFolder`] batch iterator |
//! | [`postprocessing`] | NMS and letterbox rescale |
//! | [`pipeline`] | Inference loop and annotate-and-report loop |
//! | [`annotate`] | Box and label drawing |
//! | [`manifest`] | `Results.txt` writer |
//! | [`presenter`] | Random result display |
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `visualize` | Window display of the final result (default) |
//! | `cuda` | NVIDIA CUDA execution provider |

// Modules
pub mod annotate;
pub mod checkpoint;
pub mod cli;
pub mod darknet;
pub mod device;
pub mod download;
pub mod error;
pub mod inference;
pub mod io;
pub mod labels;
pub mod manifest;
pub mod model;
pub mod options;
pub mod pipeline;
pub mod postprocessing;
pub mod preprocessing;
pub mod presenter;
pub mod results;
pub mod source;
pub mod utils;
pub mod visualizer;

// Re-export main types for convenience
pub use annotate::{Annotator, ClassPalette, assign_class_colors};
pub use checkpoint::Checkpoint;
pub use darknet::ModelDefinition;
pub use device::Device;
pub use error::{DetectError, Result};
pub use inference::InferenceConfig;
pub use labels::ClassLabels;
pub use manifest::ResultsManifest;
pub use model::{Detector, Network};
pub use options::RunOptions;
pub use pipeline::{AnnotationSummary, RunContext, annotate_records, run_inference};
pub use postprocessing::{non_max_suppression, rescale_boxes};
pub use presenter::pick_random_output;
pub use results::{BatchTiming, Detection, ImageRecord};
pub use source::{Batch, ImageFolder};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
