// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};

use crate::checkpoint::{Checkpoint, DOMAIN_TRANSLATED_URL, NON_DOMAIN_TRANSLATED_URL};
use crate::device::Device;
use crate::download::DATASET_URL;
use crate::inference::InferenceConfig;
use crate::options::RunOptions;

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(after_help = r#"Examples:
    retail-yolo-demo
    retail-yolo-demo --domain_translated_model false
    retail-yolo-demo --skip_download --image_folder val2019p --batch_size 4 --n_cpu 4
    retail-yolo-demo --conf_thres 0.5 --show false --seed 7 --device cpu"#)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Directory of validation images (also the dataset extraction target)
    #[arg(long = "image_folder", default_value = "val2019p")]
    pub image_folder: PathBuf,

    /// Darknet model definition file
    #[arg(long = "model_def", default_value = "config/yolov3-custom.cfg")]
    pub model_def: PathBuf,

    /// Newline-separated class names
    #[arg(long = "class_path", default_value = "data/custom/classes.names")]
    pub class_path: PathBuf,

    /// Object confidence threshold
    #[arg(long = "conf_thres", default_value_t = 0.6, allow_negative_numbers = true)]
    pub conf_thres: f32,

    /// `IoU` threshold for non-maximum suppression
    #[arg(long = "nms_thres", default_value_t = 0.4, allow_negative_numbers = true)]
    pub nms_thres: f32,

    /// Images per batch
    #[arg(long = "batch_size", default_value_t = 1)]
    pub batch_size: usize,

    /// Decode worker threads (0 decodes on the main thread)
    #[arg(long = "n_cpu", default_value_t = 0)]
    pub n_cpu: usize,

    /// Square network input size
    #[arg(long = "img_size", default_value_t = 416)]
    pub img_size: usize,

    /// Use the domain-translated checkpoint (true/false/yes/no/1/0/on/off)
    #[arg(
        long = "domain_translated_model",
        default_value = "true",
        value_parser = BoolishValueParser::new(),
        action = ArgAction::Set
    )]
    pub domain_translated_model: bool,

    /// Directory holding the checkpoint files
    #[arg(long = "checkpoint_dir", default_value = ".")]
    pub checkpoint_dir: PathBuf,

    /// Directory for annotated PNGs
    #[arg(long = "output_dir", default_value = "output")]
    pub output_dir: PathBuf,

    /// Results manifest path
    #[arg(long = "results_path", default_value = "Results.txt")]
    pub results_path: PathBuf,

    /// Prefix removed from image paths written to the manifest
    #[arg(long = "strip_prefix")]
    pub strip_prefix: Option<String>,

    /// Dataset archive URL
    #[arg(long = "dataset_url", default_value = DATASET_URL)]
    pub dataset_url: String,

    /// Domain-translated checkpoint URL
    #[arg(long = "domain_translated_url", default_value = DOMAIN_TRANSLATED_URL)]
    pub domain_translated_url: String,

    /// Non-domain-translated checkpoint URL
    #[arg(long = "non_domain_translated_url", default_value = NON_DOMAIN_TRANSLATED_URL)]
    pub non_domain_translated_url: String,

    /// Use the dataset and checkpoints already on disk
    #[arg(long = "skip_download", default_value_t = false)]
    pub skip_download: bool,

    /// Device to use (cpu, cuda, cuda:N); picked automatically when omitted
    #[arg(long)]
    pub device: Option<Device>,

    /// ONNX Runtime intra-op threads (0 lets the runtime decide)
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    /// Display a random annotated image at the end
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub show: bool,

    /// Abort on the first image that fails instead of skipping it
    #[arg(long = "fail_fast", default_value_t = false)]
    pub fail_fast: bool,

    /// Seed for colour sampling and the final random pick
    #[arg(long)]
    pub seed: Option<u64>,

    /// Show verbose output
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub verbose: bool,
}

impl Cli {
    /// Resolve the parsed arguments into [`RunOptions`].
    #[must_use]
    pub fn to_options(&self) -> RunOptions {
        let config = InferenceConfig::new()
            .with_confidence(self.conf_thres)
            .with_iou(self.nms_thres)
            .with_batch_size(self.batch_size)
            .with_workers(self.n_cpu)
            .with_imgsz(self.img_size)
            .with_threads(self.threads);

        RunOptions {
            image_folder: self.image_folder.clone(),
            model_def: self.model_def.clone(),
            class_path: self.class_path.clone(),
            checkpoint: Checkpoint::from_domain_flag(self.domain_translated_model),
            checkpoint_dir: self.checkpoint_dir.clone(),
            config,
            output_dir: self.output_dir.clone(),
            results_path: self.results_path.clone(),
            strip_prefix: self.strip_prefix.clone(),
            dataset_url: self.dataset_url.clone(),
            domain_translated_url: self.domain_translated_url.clone(),
            non_domain_translated_url: self.non_domain_translated_url.clone(),
            skip_download: self.skip_download,
            device: self.device,
            show: self.show,
            fail_fast: self.fail_fast,
            seed: self.seed,
        }
    }
}
