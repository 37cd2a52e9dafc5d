// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! The end-to-end demo run behind the binary.

use std::time::Instant;

use crate::annotate::Annotator;
use crate::darknet::ModelDefinition;
use crate::device::Device;
use crate::download::fetch_assets;
use crate::error::Result;
use crate::labels::ClassLabels;
use crate::model::Detector;
use crate::options::RunOptions;
use crate::pipeline::{RunContext, annotate_records, run_inference};
use crate::presenter::{pick_random_output, present};
use crate::source::ImageFolder;
use crate::utils::format_timedelta;
use crate::{VERSION, success, verbose, warn};

/// Run every stage in order: fetch, load, detect, annotate, present.
///
/// # Errors
///
/// Returns the first error that aborts the run. Per-image failures only
/// abort when `options.fail_fast` is set.
pub fn run_demo(options: RunOptions) -> Result<()> {
    let started = Instant::now();
    verbose!("retail-yolo-demo {VERSION}");
    verbose!("{options:#?}");
    options.validate()?;

    if options.skip_download {
        verbose!("Skipping asset download");
    } else {
        fetch_assets(&options.asset_plan())?;
    }

    let device = Device::resolve(options.device);
    if device.is_cuda() && !cfg!(feature = "cuda") {
        warn!("{device} requested but this build lacks the cuda feature; running on the CPU");
    }

    let definition = ModelDefinition::from_file(&options.model_def)?;
    if !definition.accepts_input_size(options.config.imgsz) {
        warn!(
            "{} declares a {}x{} input but img_size is {}",
            options.model_def.display(),
            definition.width().unwrap_or(options.config.imgsz),
            definition.height().unwrap_or(options.config.imgsz),
            options.config.imgsz
        );
    }
    for (i, head) in definition.heads().iter().enumerate() {
        verbose!("YOLO head {i}: {} classes, anchors {:?}", head.classes, head.masked_anchors());
    }
    let labels = ClassLabels::load(&options.class_path)?;
    if labels.len() != definition.num_classes() {
        warn!(
            "{} lists {} classes but the model predicts {}",
            options.class_path.display(),
            labels.len(),
            definition.num_classes()
        );
    }

    let checkpoint_path = options.checkpoint_path();
    verbose!("Loading {} checkpoint from {}", options.checkpoint, checkpoint_path.display());
    let mut detector = Detector::load(&definition, &checkpoint_path, &options.config, device)?;
    verbose!("Using device {device}");

    let folder = ImageFolder::open(&options.image_folder, options.config.imgsz)?;
    if folder.is_empty() {
        warn!("No images found in {}", folder.dir().display());
    }
    let batches = folder.batches(options.config.batch_size, options.config.num_workers)?;
    let records = run_inference(&mut detector, batches, &options.config, options.fail_fast)?;

    let show = options.show;
    let domain_translated = options.checkpoint.is_domain_translated();
    let output_dir = options.output_dir.clone();

    let mut ctx = RunContext::new(options, device)?;
    let mut annotator = Annotator::with_default_font();
    let summary = annotate_records(&mut ctx, &records, &labels, &mut annotator)?;
    let (lines, mut rng) = ctx.finish()?;

    success!(
        "{} images processed, {} saved to {}, {} manifest lines ({})",
        summary.processed,
        summary.saved,
        output_dir.display(),
        lines,
        format_timedelta(started.elapsed())
    );
    if summary.failed > 0 {
        warn!("{} images failed and were skipped", summary.failed);
    }

    if show {
        let choice = pick_random_output(&output_dir, &mut rng)?;
        present(&choice, domain_translated)?;
    }
    Ok(())
}
