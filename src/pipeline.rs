// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! The inference loop and the annotate-and-report loop.
//!
//! [`RunContext`] carries the run options, the resolved device, the open
//! manifest, the PNG writer and the random generator from stage to stage.

use std::path::PathBuf;
use std::time::Instant;

use ndarray::{Array3, Array4, Axis, s};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::annotate::{Annotator, assign_class_colors};
use crate::device::Device;
use crate::error::{DetectError, Result};
use crate::inference::InferenceConfig;
use crate::io::SaveResults;
use crate::labels::ClassLabels;
use crate::manifest::ResultsManifest;
use crate::model::Network;
use crate::options::RunOptions;
use crate::postprocessing::{non_max_suppression, rescale_boxes};
use crate::preprocessing::load_image;
use crate::results::{BatchTiming, ImageRecord};
use crate::source::Batch;

/// State shared by the stages of one run.
#[derive(Debug)]
pub struct RunContext {
    options: RunOptions,
    device: Device,
    manifest: ResultsManifest,
    saver: SaveResults,
    rng: StdRng,
}

impl RunContext {
    /// Truncate the manifest, create the output directory and seed the
    /// random generator.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::IoError`] if either file system target can't be created.
    pub fn new(options: RunOptions, device: Device) -> Result<Self> {
        let manifest = ResultsManifest::create(&options.results_path)?;
        let saver = SaveResults::new(options.output_dir.clone())?;
        let rng = options
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Ok(Self {
            options,
            device,
            manifest,
            saver,
            rng,
        })
    }

    /// Run options.
    #[must_use]
    pub const fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Device the detector runs on.
    #[must_use]
    pub const fn device(&self) -> Device {
        self.device
    }

    /// The open manifest.
    #[must_use]
    pub const fn manifest(&self) -> &ResultsManifest {
        &self.manifest
    }

    /// Random generator for colours and the presenter.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Flush the manifest and hand back the generator for the presenter.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::IoError`] if the manifest flush fails.
    pub fn finish(self) -> Result<(usize, StdRng)> {
        let lines = self.manifest.finish()?;
        Ok((lines, self.rng))
    }
}

/// Outcome of [`annotate_records`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnnotationSummary {
    /// Records visited.
    pub processed: usize,
    /// PNGs written.
    pub saved: usize,
    /// Records skipped after an error.
    pub failed: usize,
    /// Manifest lines written.
    pub manifest_lines: usize,
}

/// Forward a batch; if a multi-image batch fails, forward each image alone
/// and concatenate.
///
/// # Errors
///
/// Returns the backend error when a single-image forward fails.
pub fn forward_with_fallback<N: Network + ?Sized>(
    network: &mut N,
    input: &Array4<f32>,
) -> Result<Array3<f32>> {
    let batch_len = input.shape()[0];
    match network.forward(input) {
        Ok(output) => Ok(output),
        Err(e) if batch_len > 1 => {
            crate::warn!("Batched forward of {batch_len} images failed ({e}); running them one at a time");
            let outputs = (0..batch_len)
                .map(|i| network.forward(&input.slice(s![i..=i, .., .., ..]).to_owned()))
                .collect::<Result<Vec<_>>>()?;
            let views: Vec<_> = outputs.iter().map(Array3::view).collect();
            ndarray::concatenate(Axis(0), &views).map_err(|e| {
                DetectError::InferenceError(format!("Per-image outputs disagree in shape: {e}"))
            })
        }
        Err(e) => Err(e),
    }
}

/// Run every batch through the network and NMS.
///
/// # Arguments
///
/// * `network` - Detector or stand-in.
/// * `batches` - Output of [`ImageFolder::batches`](crate::source::ImageFolder::batches).
/// * `config` - Thresholds.
/// * `fail_fast` - Abort on an image or batch that cannot be loaded instead
///   of skipping it.
///
/// # Returns
///
/// One record per image, in iteration order.
///
/// # Errors
///
/// Returns the first forward or NMS failure, or an image or batch load
/// failure when `fail_fast` is set.
pub fn run_inference<N, I>(
    network: &mut N,
    batches: I,
    config: &InferenceConfig,
    fail_fast: bool,
) -> Result<Vec<ImageRecord>>
where
    N: Network + ?Sized,
    I: IntoIterator<Item = Result<Batch>>,
{
    crate::section!("Performing object detection:");
    let mut records = Vec::new();
    let mut prev_time = Instant::now();

    for (batch_index, batch) in batches.into_iter().enumerate() {
        let mut batch = match batch {
            Ok(batch) => batch,
            Err(e) if !fail_fast => {
                crate::error!("Skipping batch {batch_index}: {e}");
                prev_time = Instant::now();
                continue;
            }
            Err(e) => return Err(e),
        };
        for (path, e) in std::mem::take(&mut batch.failed) {
            if fail_fast {
                return Err(e);
            }
            crate::error!("Skipping {}: {e}", path.display());
        }
        if batch.is_empty() {
            prev_time = Instant::now();
            continue;
        }

        let prediction = forward_with_fallback(network, &batch.tensor)?;
        if prediction.shape()[0] != batch.len() {
            return Err(DetectError::InferenceError(format!(
                "Network returned {} predictions for a batch of {}",
                prediction.shape()[0],
                batch.len()
            )));
        }
        let detections = non_max_suppression(
            prediction.view(),
            config.confidence_threshold,
            config.iou_threshold,
        )?;

        let now = Instant::now();
        let timing = BatchTiming {
            batch_index,
            batch_len: batch.len(),
            elapsed: now.duration_since(prev_time),
        };
        prev_time = now;
        crate::verbose!("{timing}");

        records.extend(
            batch
                .paths
                .into_iter()
                .zip(detections)
                .map(|(path, dets)| ImageRecord::new(path, dets)),
        );
    }
    Ok(records)
}

/// Write manifest lines, draw detections and save one PNG per record.
///
/// A record's manifest line is written before its image is touched. Errors
/// while loading, drawing or saving one image are logged and counted unless
/// `fail_fast` is set; manifest write failures always abort.
///
/// # Errors
///
/// Returns manifest I/O errors, and per-record errors under `fail_fast`.
pub fn annotate_records(
    ctx: &mut RunContext,
    records: &[ImageRecord],
    labels: &ClassLabels,
    annotator: &mut Annotator,
) -> Result<AnnotationSummary> {
    crate::section!("Saving images:");
    let fail_fast = ctx.options.fail_fast;
    let mut summary = AnnotationSummary::default();

    for (index, record) in records.iter().enumerate() {
        summary.processed += 1;
        crate::verbose!("({index}) Image: '{}'", record.path.display());

        let outcome = match write_manifest_line(ctx, record, labels) {
            Err(e @ DetectError::IoError(_)) => return Err(e),
            Err(e) => Err(e),
            Ok(()) => annotate_one(ctx, record, labels, annotator),
        };

        match outcome {
            Ok(path) => {
                summary.saved += 1;
                crate::verbose!("\t+ Saved {}", path.display());
            }
            Err(e) if fail_fast => return Err(e),
            Err(e) => {
                summary.failed += 1;
                crate::error!("{}: {e}", record.path.display());
            }
        }
    }

    summary.manifest_lines = ctx.manifest.lines();
    Ok(summary)
}

fn write_manifest_line(ctx: &mut RunContext, record: &ImageRecord, labels: &ClassLabels) -> Result<()> {
    let Some(detections) = &record.detections else {
        return Ok(());
    };
    let path = ctx.options.manifest_path(&record.path);
    ctx.manifest.write_record(&path, detections, labels)
}

fn annotate_one(
    ctx: &mut RunContext,
    record: &ImageRecord,
    labels: &ClassLabels,
    annotator: &mut Annotator,
) -> Result<PathBuf> {
    let image = load_image(&record.path)?;

    let canvas = match &record.detections {
        Some(detections) => {
            let original_shape = (image.height(), image.width());
            let rescaled = rescale_boxes(detections, ctx.options.config.imgsz, original_shape);
            let classes = record.unique_classes();
            let palette = assign_class_colors(&classes, &mut ctx.rng)?;

            for det in &rescaled {
                crate::verbose!(
                    "\t+ Label: {}, Conf: {:.5}",
                    labels.name(det.cls_pred)?,
                    det.cls_conf
                );
            }
            annotator.annotate(image, &rescaled, labels, &palette)?
        }
        None => image.into_rgb8(),
    };

    ctx.saver.save(&record.path, &canvas)
}
