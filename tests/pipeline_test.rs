// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! End-to-end runs of the detect, annotate and report stages with a
//! scripted network in place of the ONNX session.

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use ndarray::{Array3, Array4};
use rand::SeedableRng;
use rand::rngs::StdRng;

use retail_yolo_demo::cli::logging::set_verbose;
use retail_yolo_demo::{
    Annotator, ClassLabels, DetectError, Device, ImageFolder, InferenceConfig, Network, Result,
    RunContext, RunOptions, annotate_records, pick_random_output, run_inference,
};

const SIZE: u32 = 416;
const BACKGROUND: Rgb<u8> = Rgb([128, 128, 128]);

/// Rows are `(cx, cy, w, h, objectness, cat, dog)`.
type Row = [f32; 7];

/// Hands out one scripted row set per image, in call order.
struct ScriptedNetwork {
    per_image: Vec<Vec<Row>>,
    next: usize,
}

impl ScriptedNetwork {
    fn new(per_image: Vec<Vec<Row>>) -> Self {
        Self { per_image, next: 0 }
    }
}

impl Network for ScriptedNetwork {
    fn forward(&mut self, input: &Array4<f32>) -> Result<Array3<f32>> {
        let batch = input.shape()[0];
        let rows = self.per_image.iter().map(Vec::len).max().unwrap_or(1).max(1);
        let mut out = Array3::zeros((batch, rows, 7));
        for i in 0..batch {
            let script = self.per_image.get(self.next).cloned().unwrap_or_default();
            self.next += 1;
            for (r, row) in script.iter().enumerate() {
                for (f, value) in row.iter().enumerate() {
                    out[[i, r, f]] = *value;
                }
            }
        }
        Ok(out)
    }
}

struct Workspace {
    root: PathBuf,
}

impl Workspace {
    fn new(name: &str) -> Self {
        set_verbose(false);
        let root = std::env::temp_dir().join(format!("retail-yolo-it-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(root.join("images")).unwrap();
        Self { root }
    }

    fn images(&self) -> PathBuf {
        self.root.join("images")
    }

    fn add_image(&self, name: &str) {
        RgbImage::from_pixel(SIZE, SIZE, BACKGROUND)
            .save(self.images().join(name))
            .unwrap();
    }

    fn options(&self) -> RunOptions {
        RunOptions {
            image_folder: self.images(),
            output_dir: self.root.join("output"),
            results_path: self.root.join("Results.txt"),
            strip_prefix: Some(format!("{}/", self.images().display())),
            skip_download: true,
            show: false,
            seed: Some(7),
            ..RunOptions::default()
        }
    }

    fn manifest(&self) -> String {
        std::fs::read_to_string(self.root.join("Results.txt")).unwrap()
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

fn labels() -> ClassLabels {
    ClassLabels::from_names(["cat", "dog"])
}

fn detect(ws: &Workspace, network: &mut ScriptedNetwork, batch_size: usize) -> Vec<retail_yolo_demo::ImageRecord> {
    let config = InferenceConfig::default().with_batch_size(batch_size);
    let folder = ImageFolder::open(ws.images(), config.imgsz).unwrap();
    let batches = folder.batches(config.batch_size, 0).unwrap();
    run_inference(network, batches, &config, false).unwrap()
}

#[test]
fn test_single_detection_draws_one_box_and_one_line() {
    let ws = Workspace::new("single");
    ws.add_image("a.png");

    // x1=158 y1=168 x2=258 y2=248 in a 416x416 image, conf 0.9
    let mut network = ScriptedNetwork::new(vec![vec![[208.0, 208.0, 100.0, 80.0, 0.9, 1.0, 0.0]]]);
    let records = detect(&ws, &mut network, 1);
    assert_eq!(records.len(), 1);
    let dets = records[0].detections.as_ref().unwrap();
    assert_eq!(dets.len(), 1);
    assert_eq!(dets[0].cls_pred, 0);
    assert!((dets[0].conf - 0.9).abs() < 1e-6);

    let mut ctx = RunContext::new(ws.options(), Device::Cpu).unwrap();
    let summary = annotate_records(&mut ctx, &records, &labels(), &mut Annotator::new(None)).unwrap();
    assert_eq!(summary.saved, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(ctx.finish().unwrap().0, 1);

    assert_eq!(ws.manifest(), "a.png;cat,: \n");

    let out = image::open(ws.root.join("output/a.png")).unwrap().to_rgb8();
    assert_eq!(out.dimensions(), (SIZE, SIZE));
    let edge = *out.get_pixel(158, 200);
    assert_ne!(edge, BACKGROUND);
    assert_eq!(out.get_pixel(200, 168), &edge);
    assert_eq!(out.get_pixel(208, 208), &BACKGROUND);
    assert_eq!(out.get_pixel(50, 50), &BACKGROUND);
}

#[test]
fn test_overlapping_boxes_merge_into_one() {
    let ws = Workspace::new("overlap");
    ws.add_image("a.png");

    let mut network = ScriptedNetwork::new(vec![vec![
        [208.0, 208.0, 100.0, 100.0, 0.7, 1.0, 0.0],
        [213.0, 208.0, 100.0, 100.0, 0.65, 1.0, 0.0],
    ]]);
    let records = detect(&ws, &mut network, 1);
    let dets = records[0].detections.as_ref().unwrap();
    assert_eq!(dets.len(), 1);
    // confidence-weighted mean of x1 = 158 and x1 = 163
    let expected_x1 = (158.0 * 0.7 + 163.0 * 0.65) / 1.35;
    assert!((dets[0].x1 - expected_x1).abs() < 1e-3);
    assert!((dets[0].conf - 0.7).abs() < 1e-6);
}

#[test]
fn test_manifest_has_one_line_per_present_record_in_order() {
    let ws = Workspace::new("manifest");
    for name in ["a.png", "b.png", "c.png", "d.png"] {
        ws.add_image(name);
    }

    let mut network = ScriptedNetwork::new(vec![
        vec![[100.0, 100.0, 40.0, 40.0, 0.9, 0.0, 1.0]],
        // below the confidence threshold
        vec![[100.0, 100.0, 40.0, 40.0, 0.3, 1.0, 0.0]],
        vec![
            [100.0, 100.0, 40.0, 40.0, 0.95, 1.0, 0.0],
            [300.0, 300.0, 40.0, 40.0, 0.8, 0.0, 1.0],
        ],
        vec![[60.0, 60.0, 20.0, 20.0, 0.7, 1.0, 0.0]],
    ]);
    let records = detect(&ws, &mut network, 2);
    assert_eq!(records.len(), 4);
    assert!(records[1].detections.is_none());

    let mut ctx = RunContext::new(ws.options(), Device::Cpu).unwrap();
    let summary = annotate_records(&mut ctx, &records, &labels(), &mut Annotator::new(None)).unwrap();
    assert_eq!(summary.processed, 4);
    assert_eq!(summary.saved, 4);
    let present = records.iter().filter(|r| r.detections.is_some()).count();
    assert_eq!(summary.manifest_lines, present);
    ctx.finish().unwrap();

    assert_eq!(ws.manifest(), "a.png;dog,: \nc.png;cat,dog,: \nd.png;cat,: \n");
    // records without detections still get a plain PNG
    assert!(ws.root.join("output/b.png").is_file());
}

#[test]
fn test_empty_detection_list_still_writes_a_line() {
    let ws = Workspace::new("empty-some");
    ws.add_image("a.png");

    let records = vec![retail_yolo_demo::ImageRecord::new(ws.images().join("a.png"), Some(Vec::new()))];
    let mut ctx = RunContext::new(ws.options(), Device::Cpu).unwrap();
    annotate_records(&mut ctx, &records, &labels(), &mut Annotator::new(None)).unwrap();
    ctx.finish().unwrap();
    assert_eq!(ws.manifest(), "a.png;: \n");
}

#[test]
fn test_bad_image_is_skipped_and_run_continues() {
    let ws = Workspace::new("corrupt");
    ws.add_image("a.png");
    std::fs::write(ws.images().join("b.jpg"), b"not a jpeg").unwrap();
    ws.add_image("c.png");

    let mut network = ScriptedNetwork::new(vec![
        vec![[100.0, 100.0, 40.0, 40.0, 0.9, 1.0, 0.0]],
        vec![[100.0, 100.0, 40.0, 40.0, 0.9, 0.0, 1.0]],
    ]);
    let records = detect(&ws, &mut network, 1);
    let names: Vec<_> = records
        .iter()
        .map(|r| r.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["a.png", "c.png"]);
}

#[test]
fn test_bad_image_keeps_its_batch_mates() {
    let ws = Workspace::new("corrupt-batch");
    ws.add_image("a.png");
    std::fs::write(ws.images().join("b.jpg"), b"not a jpeg").unwrap();
    ws.add_image("c.png");
    ws.add_image("d.png");

    let row = [100.0, 100.0, 40.0, 40.0, 0.9, 1.0, 0.0];
    let mut network = ScriptedNetwork::new(vec![vec![row]; 3]);
    let records = detect(&ws, &mut network, 2);
    let names: Vec<_> = records
        .iter()
        .map(|r| r.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["a.png", "c.png", "d.png"]);

    let mut ctx = RunContext::new(ws.options(), Device::Cpu).unwrap();
    let summary = annotate_records(&mut ctx, &records, &labels(), &mut Annotator::new(None)).unwrap();
    assert_eq!(summary.saved, 3);
    ctx.finish().unwrap();
    assert_eq!(ws.manifest(), "a.png;cat,: \nc.png;cat,: \nd.png;cat,: \n");
}

#[test]
fn test_unknown_class_fails_only_that_record() {
    let ws = Workspace::new("unknown-class");
    ws.add_image("a.png");
    ws.add_image("b.png");

    let mut network = ScriptedNetwork::new(vec![
        vec![[100.0, 100.0, 40.0, 40.0, 0.9, 0.0, 1.0]],
        vec![[100.0, 100.0, 40.0, 40.0, 0.9, 1.0, 0.0]],
    ]);
    let records = detect(&ws, &mut network, 1);

    // only "cat" is known, so the "dog" record fails
    let short = ClassLabels::from_names(["cat"]);
    let mut ctx = RunContext::new(ws.options(), Device::Cpu).unwrap();
    let summary = annotate_records(&mut ctx, &records, &short, &mut Annotator::new(None)).unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.saved, 1);
    ctx.finish().unwrap();
    assert_eq!(ws.manifest(), "b.png;cat,: \n");

    let options = RunOptions {
        fail_fast: true,
        ..ws.options()
    };
    let mut ctx = RunContext::new(options, Device::Cpu).unwrap();
    let err = annotate_records(&mut ctx, &records, &short, &mut Annotator::new(None)).unwrap_err();
    assert!(matches!(err, DetectError::AnnotationError(_)));
}

#[test]
fn test_presenter_picks_a_saved_result() {
    let ws = Workspace::new("present");
    ws.add_image("a.png");
    ws.add_image("b.png");

    let mut network = ScriptedNetwork::new(vec![Vec::new(), Vec::new()]);
    let records = detect(&ws, &mut network, 2);
    let mut ctx = RunContext::new(ws.options(), Device::Cpu).unwrap();
    annotate_records(&mut ctx, &records, &labels(), &mut Annotator::new(None)).unwrap();
    let (_, mut rng) = ctx.finish().unwrap();

    let pick = pick_random_output(&ws.root.join("output"), &mut rng).unwrap();
    assert_eq!(pick.parent(), Some(ws.root.join("output").as_path()));
    assert!(["a.png", "b.png"].contains(&pick.file_name().unwrap().to_str().unwrap()));
}

#[test]
fn test_empty_output_dir_has_nothing_to_show() {
    let ws = Workspace::new("nothing");
    let output = ws.root.join("output");
    std::fs::create_dir_all(&output).unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    assert!(matches!(
        pick_random_output(Path::new(&output), &mut rng),
        Err(DetectError::NothingToShow(_))
    ));
}
