// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::PathBuf;

use clap::Parser;

use retail_yolo_demo::Checkpoint;
use retail_yolo_demo::cli::args::Cli;

#[test]
fn test_domain_flag_false_selects_other_checkpoint() {
    let cli = Cli::parse_from([
        "retail-yolo-demo",
        "--domain_translated_model",
        "false",
        "--checkpoint_dir",
        "weights",
    ]);
    let options = cli.to_options();
    assert_eq!(options.checkpoint, Checkpoint::NonDomainTranslated);
    assert_eq!(
        options.checkpoint_path(),
        PathBuf::from("weights/non_domain_translated_model.onnx")
    );

    // both variants are still fetched
    let plan = options.asset_plan();
    let targets: Vec<_> = plan.checkpoints.iter().map(|(_, path)| path.clone()).collect();
    assert_eq!(
        targets,
        [
            PathBuf::from("weights/domain_translated_model.onnx"),
            PathBuf::from("weights/non_domain_translated_model.onnx"),
        ]
    );
}

#[test]
fn test_zero_batch_size_is_rejected() {
    let cli = Cli::parse_from(["retail-yolo-demo", "--batch_size", "0"]);
    assert!(cli.to_options().validate().is_err());
}
