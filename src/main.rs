// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::process;

use clap::Parser;

use retail_yolo_demo::cli::args::Cli;
use retail_yolo_demo::cli::demo::run_demo;
use retail_yolo_demo::cli::logging::set_verbose;
use retail_yolo_demo::error;

fn main() {
    let cli = Cli::parse();
    set_verbose(cli.verbose);

    if let Err(e) = run_demo(cli.to_options()) {
        error!("{e}");
        process::exit(1);
    }
}
