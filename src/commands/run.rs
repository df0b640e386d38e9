//! Run command: any selection of stages over a batch

use std::path::PathBuf;

use crate::cli::RunArgs;
use crate::commands::helpers;
use crate::error::Result;
use crate::ui::display;

pub fn run(config_path: Option<PathBuf>, quiet: bool, args: RunArgs) -> Result<()> {
    let mut config = helpers::load_config(config_path.as_deref())?;
    if let Some(compression) = args.compression {
        config.compression = compression;
    }
    if let Some(threads) = args.threads {
        config.threads = threads;
    }

    let report = helpers::run_stages(
        &config,
        &args.batch,
        args.stages,
        &args.decisions,
        args.step,
        quiet || args.json,
    )?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        display::display_pipeline_report(&report);
    }
    helpers::check_aborted(&report)
}
