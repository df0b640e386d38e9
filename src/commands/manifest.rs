//! Manifest command: the manifest stage on its own

use std::path::PathBuf;

use crate::cli::ManifestArgs;
use crate::commands::helpers;
use crate::error::Result;
use crate::sequencer::Stage;
use crate::ui::display;

pub fn run(config_path: Option<PathBuf>, quiet: bool, args: ManifestArgs) -> Result<()> {
    let mut config = helpers::load_config(config_path.as_deref())?;
    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    let report = helpers::run_stages(
        &config,
        &args.batch,
        [Stage::Manifest],
        &args.decisions,
        false,
        quiet,
    )?;
    display::display_pipeline_report(&report);
    helpers::check_aborted(&report)
}
