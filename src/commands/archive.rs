//! Archive command: the archive stage on its own

use std::path::PathBuf;

use crate::cli::{ArchiveArgs, DecisionArgs};
use crate::commands::helpers;
use crate::error::Result;
use crate::sequencer::Stage;
use crate::ui::display;

pub fn run(config_path: Option<PathBuf>, quiet: bool, args: ArchiveArgs) -> Result<()> {
    let mut config = helpers::load_config(config_path.as_deref())?;
    if let Some(compression) = args.compression {
        config.compression = compression;
    }
    let report = helpers::run_stages(
        &config,
        &args.batch,
        [Stage::Archive],
        &DecisionArgs::default(),
        false,
        quiet,
    )?;
    display::display_pipeline_report(&report);
    helpers::check_aborted(&report)
}
