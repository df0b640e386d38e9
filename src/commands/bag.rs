//! Bag command: the bag stage on its own

use std::path::PathBuf;

use crate::cli::BagArgs;
use crate::commands::helpers;
use crate::error::Result;
use crate::sequencer::Stage;
use crate::ui::display;

pub fn run(config_path: Option<PathBuf>, quiet: bool, args: BagArgs) -> Result<()> {
    let config = helpers::load_config(config_path.as_deref())?;
    let report =
        helpers::run_stages(&config, &args.batch, [Stage::Bag], &args.decisions, false, quiet)?;
    display::display_pipeline_report(&report);
    helpers::check_aborted(&report)
}
