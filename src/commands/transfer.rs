//! Transfer command: write a transfer manifest, optionally verify it

use std::path::PathBuf;

use console::Style;
use tracing::warn;

use crate::cli::TransferArgs;
use crate::commands::helpers;
use crate::error::Result;
use crate::manifest::ManifestRecord;
use crate::transfer;
use crate::ui::display;

pub fn run(config_path: Option<PathBuf>, args: TransferArgs) -> Result<()> {
    let config = helpers::load_config(config_path.as_deref())?;
    helpers::init_threads(config.threads);

    // Read the earlier manifest first so a bad path fails before hashing
    let before = args
        .against
        .as_deref()
        .map(ManifestRecord::read)
        .transpose()?;

    let manifest = transfer::build_transfer_manifest(&args.root, &config)?;
    if !args.json {
        println!(
            "{} {} ({} files)",
            Style::new().bold().apply_to("Wrote"),
            manifest.path.display(),
            manifest.record.len()
        );
    }
    if !manifest.failures.is_empty() {
        warn!(
            count = manifest.failures.len(),
            "some files could not be hashed; they are listed without a digest"
        );
    }

    let Some(before) = before else {
        return Ok(());
    };
    let comparison = before.compare(&manifest.record);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&comparison)?);
    } else {
        display::display_comparison(&comparison);
    }
    comparison.into_result()
}
