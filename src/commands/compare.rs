//! Compare command: two manifest files on disk

use std::path::PathBuf;

use crate::cli::CompareArgs;
use crate::error::Result;
use crate::transfer;
use crate::ui::display;

pub fn run(args: CompareArgs) -> Result<()> {
    let comparison = transfer::compare_files(&args.before, &args.after)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&comparison)?);
    } else {
        display::display_comparison(&comparison);
    }
    comparison.into_result()
}
