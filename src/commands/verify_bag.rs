//! Verify-bag command

use std::path::{Path, PathBuf};

use crate::bag;
use crate::cli::VerifyBagArgs;
use crate::commands::helpers;
use crate::error::{PackError, Result};
use crate::hash::HashOptions;
use crate::inspect::{FsInspector, ObjectInspector};
use crate::ui::display;

/// The bags a path stands for: itself, or the bagged objects inside it
fn bags_under(path: &Path, inspector: &FsInspector) -> Result<Vec<PathBuf>> {
    if bag::is_bagged(path) {
        return Ok(vec![path.to_path_buf()]);
    }
    Ok(inspector
        .list_objects(path)?
        .into_iter()
        .filter(|o| bag::is_bagged(o))
        .collect())
}

pub fn run(config_path: Option<PathBuf>, args: VerifyBagArgs) -> Result<()> {
    let config = helpers::load_config(config_path.as_deref())?;
    helpers::init_threads(config.threads);
    let options = HashOptions::from(&config);
    let inspector = FsInspector::new(config, PathBuf::new());

    let mut invalid = Vec::new();
    let mut problems = Vec::new();
    let mut checked = 0;

    for path in &args.paths {
        let bags = bags_under(path, &inspector)?;
        if bags.is_empty() {
            return Err(crate::error::bag_invalid(
                path.display().to_string(),
                vec!["no bag found".to_string()],
            ));
        }
        for bag_dir in bags {
            let validation = bag::validate_bag(&bag_dir, options)?;
            display::display_bag_validation(&bag_dir.display().to_string(), &validation);
            checked += 1;
            if !validation.is_valid() {
                invalid.push(bag_dir.display().to_string());
                problems.extend(
                    validation
                        .problems
                        .into_iter()
                        .map(|p| format!("{}: {p}", bag_dir.display())),
                );
            }
        }
    }

    if invalid.is_empty() {
        println!("{checked} bag(s) valid");
        Ok(())
    } else {
        Err(PackError::BagInvalid {
            path: invalid.join(", "),
            problems,
        })
    }
}
