//! Command helper utilities

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::archive;
use crate::cli::DecisionArgs;
use crate::config::PackConfig;
use crate::error::{PackError, Result};
use crate::inspect::FsInspector;
use crate::inventory::OverwriteMode;
use crate::sequencer::{
    BatchPolicy, DecisionPolicy, FsExecutor, InteractivePolicy, PipelineReport, RunPlan,
    Sequencer, Stage,
};
use crate::ui;

/// Load the configuration file if one was given
pub fn load_config(path: Option<&Path>) -> Result<PackConfig> {
    let config = PackConfig::load_or_default(path)?;
    debug!(?config, "configuration loaded");
    Ok(config)
}

/// Resolve a batch directory argument to an absolute path
pub fn resolve_batch(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Err(PackError::BatchNotFound {
            path: path.display().to_string(),
        });
    }
    if !path.is_dir() {
        return Err(PackError::NotADirectory {
            path: path.display().to_string(),
        });
    }
    Ok(dunce::canonicalize(path)?)
}

/// Size rayon's global pool; 0 keeps rayon's own default
pub fn init_threads(threads: usize) {
    if threads > 0 {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
        {
            debug!("thread pool already configured: {e}");
        }
    }
}

/// Overwrite mode fixed on the command line, if any
pub fn overwrite_mode(decisions: &DecisionArgs) -> Option<OverwriteMode> {
    if decisions.overwrite {
        Some(OverwriteMode::OverwriteAll)
    } else if decisions.keep_existing {
        Some(OverwriteMode::KeepExisting)
    } else {
        None
    }
}

/// Prompting policy for `--interactive`/`--step`, flag-driven otherwise
pub fn policy(decisions: &DecisionArgs, step: bool) -> Box<dyn DecisionPolicy> {
    if decisions.interactive || step {
        Box::new(InteractivePolicy)
    } else {
        Box::new(BatchPolicy {
            overwrite: overwrite_mode(decisions).unwrap_or_default(),
            rebag: decisions.rebag,
        })
    }
}

/// Run stages over a batch with the filesystem inspector and executor
pub fn run_stages(
    config: &PackConfig,
    batch: &Path,
    stages: impl IntoIterator<Item = Stage>,
    decisions: &DecisionArgs,
    step: bool,
    quiet: bool,
) -> Result<PipelineReport> {
    init_threads(config.threads);
    let batch = resolve_batch(batch)?;
    let archive_dir = archive::output_dir_for(&batch, config)?;

    let inspector = FsInspector::new(config.clone(), &archive_dir);
    let executor = FsExecutor::new(config.clone(), &archive_dir);
    let progress = ui::reporter(quiet);

    let plan = RunPlan {
        overwrite: overwrite_mode(decisions),
        step,
        ..RunPlan::new(stages)
    };
    let mut decide = policy(decisions, step);

    Sequencer::new(&inspector, &executor, progress.as_ref()).run(&batch, &plan, decide.as_mut())
}

/// Operator aborts end the process with an error
pub fn check_aborted(report: &PipelineReport) -> Result<()> {
    let stopped = report
        .stages
        .iter()
        .find(|r| r.aborted)
        .map(|r| r.stage)
        .or_else(|| report.not_run.first().copied());
    match stopped {
        Some(stage) => Err(PackError::StageAborted {
            stage: stage.to_string(),
        }),
        None => Ok(()),
    }
}
