//! Operator decisions at conflicts and stage checkpoints
//!
//! The sequencer never prompts by itself. Every question goes through a
//! [`DecisionPolicy`]: [`BatchPolicy`] answers from command-line flags,
//! [`InteractivePolicy`] asks on the terminal.

use inquire::{Confirm, Select};
use tracing::debug;

use super::Stage;
use super::report::StageReport;
use crate::error::Result;
use crate::inventory::OverwriteMode;

/// Answer to a conflict or checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Skip,
    Abort,
}

/// A situation that needs an explicit answer before work continues
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// Some objects already have a manifest. Asked once per batch:
    /// `Proceed` overwrites all of them, `Skip` keeps all of them.
    ExistingManifests { count: usize },
    /// An object already has `data/`; `Proceed` bags it again
    AlreadyBagged { object: String },
    /// An object failed the running stage; `Skip` leaves the remaining
    /// objects of the stage alone
    ObjectFailed {
        stage: Stage,
        object: String,
        error: String,
    },
}

pub trait DecisionPolicy {
    /// Resolve one conflict
    fn resolve(&mut self, conflict: &Conflict) -> Result<Decision>;

    /// Checkpoint after a stage when step mode is on.
    /// `Skip` skips `next`; `Abort` stops the run.
    fn after_stage(&mut self, report: &StageReport, next: Stage) -> Result<Decision>;
}

/// Map a manifest conflict decision onto the batch-wide overwrite mode
pub fn overwrite_mode_for(decision: Decision) -> Option<OverwriteMode> {
    match decision {
        Decision::Proceed => Some(OverwriteMode::OverwriteAll),
        Decision::Skip => Some(OverwriteMode::KeepExisting),
        Decision::Abort => None,
    }
}

/// Non-interactive answers fixed up front
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchPolicy {
    pub overwrite: OverwriteMode,
    pub rebag: bool,
}

impl DecisionPolicy for BatchPolicy {
    fn resolve(&mut self, conflict: &Conflict) -> Result<Decision> {
        let decision = match conflict {
            Conflict::ExistingManifests { .. } => match self.overwrite {
                OverwriteMode::OverwriteAll => Decision::Proceed,
                OverwriteMode::KeepExisting => Decision::Skip,
            },
            Conflict::AlreadyBagged { .. } => {
                if self.rebag {
                    Decision::Proceed
                } else {
                    Decision::Skip
                }
            }
            Conflict::ObjectFailed { .. } => Decision::Proceed,
        };
        debug!(?conflict, ?decision, "batch policy");
        Ok(decision)
    }

    fn after_stage(&mut self, _report: &StageReport, _next: Stage) -> Result<Decision> {
        Ok(Decision::Proceed)
    }
}

/// Terminal prompts through `inquire`
#[derive(Debug, Default)]
pub struct InteractivePolicy;

const CONTINUE: &str = "Continue";
const SKIP_NEXT: &str = "Skip the next stage";
const ABORT: &str = "Abort";

impl DecisionPolicy for InteractivePolicy {
    fn resolve(&mut self, conflict: &Conflict) -> Result<Decision> {
        match conflict {
            Conflict::ExistingManifests { count } => {
                let overwrite = Confirm::new(&format!(
                    "{count} object(s) already have a manifest. Overwrite ALL of them?"
                ))
                .with_default(false)
                .with_help_message("'n' keeps every existing manifest and skips those objects")
                .prompt()?;
                Ok(if overwrite {
                    Decision::Proceed
                } else {
                    Decision::Skip
                })
            }
            Conflict::AlreadyBagged { object } => {
                let again = Confirm::new(&format!("'{object}' is already a bag. Bag it anyway?"))
                    .with_default(false)
                    .with_help_message("Bagging again nests the existing bag inside a new payload")
                    .prompt()?;
                Ok(if again {
                    Decision::Proceed
                } else {
                    Decision::Skip
                })
            }
            Conflict::ObjectFailed {
                stage,
                object,
                error,
            } => {
                println!("{stage} failed for '{object}': {error}");
                let options = vec![
                    "Continue with the remaining objects",
                    "Skip the remaining objects in this stage",
                    ABORT,
                ];
                let choice = Select::new("How should the run continue?", options)
                    .without_filtering()
                    .prompt()?;
                Ok(match choice {
                    ABORT => Decision::Abort,
                    "Skip the remaining objects in this stage" => Decision::Skip,
                    _ => Decision::Proceed,
                })
            }
        }
    }

    fn after_stage(&mut self, report: &StageReport, next: Stage) -> Result<Decision> {
        println!("{report}");
        let choice = Select::new(&format!("Next stage: {next}"), vec![CONTINUE, SKIP_NEXT, ABORT])
            .without_filtering()
            .with_help_message("↑↓ to move, ENTER to select")
            .prompt()?;
        Ok(match choice {
            SKIP_NEXT => Decision::Skip,
            ABORT => Decision::Abort,
            _ => Decision::Proceed,
        })
    }
}

/// Replays canned answers; unanswered questions get `fallback`
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ScriptedPolicy {
    pub conflicts: std::collections::VecDeque<Decision>,
    pub checkpoints: std::collections::VecDeque<Decision>,
    pub fallback: Option<Decision>,
    pub asked: Vec<Conflict>,
    pub checkpoints_seen: Vec<Stage>,
}

#[cfg(test)]
impl DecisionPolicy for ScriptedPolicy {
    fn resolve(&mut self, conflict: &Conflict) -> Result<Decision> {
        self.asked.push(conflict.clone());
        Ok(self
            .conflicts
            .pop_front()
            .or(self.fallback)
            .unwrap_or(Decision::Skip))
    }

    fn after_stage(&mut self, _report: &StageReport, next: Stage) -> Result<Decision> {
        self.checkpoints_seen.push(next);
        Ok(self.checkpoints.pop_front().unwrap_or(Decision::Proceed))
    }
}
