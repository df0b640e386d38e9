//! Per-object outcomes and end-of-stage reports

use std::fmt;

use serde::Serialize;

use super::Stage;

/// What one stage did to one object
///
/// Skips and conflicts are outcomes, not errors. A real failure of the
/// stage for this object goes into [`StageReport::failures`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ObjectOutcome {
    /// The stage produced its artifact
    Completed { detail: String },
    /// The artifact was produced but some files could not be read
    Partial { detail: String, unreadable: usize },
    /// A bag was produced but did not validate
    Invalid { problems: Vec<String> },
    /// The artifact was already there
    SkippedExisting { detail: String },
    /// A conflict was resolved as "skip", or a precondition was not met
    Declined { reason: String },
}

impl ObjectOutcome {
    pub fn completed(detail: impl Into<String>) -> Self {
        Self::Completed {
            detail: detail.into(),
        }
    }

    pub fn skipped(detail: impl Into<String>) -> Self {
        Self::SkippedExisting {
            detail: detail.into(),
        }
    }

    pub fn declined(reason: impl Into<String>) -> Self {
        Self::Declined {
            reason: reason.into(),
        }
    }
}

/// An object that failed a whole stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageFailure {
    pub object: String,
    pub error: String,
}

/// Everything one stage did across the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub outcomes: Vec<(String, ObjectOutcome)>,
    pub failures: Vec<StageFailure>,
    /// Objects never attempted because the operator stopped the stage
    pub not_attempted: Vec<String>,
    /// The operator chose to abort the run during this stage
    pub aborted: bool,
}

impl StageReport {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            outcomes: Vec::new(),
            failures: Vec::new(),
            not_attempted: Vec::new(),
            aborted: false,
        }
    }

    pub fn record(&mut self, object: impl Into<String>, outcome: ObjectOutcome) {
        self.outcomes.push((object.into(), outcome));
    }

    pub fn fail(&mut self, object: impl Into<String>, error: impl fmt::Display) {
        self.failures.push(StageFailure {
            object: object.into(),
            error: error.to_string(),
        });
    }

    fn count(&self, pred: impl Fn(&ObjectOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }

    /// Artifacts produced, including partial and invalid ones
    pub fn created(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                ObjectOutcome::Completed { .. }
                    | ObjectOutcome::Partial { .. }
                    | ObjectOutcome::Invalid { .. }
            )
        })
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                ObjectOutcome::SkippedExisting { .. } | ObjectOutcome::Declined { .. }
            )
        })
    }

    pub fn partial(&self) -> usize {
        self.count(|o| matches!(o, ObjectOutcome::Partial { .. }))
    }

    pub fn invalid(&self) -> usize {
        self.count(|o| matches!(o, ObjectOutcome::Invalid { .. }))
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Nothing failed, nothing invalid, nothing left out
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.invalid() == 0 && self.not_attempted.is_empty()
    }

    #[cfg(test)]
    pub fn outcome_of(&self, object: &str) -> Option<&ObjectOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == object)
            .map(|(_, o)| o)
    }

    #[cfg(test)]
    pub fn has_failed(&self, object: &str) -> bool {
        self.failures.iter().any(|f| f.object == object)
    }
}

impl fmt::Display for StageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} created, {} skipped, {} failed",
            self.stage,
            self.created(),
            self.skipped(),
            self.failed()
        )?;
        if self.stage == Stage::Bag {
            write!(
                f,
                " ({} valid, {} invalid)",
                self.created() - self.invalid(),
                self.invalid()
            )?;
        }
        if self.partial() > 0 {
            write!(f, ", {} with unreadable files", self.partial())?;
        }
        if !self.not_attempted.is_empty() {
            write!(f, ", {} not attempted", self.not_attempted.len())?;
        }
        Ok(())
    }
}

/// Reports of every stage that ran, in order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub stages: Vec<StageReport>,
    /// Stages the operator chose to skip at a checkpoint
    pub skipped: Vec<Stage>,
    /// Stages selected but never started because the operator aborted
    pub not_run: Vec<Stage>,
}

impl PipelineReport {
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|r| r.stage == stage)
    }

    pub fn aborted(&self) -> bool {
        self.stages.iter().any(|r| r.aborted) || !self.not_run.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        !self.aborted() && self.stages.iter().all(StageReport::is_clean)
    }
}
