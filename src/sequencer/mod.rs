//! Pipeline sequencer
//!
//! Stages always run in the order of [`Stage`], whatever order they were
//! selected in, and each stage finishes over the whole batch before the
//! next one starts. An object that fails a stage is recorded and left out
//! of the later stages; its siblings carry on.
//!
//! Every question (overwrite existing manifests, bag an existing bag again,
//! carry on after a failure, go on to the next stage) is put to a
//! [`DecisionPolicy`]. Filesystem state is read through an
//! [`ObjectInspector`] and all work goes through a [`StageExecutor`].

pub mod executor;
pub mod policy;
pub mod report;

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::inspect::ObjectInspector;
use crate::inventory::OverwriteMode;
use crate::ui::ProgressReporter;

use self::policy::overwrite_mode_for;

pub use executor::{FsExecutor, StageExecutor};
pub use policy::{BatchPolicy, Conflict, Decision, DecisionPolicy, InteractivePolicy};
pub use report::{ObjectOutcome, PipelineReport, StageReport};

/// Pipeline stages, in the order they run
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Nest object contents under a folder of the object's name
    Prepack,
    /// Write the per-object inventory
    Manifest,
    /// Turn each object into a BagIt bag
    Bag,
    /// Write one tar archive per object
    Archive,
    /// Write a batch-wide transfer manifest
    Transfer,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Prepack,
        Stage::Manifest,
        Stage::Bag,
        Stage::Archive,
        Stage::Transfer,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Prepack => "prepack",
            Stage::Manifest => "manifest",
            Stage::Bag => "bag",
            Stage::Archive => "archive",
            Stage::Transfer => "transfer",
        }
    }

    /// Stages run when none are named
    pub fn defaults() -> Vec<Stage> {
        vec![Stage::Manifest, Stage::Bag, Stage::Archive]
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What to run over a batch
#[derive(Debug, Clone, Default)]
pub struct RunPlan {
    pub stages: BTreeSet<Stage>,
    /// Batch-wide overwrite answer given up front; asked once if `None`
    pub overwrite: Option<OverwriteMode>,
    /// Checkpoint with the policy after every stage
    pub step: bool,
}

impl RunPlan {
    pub fn new(stages: impl IntoIterator<Item = Stage>) -> Self {
        Self {
            stages: stages.into_iter().collect(),
            ..Self::default()
        }
    }
}

/// What the gate of a serial stage decided for one object
enum Gate {
    Run { confirmed: bool },
    Done(ObjectOutcome),
    Abort,
}

fn object_name(object: &Path) -> String {
    object
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| object.display().to_string())
}

pub struct Sequencer<'a> {
    inspector: &'a dyn ObjectInspector,
    executor: &'a dyn StageExecutor,
    progress: &'a dyn ProgressReporter,
}

impl<'a> Sequencer<'a> {
    pub fn new(
        inspector: &'a dyn ObjectInspector,
        executor: &'a dyn StageExecutor,
        progress: &'a dyn ProgressReporter,
    ) -> Self {
        Self {
            inspector,
            executor,
            progress,
        }
    }

    /// Run the planned stages over every object of `batch_root`
    pub fn run(
        &self,
        batch_root: &Path,
        plan: &RunPlan,
        policy: &mut dyn DecisionPolicy,
    ) -> Result<PipelineReport> {
        let objects = self.inspector.list_objects(batch_root)?;
        let stages: Vec<Stage> = plan.stages.iter().copied().collect();
        info!(batch = %batch_root.display(), objects = objects.len(), ?stages, "starting run");

        let mut report = PipelineReport::default();
        let mut ran: BTreeSet<Stage> = BTreeSet::new();
        let mut failed_objects: BTreeSet<String> = BTreeSet::new();
        let mut skip_next = false;

        for (index, &stage) in stages.iter().enumerate() {
            if skip_next {
                skip_next = false;
                info!(%stage, "stage skipped by operator");
                report.skipped.push(stage);
                continue;
            }

            let ctx = StageContext {
                objects: &objects,
                ran: &ran,
                failed_objects: &failed_objects,
            };
            info!(%stage, "starting stage");
            let stage_report = match stage {
                Stage::Prepack => self.run_prepack(&ctx, policy)?,
                Stage::Manifest => self.run_manifest(&ctx, plan, policy)?,
                Stage::Bag => self.run_bag(&ctx, policy)?,
                Stage::Archive => self.run_archive(&ctx, policy)?,
                Stage::Transfer => self.run_transfer(batch_root),
            };
            info!("{stage_report}");

            ran.insert(stage);
            failed_objects.extend(stage_report.failures.iter().map(|f| f.object.clone()));
            let aborted = stage_report.aborted;
            report.stages.push(stage_report);

            if aborted {
                warn!(%stage, "run aborted by operator");
                report.not_run = stages[index + 1..].to_vec();
                break;
            }

            if plan.step {
                if let (Some(&next), Some(last)) = (stages.get(index + 1), report.stages.last()) {
                    match policy.after_stage(last, next)? {
                        Decision::Proceed => {}
                        Decision::Skip => skip_next = true,
                        Decision::Abort => {
                            warn!(%next, "run aborted by operator");
                            report.not_run = stages[index + 1..].to_vec();
                            break;
                        }
                    }
                }
            }
        }

        Ok(report)
    }

    fn run_prepack(
        &self,
        ctx: &StageContext<'_>,
        policy: &mut dyn DecisionPolicy,
    ) -> Result<StageReport> {
        self.run_serial(
            Stage::Prepack,
            ctx,
            policy,
            |_, _| Ok(Gate::Run { confirmed: false }),
            |object, _| self.executor.prepack(object),
        )
    }

    fn run_manifest(
        &self,
        ctx: &StageContext<'_>,
        plan: &RunPlan,
        policy: &mut dyn DecisionPolicy,
    ) -> Result<StageReport> {
        let mut report = StageReport::new(Stage::Manifest);
        let eligible = ctx.eligible(&mut report);

        let mode = match plan.overwrite {
            Some(mode) => mode,
            None => {
                let count = eligible
                    .iter()
                    .filter(|o| self.inspector.has_manifest(o) && !self.inspector.is_bagged(o))
                    .count();
                if count == 0 {
                    OverwriteMode::KeepExisting
                } else {
                    match overwrite_mode_for(
                        policy.resolve(&Conflict::ExistingManifests { count })?,
                    ) {
                        Some(mode) => mode,
                        None => {
                            report.aborted = true;
                            report.not_attempted = eligible.iter().map(|o| object_name(o)).collect();
                            return Ok(report);
                        }
                    }
                }
            }
        };

        self.progress.start_stage(Stage::Manifest, eligible.len() as u64);
        let results: Vec<(String, Result<ObjectOutcome>)> = eligible
            .par_iter()
            .map(|object| {
                let name = object_name(object);
                // A bag's payload is frozen; its inventory is never rewritten
                let outcome = if self.inspector.is_bagged(object) {
                    Ok(ObjectOutcome::declined("already a bag"))
                } else {
                    self.executor.manifest(object, mode)
                };
                self.progress.object_done(&name);
                (name, outcome)
            })
            .collect();
        self.progress.finish_stage();

        for (name, result) in results {
            match result {
                Ok(outcome) => {
                    log_outcome(Stage::Manifest, &name, &outcome);
                    report.record(name, outcome);
                }
                Err(e) => {
                    error!(stage = %Stage::Manifest, object = %name, "{e}");
                    report.fail(name, e);
                }
            }
        }
        Ok(report)
    }

    fn run_bag(
        &self,
        ctx: &StageContext<'_>,
        policy: &mut dyn DecisionPolicy,
    ) -> Result<StageReport> {
        let needs_manifest = ctx.ran.contains(&Stage::Manifest);
        self.run_serial(
            Stage::Bag,
            ctx,
            policy,
            |object, policy| {
                if needs_manifest && !self.inspector.has_manifest(object) {
                    return Ok(Gate::Done(ObjectOutcome::declined("no manifest")));
                }
                if !self.inspector.is_bagged(object) {
                    return Ok(Gate::Run { confirmed: false });
                }
                let conflict = Conflict::AlreadyBagged {
                    object: object_name(object),
                };
                Ok(match policy.resolve(&conflict)? {
                    Decision::Proceed => Gate::Run { confirmed: true },
                    Decision::Skip => Gate::Done(ObjectOutcome::declined("already a bag")),
                    Decision::Abort => Gate::Abort,
                })
            },
            |object, confirmed| self.executor.bag(object, confirmed),
        )
    }

    fn run_archive(
        &self,
        ctx: &StageContext<'_>,
        policy: &mut dyn DecisionPolicy,
    ) -> Result<StageReport> {
        let needs_bag = ctx.ran.contains(&Stage::Bag);
        self.run_serial(
            Stage::Archive,
            ctx,
            policy,
            |object, _| {
                if needs_bag && !self.inspector.is_bagged(object) {
                    return Ok(Gate::Done(ObjectOutcome::declined("not bagged")));
                }
                if self.inspector.has_archive(object) {
                    return Ok(Gate::Done(ObjectOutcome::skipped("archive exists")));
                }
                Ok(Gate::Run { confirmed: false })
            },
            |object, _| self.executor.archive(object),
        )
    }

    fn run_transfer(&self, batch_root: &Path) -> StageReport {
        let mut report = StageReport::new(Stage::Transfer);
        let name = object_name(batch_root);
        self.progress.start_stage(Stage::Transfer, 1);
        match self.executor.transfer(batch_root) {
            Ok(outcome) => {
                log_outcome(Stage::Transfer, &name, &outcome);
                report.record(name.clone(), outcome);
            }
            Err(e) => {
                error!(stage = %Stage::Transfer, batch = %name, "{e}");
                report.fail(name.clone(), e);
            }
        }
        self.progress.object_done(&name);
        self.progress.finish_stage();
        report
    }

    /// One object at a time; `gate` checks preconditions and conflicts,
    /// `work` does the stage
    fn run_serial(
        &self,
        stage: Stage,
        ctx: &StageContext<'_>,
        policy: &mut dyn DecisionPolicy,
        gate: impl Fn(&Path, &mut dyn DecisionPolicy) -> Result<Gate>,
        work: impl Fn(&Path, bool) -> Result<ObjectOutcome>,
    ) -> Result<StageReport> {
        let mut report = StageReport::new(stage);
        let eligible = ctx.eligible(&mut report);
        self.progress.start_stage(stage, eligible.len() as u64);

        let mut remaining = eligible.iter();
        while let Some(object) = remaining.next() {
            let name = object_name(object);
            let result = match gate(object, policy)? {
                Gate::Done(outcome) => Ok(outcome),
                Gate::Run { confirmed } => work(object, confirmed),
                Gate::Abort => {
                    report.aborted = true;
                    report.not_attempted.push(name);
                    report
                        .not_attempted
                        .extend(remaining.by_ref().map(|o| object_name(o)));
                    self.progress.abandon();
                    return Ok(report);
                }
            };
            self.progress.object_done(&name);

            match result {
                Ok(outcome) => {
                    log_outcome(stage, &name, &outcome);
                    report.record(name, outcome);
                }
                Err(e) => {
                    error!(%stage, object = %name, "{e}");
                    let conflict = Conflict::ObjectFailed {
                        stage,
                        object: name.clone(),
                        error: e.to_string(),
                    };
                    report.fail(name, e);
                    match policy.resolve(&conflict)? {
                        Decision::Proceed => {}
                        Decision::Skip => {
                            report
                                .not_attempted
                                .extend(remaining.by_ref().map(|o| object_name(o)));
                            self.progress.abandon();
                            return Ok(report);
                        }
                        Decision::Abort => {
                            report.aborted = true;
                            report
                                .not_attempted
                                .extend(remaining.by_ref().map(|o| object_name(o)));
                            self.progress.abandon();
                            return Ok(report);
                        }
                    }
                }
            }
        }

        self.progress.finish_stage();
        Ok(report)
    }
}

/// Batch state shared by every stage of a run
struct StageContext<'r> {
    objects: &'r [PathBuf],
    ran: &'r BTreeSet<Stage>,
    failed_objects: &'r BTreeSet<String>,
}

impl StageContext<'_> {
    /// Objects that did not fail an earlier stage; the rest are declined
    fn eligible(&self, report: &mut StageReport) -> Vec<PathBuf> {
        let mut eligible = Vec::with_capacity(self.objects.len());
        for object in self.objects {
            let name = object_name(object);
            if self.failed_objects.contains(&name) {
                report.record(name, ObjectOutcome::declined("failed an earlier stage"));
            } else {
                eligible.push(object.clone());
            }
        }
        eligible
    }
}

fn log_outcome(stage: Stage, object: &str, outcome: &ObjectOutcome) {
    match outcome {
        ObjectOutcome::Completed { detail } => info!(%stage, object, "{detail}"),
        ObjectOutcome::SkippedExisting { detail } => info!(%stage, object, "skipped: {detail}"),
        ObjectOutcome::Declined { reason } => info!(%stage, object, "not processed: {reason}"),
        ObjectOutcome::Partial { unreadable, .. } => {
            warn!(%stage, object, unreadable, "some files could not be read");
        }
        ObjectOutcome::Invalid { problems } => {
            error!(%stage, object, problems = problems.len(), "bag is not valid");
        }
    }
}

#[cfg(test)]
mod tests;
