use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::policy::ScriptedPolicy;
use super::*;
use crate::error::PackError;
use crate::ui::SilentProgressReporter;

#[derive(Debug, Default, Clone)]
struct Artifacts {
    manifest: bool,
    bagged: bool,
    archived: bool,
}

/// In-memory batch: answers precondition checks and records every call
#[derive(Default)]
struct FakeBatch {
    objects: Vec<String>,
    state: Mutex<BTreeMap<String, Artifacts>>,
    calls: Mutex<Vec<(Stage, String, bool)>>,
    failing: BTreeSet<(Stage, String)>,
}

impl FakeBatch {
    fn new(objects: &[&str]) -> Self {
        let state = objects
            .iter()
            .map(|o| (o.to_string(), Artifacts::default()))
            .collect();
        Self {
            objects: objects.iter().map(|o| o.to_string()).collect(),
            state: Mutex::new(state),
            ..Self::default()
        }
    }

    fn failing(mut self, stage: Stage, object: &str) -> Self {
        self.failing.insert((stage, object.to_string()));
        self
    }

    fn with(self, object: &str, f: impl FnOnce(&mut Artifacts)) -> Self {
        f(self.state.lock().unwrap().get_mut(object).unwrap());
        self
    }

    fn artifacts(&self, object: &Path) -> Artifacts {
        self.state.lock().unwrap()[&object_name(object)].clone()
    }

    fn calls(&self) -> Vec<(Stage, String, bool)> {
        self.calls.lock().unwrap().clone()
    }

    fn calls_for(&self, stage: Stage) -> Vec<String> {
        let mut names: Vec<String> = self
            .calls()
            .into_iter()
            .filter(|(s, _, _)| *s == stage)
            .map(|(_, o, _)| o)
            .collect();
        names.sort();
        names
    }

    fn call(&self, stage: Stage, object: &Path, flag: bool) -> Result<()> {
        let name = object_name(object);
        self.calls.lock().unwrap().push((stage, name.clone(), flag));
        if self.failing.contains(&(stage, name.clone())) {
            return Err(PackError::FileReadFailed {
                path: name,
                reason: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

impl ObjectInspector for FakeBatch {
    fn list_objects(&self, batch_root: &Path) -> Result<Vec<PathBuf>> {
        Ok(self.objects.iter().map(|o| batch_root.join(o)).collect())
    }

    fn has_manifest(&self, object: &Path) -> bool {
        self.artifacts(object).manifest
    }

    fn is_bagged(&self, object: &Path) -> bool {
        self.artifacts(object).bagged
    }

    fn has_archive(&self, object: &Path) -> bool {
        self.artifacts(object).archived
    }
}

impl StageExecutor for FakeBatch {
    fn prepack(&self, object: &Path) -> Result<ObjectOutcome> {
        self.call(Stage::Prepack, object, false)?;
        Ok(ObjectOutcome::completed("nested"))
    }

    fn manifest(&self, object: &Path, mode: OverwriteMode) -> Result<ObjectOutcome> {
        self.call(Stage::Manifest, object, mode == OverwriteMode::OverwriteAll)?;
        let mut state = self.state.lock().unwrap();
        let artifacts = state.get_mut(&object_name(object)).unwrap();
        if artifacts.manifest && mode == OverwriteMode::KeepExisting {
            return Ok(ObjectOutcome::skipped("manifest exists"));
        }
        artifacts.manifest = true;
        Ok(ObjectOutcome::completed("written"))
    }

    fn bag(&self, object: &Path, confirmed_rebag: bool) -> Result<ObjectOutcome> {
        self.call(Stage::Bag, object, confirmed_rebag)?;
        let mut state = self.state.lock().unwrap();
        state.get_mut(&object_name(object)).unwrap().bagged = true;
        Ok(ObjectOutcome::completed("bagged"))
    }

    fn archive(&self, object: &Path) -> Result<ObjectOutcome> {
        self.call(Stage::Archive, object, false)?;
        let mut state = self.state.lock().unwrap();
        state.get_mut(&object_name(object)).unwrap().archived = true;
        Ok(ObjectOutcome::completed("archived"))
    }

    fn transfer(&self, batch_root: &Path) -> Result<ObjectOutcome> {
        self.call(Stage::Transfer, batch_root, false)?;
        Ok(ObjectOutcome::completed("Transfer_batch.csv"))
    }
}

fn run(batch: &FakeBatch, plan: &RunPlan, policy: &mut dyn DecisionPolicy) -> PipelineReport {
    let progress = SilentProgressReporter;
    Sequencer::new(batch, batch, &progress)
        .run(Path::new("/batch"), plan, policy)
        .unwrap()
}

fn full_plan() -> RunPlan {
    RunPlan::new([Stage::Archive, Stage::Manifest, Stage::Bag])
}

#[test]
fn test_stages_run_in_fixed_order_over_whole_batch() {
    let batch = FakeBatch::new(&["obj1", "obj2", "obj3"]);
    let report = run(&batch, &full_plan(), &mut BatchPolicy::default());

    let stages: Vec<Stage> = batch.calls().iter().map(|(s, _, _)| *s).collect();
    let mut sorted = stages.clone();
    sorted.sort();
    assert_eq!(stages, sorted, "a later stage started before an earlier one finished");
    assert_eq!(stages.len(), 9);

    let order: Vec<Stage> = report.stages.iter().map(|r| r.stage).collect();
    assert_eq!(order, vec![Stage::Manifest, Stage::Bag, Stage::Archive]);
    assert!(report.is_clean());
}

#[test]
fn test_failure_is_isolated_to_its_object() {
    let batch = FakeBatch::new(&["obj1", "obj2"]).failing(Stage::Bag, "obj1");
    let report = run(&batch, &full_plan(), &mut BatchPolicy::default());

    let bag = report.stage(Stage::Bag).unwrap();
    assert_eq!(bag.failed(), 1);
    assert!(bag.has_failed("obj1"));
    assert_eq!(bag.outcome_of("obj2"), Some(&ObjectOutcome::completed("bagged")));

    let archive = report.stage(Stage::Archive).unwrap();
    assert_eq!(
        archive.outcome_of("obj1"),
        Some(&ObjectOutcome::declined("failed an earlier stage"))
    );
    assert_eq!(batch.calls_for(Stage::Archive), vec!["obj2"]);
    assert!(!report.is_clean());
}

#[test]
fn test_declined_rebag_never_calls_executor() {
    let batch = FakeBatch::new(&["obj1", "obj2"]).with("obj1", |a| {
        a.manifest = true;
        a.bagged = true;
    });
    let mut policy = ScriptedPolicy {
        conflicts: VecDeque::from([Decision::Skip]),
        ..ScriptedPolicy::default()
    };
    let report = run(&batch, &RunPlan::new([Stage::Bag]), &mut policy);

    assert_eq!(batch.calls_for(Stage::Bag), vec!["obj2"]);
    assert_eq!(
        report.stage(Stage::Bag).unwrap().outcome_of("obj1"),
        Some(&ObjectOutcome::declined("already a bag"))
    );
    assert_eq!(
        policy.asked,
        vec![Conflict::AlreadyBagged {
            object: "obj1".to_string()
        }]
    );
}

#[test]
fn test_confirmed_rebag_passes_confirmation() {
    let batch = FakeBatch::new(&["obj1"]).with("obj1", |a| a.bagged = true);
    let mut policy = ScriptedPolicy {
        conflicts: VecDeque::from([Decision::Proceed]),
        ..ScriptedPolicy::default()
    };
    run(&batch, &RunPlan::new([Stage::Bag]), &mut policy);
    assert_eq!(batch.calls(), vec![(Stage::Bag, "obj1".to_string(), true)]);
}

#[test]
fn test_overwrite_question_asked_once_per_batch() {
    let batch = FakeBatch::new(&["obj1", "obj2", "obj3"])
        .with("obj1", |a| a.manifest = true)
        .with("obj2", |a| a.manifest = true);
    let mut policy = ScriptedPolicy {
        conflicts: VecDeque::from([Decision::Proceed]),
        ..ScriptedPolicy::default()
    };
    run(&batch, &RunPlan::new([Stage::Manifest]), &mut policy);

    assert_eq!(policy.asked, vec![Conflict::ExistingManifests { count: 2 }]);
    assert!(batch.calls().iter().all(|(_, _, overwrite)| *overwrite));
}

#[test]
fn test_overwrite_given_up_front_is_not_asked() {
    let batch = FakeBatch::new(&["obj1"]).with("obj1", |a| a.manifest = true);
    let mut policy = ScriptedPolicy::default();
    let plan = RunPlan {
        overwrite: Some(OverwriteMode::KeepExisting),
        ..RunPlan::new([Stage::Manifest])
    };
    let report = run(&batch, &plan, &mut policy);

    assert!(policy.asked.is_empty());
    assert_eq!(
        report.stage(Stage::Manifest).unwrap().outcome_of("obj1"),
        Some(&ObjectOutcome::skipped("manifest exists"))
    );
}

#[test]
fn test_abort_at_checkpoint_stops_later_stages() {
    let batch = FakeBatch::new(&["obj1", "obj2"]);
    let mut policy = ScriptedPolicy {
        checkpoints: VecDeque::from([Decision::Abort]),
        ..ScriptedPolicy::default()
    };
    let plan = RunPlan {
        step: true,
        ..full_plan()
    };
    let report = run(&batch, &plan, &mut policy);

    assert_eq!(policy.checkpoints_seen, vec![Stage::Bag]);
    assert_eq!(report.not_run, vec![Stage::Bag, Stage::Archive]);
    assert!(batch.calls_for(Stage::Bag).is_empty());
    assert!(report.aborted());
}

#[test]
fn test_skip_at_checkpoint_skips_one_stage() {
    let batch = FakeBatch::new(&["obj1"]);
    let mut policy = ScriptedPolicy {
        checkpoints: VecDeque::from([Decision::Skip]),
        ..ScriptedPolicy::default()
    };
    let plan = RunPlan {
        step: true,
        ..full_plan()
    };
    let report = run(&batch, &plan, &mut policy);

    assert_eq!(report.skipped, vec![Stage::Bag]);
    assert!(batch.calls_for(Stage::Bag).is_empty());
    // bagging never ran, so archiving does not wait for it
    assert_eq!(batch.calls_for(Stage::Archive), vec!["obj1"]);
}

#[test]
fn test_skip_remaining_objects_after_failure() {
    let batch = FakeBatch::new(&["obj1", "obj2", "obj3"]).failing(Stage::Archive, "obj1");
    let mut policy = ScriptedPolicy {
        conflicts: VecDeque::from([Decision::Skip]),
        ..ScriptedPolicy::default()
    };
    let report = run(&batch, &RunPlan::new([Stage::Archive]), &mut policy);

    let archive = report.stage(Stage::Archive).unwrap();
    assert_eq!(archive.not_attempted, vec!["obj2", "obj3"]);
    assert!(!archive.aborted);
    assert_eq!(batch.calls_for(Stage::Archive), vec!["obj1"]);
}

#[test]
fn test_rerun_is_a_no_op() {
    let batch = FakeBatch::new(&["obj1", "obj2"]);
    run(&batch, &full_plan(), &mut BatchPolicy::default());
    let first_calls = batch.calls().len();

    let report = run(&batch, &full_plan(), &mut BatchPolicy::default());
    for stage in &report.stages {
        assert_eq!(stage.created(), 0, "{stage}");
        assert_eq!(stage.skipped(), 2, "{stage}");
    }
    // every object is a bag by now, so the precondition checks settle it all
    assert_eq!(batch.calls().len(), first_calls);
}

#[test]
fn test_overwrite_never_touches_a_bag() {
    let batch = FakeBatch::new(&["obj1", "obj2"]).with("obj1", |a| {
        a.manifest = true;
        a.bagged = true;
    });
    let mut policy = ScriptedPolicy::default();
    let plan = RunPlan {
        overwrite: Some(OverwriteMode::OverwriteAll),
        ..RunPlan::new([Stage::Manifest])
    };
    let report = run(&batch, &plan, &mut policy);

    assert_eq!(batch.calls_for(Stage::Manifest), vec!["obj2"]);
    assert_eq!(
        report.stage(Stage::Manifest).unwrap().outcome_of("obj1"),
        Some(&ObjectOutcome::declined("already a bag"))
    );
}

#[test]
fn test_bagged_manifests_are_not_an_overwrite_question() {
    let batch = FakeBatch::new(&["obj1"]).with("obj1", |a| {
        a.manifest = true;
        a.bagged = true;
    });
    let mut policy = ScriptedPolicy::default();
    run(&batch, &RunPlan::new([Stage::Manifest]), &mut policy);
    assert!(policy.asked.is_empty());
}

#[test]
fn test_transfer_runs_once_per_batch() {
    let batch = FakeBatch::new(&["obj1", "obj2"]);
    let report = run(
        &batch,
        &RunPlan::new([Stage::Transfer]),
        &mut BatchPolicy::default(),
    );
    assert_eq!(batch.calls_for(Stage::Transfer), vec!["batch"]);
    assert_eq!(report.stage(Stage::Transfer).unwrap().created(), 1);
}

#[test]
fn test_bag_waits_for_manifest_in_same_run() {
    let batch = FakeBatch::new(&["obj1", "obj2"]).failing(Stage::Manifest, "obj1");
    let report = run(
        &batch,
        &RunPlan::new([Stage::Manifest, Stage::Bag]),
        &mut BatchPolicy::default(),
    );
    assert_eq!(batch.calls_for(Stage::Bag), vec!["obj2"]);
    assert_eq!(
        report.stage(Stage::Bag).unwrap().outcome_of("obj1"),
        Some(&ObjectOutcome::declined("failed an earlier stage"))
    );
}
