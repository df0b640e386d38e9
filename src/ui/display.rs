//! Console summaries for stage reports, comparisons and bag checks

use console::Style;

use crate::bag::BagValidation;
use crate::manifest::Comparison;
use crate::sequencer::report::{ObjectOutcome, PipelineReport, StageReport};

/// One stage: summary line, then failures and invalid bags
pub fn display_stage_report(report: &StageReport) {
    let style = if report.is_clean() {
        Style::new().green()
    } else {
        Style::new().yellow()
    };
    println!("{}", style.apply_to(report));

    for failure in &report.failures {
        println!(
            "  {} {}: {}",
            Style::new().red().bold().apply_to("failed"),
            failure.object,
            failure.error
        );
    }
    for (object, outcome) in &report.outcomes {
        match outcome {
            ObjectOutcome::Invalid { problems } => {
                println!(
                    "  {} {object}",
                    Style::new().red().bold().apply_to("invalid bag")
                );
                for problem in problems {
                    println!("    {problem}");
                }
            }
            ObjectOutcome::Partial { unreadable, .. } => {
                println!(
                    "  {} {object}: {unreadable} file(s) could not be read",
                    Style::new().yellow().apply_to("partial")
                );
            }
            _ => {}
        }
    }
    for object in &report.not_attempted {
        println!("  {} {object}", Style::new().dim().apply_to("not attempted"));
    }
}

pub fn display_pipeline_report(report: &PipelineReport) {
    for stage in &report.stages {
        display_stage_report(stage);
    }
    for stage in &report.skipped {
        println!("{}", Style::new().dim().apply_to(format!("{stage}: skipped")));
    }
    if !report.not_run.is_empty() {
        let names: Vec<String> = report.not_run.iter().map(ToString::to_string).collect();
        println!(
            "{} {}",
            Style::new().yellow().bold().apply_to("Aborted; not run:"),
            names.join(", ")
        );
    }
}

/// Print a manifest comparison; mismatches are the loudest thing we print
pub fn display_comparison(comparison: &Comparison) {
    match comparison {
        Comparison::Identical => {
            println!("{}", Style::new().green().bold().apply_to("Identical"));
        }
        Comparison::Diff(diff) => {
            println!("{}", Style::new().red().bold().apply_to("MISMATCH"));
            for (label, paths) in [
                ("missing", &diff.missing),
                ("added", &diff.added),
                ("changed", &diff.changed),
                ("unread", &diff.unverified),
            ] {
                for path in paths {
                    println!("  {:<8} {path}", Style::new().red().apply_to(label));
                }
            }
        }
    }
}

pub fn display_bag_validation(name: &str, validation: &BagValidation) {
    if validation.is_valid() {
        println!(
            "{} {name} ({} files)",
            Style::new().green().bold().apply_to("valid"),
            validation.files_checked
        );
    } else {
        println!("{} {name}", Style::new().red().bold().apply_to("invalid"));
        for problem in &validation.problems {
            println!("  {problem}");
        }
    }
}
