//! Operator-facing report.
//!
//! Rendering is string-building only; `Console` decides when to print so that
//! test program output appears between a stage heading and its verdict.
use crate::diff::DiffFinding;
use crate::evidence::EvidenceEntry;
use crate::pipeline::{
    PipelineOutcome, StageDetail, StageId, StageObserver, StageReport, StageStatus,
};
use crate::runner::TestOutcome;
use crate::structural::{Expectation, StructuralVerdict};
use anyhow::{Context, Result};

const RULE: &str = "================================================================";

/// Prints each stage to stdout as the pipeline reaches it.
pub struct Console;

impl StageObserver for Console {
    fn stage_started(&mut self, stage: StageId) {
        print!("{}", render_stage_header(stage));
    }

    fn stage_finished(&mut self, report: &StageReport) {
        print!("{}", render_stage_body(report));
    }
}

pub fn render_stage_header(stage: StageId) -> String {
    let mut out = String::new();
    push_line(&mut out, RULE);
    push_line(
        &mut out,
        &format!(
            "[{}/{}] {}",
            stage.number(),
            StageId::ALL.len(),
            stage.title()
        ),
    );
    push_line(&mut out, RULE);
    out
}

pub fn render_stage_body(report: &StageReport) -> String {
    let mut out = String::new();
    match &report.detail {
        Some(StageDetail::Diff(finding)) => render_diff(&mut out, finding),
        Some(StageDetail::Test { command, outcome }) => render_test(&mut out, command, outcome),
        Some(StageDetail::Structural {
            source_file,
            verdict,
        }) => render_structural(&mut out, source_file, verdict),
        Some(StageDetail::Evidence { files }) => render_evidence(&mut out, files),
        Some(StageDetail::Error { message }) => {
            push_line(&mut out, &format!("ERROR: could not run: {message}"));
        }
        None => {}
    }
    if report.status == StageStatus::Failed {
        push_line(&mut out, &format!("STAGE FAILED: {}", report.stage.title()));
    }
    push_line(&mut out, "");
    out
}

/// Final verdict line(s), including which stages never ran.
pub fn render_summary(outcome: &PipelineOutcome) -> String {
    let mut out = String::new();
    push_line(&mut out, RULE);
    if outcome.passed {
        push_line(&mut out, "RESULT: PASS - all 5 stages passed; hotfix evidence complete");
    } else if let Some(first) = outcome
        .stages
        .iter()
        .find(|stage| !matches!(stage.status, StageStatus::Passed | StageStatus::Skipped))
    {
        push_line(
            &mut out,
            &format!(
                "RESULT: FAIL - stopped at stage {} ({}), exit status {}",
                first.stage.number(),
                first.stage.title(),
                outcome.exit_code
            ),
        );
        let skipped: Vec<&str> = outcome
            .stages
            .iter()
            .filter(|stage| stage.status == StageStatus::Skipped)
            .map(|stage| stage.stage.title())
            .collect();
        if !skipped.is_empty() {
            push_line(&mut out, &format!("Not run: {}", skipped.join(", ")));
        }
    }
    push_line(&mut out, RULE);
    out
}

pub fn render_json(outcome: &PipelineOutcome) -> Result<String> {
    serde_json::to_string_pretty(outcome).context("serialize pipeline outcome")
}

fn render_diff(out: &mut String, finding: &DiffFinding) {
    push_line(out, &format!("  file:   {}", finding.file));
    push_line(out, &format!("  marker: {}", finding.marker));
    if finding.found {
        push_line(out, "PASS: removal marker present in diff");
        if let Some(line) = &finding.evidence_line {
            push_line(out, &format!("    {line}"));
        }
    } else {
        push_line(
            out,
            &format!(
                "FAIL: removal marker absent from diff ({} diff lines scanned)",
                finding.diff_lines
            ),
        );
    }
}

fn render_test(out: &mut String, command: &str, outcome: &TestOutcome) {
    push_line(out, &format!("  command: {command}"));
    match outcome {
        TestOutcome::Passed => push_line(out, "PASS: exited with status 0"),
        TestOutcome::Failed {
            exit_code: Some(code),
        } => push_line(out, &format!("FAIL: exited with status {code}")),
        TestOutcome::Failed { exit_code: None } => {
            push_line(out, "FAIL: terminated by signal")
        }
        TestOutcome::TimedOut { seconds } => push_line(
            out,
            &format!("FAIL: timed out after {seconds}s and was killed"),
        ),
    }
}

fn render_structural(out: &mut String, source_file: &str, verdict: &StructuralVerdict) {
    push_line(out, &format!("  source: {source_file}"));
    match verdict {
        StructuralVerdict::NotFound { locator } => {
            push_line(out, &format!("FAIL: function not found: {locator}"));
        }
        StructuralVerdict::Checked {
            function_line,
            window,
            results,
        } => {
            push_line(out, &format!("  function at line {function_line}"));
            push_line(
                out,
                &format!(
                    "  window: lines {}-{} ({} lines)",
                    window.first_line, window.last_line, window.line_count
                ),
            );
            for result in results {
                let mark = if result.passed { "PASS" } else { "FAIL" };
                let expect = match result.expectation {
                    Expectation::Absent => "absent",
                    Expectation::Present => "present",
                };
                let mut line = format!(
                    "{mark}: {} (must be {expect}: {:?}): {}",
                    result.kind.label(),
                    result.marker,
                    result.reason
                );
                if !result.hit_lines.is_empty() {
                    let lines: Vec<String> =
                        result.hit_lines.iter().map(|n| n.to_string()).collect();
                    line.push_str(&format!(" [line {}]", lines.join(", ")));
                }
                push_line(out, &line);
            }
        }
    }
}

fn render_evidence(out: &mut String, files: &[EvidenceEntry]) {
    for entry in files {
        let note = if entry.exists { "" } else { " (not present)" };
        push_line(out, &format!("  - {}{note}", entry.name));
    }
    push_line(out, &format!("PASS: {} evidence artifacts listed", files.len()));
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}
