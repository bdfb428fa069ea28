//! Five-stage gate pipeline.
//!
//! Stages run strictly in order and the first stage that does not pass ends the
//! run; later stages are recorded as skipped. Nothing is carried between stages
//! and nothing is written, so rerunning against the same inputs gives the same
//! outcome.
use crate::config::{resolve_path, AuditConfig};
use crate::diff::{self, DiffFinding, DiffSource};
use crate::evidence::{self, EvidenceEntry};
use crate::runner::{TestOutcome, TestProgram};
use crate::structural::{self, StructuralVerdict};
use serde::Serialize;
use std::path::Path;

pub const EXIT_SUCCESS: i32 = 0;
/// A stage ran and its check did not hold.
pub const EXIT_FAILED: i32 = 1;
/// A stage could not run (collaborator missing, unreadable input, bad config).
pub const EXIT_ERROR: i32 = 2;
pub const EXIT_TIMEOUT: i32 = 124;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    DiffEvidence,
    Reproduction,
    Invariants,
    Structural,
    Evidence,
}

impl StageId {
    pub const ALL: [StageId; 5] = [
        StageId::DiffEvidence,
        StageId::Reproduction,
        StageId::Invariants,
        StageId::Structural,
        StageId::Evidence,
    ];

    pub fn number(&self) -> usize {
        match self {
            StageId::DiffEvidence => 1,
            StageId::Reproduction => 2,
            StageId::Invariants => 3,
            StageId::Structural => 4,
            StageId::Evidence => 5,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            StageId::DiffEvidence => "Diff evidence",
            StageId::Reproduction => "Reproduction test",
            StageId::Invariants => "Invariant (gate) tests",
            StageId::Structural => "Structural verification",
            StageId::Evidence => "Evidence package",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Passed,
    Failed,
    Error,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageDetail {
    Diff(DiffFinding),
    Test {
        command: String,
        outcome: TestOutcome,
    },
    Structural {
        source_file: String,
        verdict: StructuralVerdict,
    },
    Evidence {
        files: Vec<EvidenceEntry>,
    },
    /// The stage could not run at all.
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: StageId,
    pub status: StageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<StageDetail>,
    /// Exit status this stage imposes on the run when it is the first failure.
    #[serde(skip)]
    pub exit_code: i32,
}

impl StageReport {
    fn new(stage: StageId, status: StageStatus, detail: StageDetail, exit_code: i32) -> Self {
        Self {
            stage,
            status,
            detail: Some(detail),
            exit_code,
        }
    }

    fn error(stage: StageId, err: &anyhow::Error) -> Self {
        Self::new(
            stage,
            StageStatus::Error,
            StageDetail::Error {
                message: format!("{err:#}"),
            },
            EXIT_ERROR,
        )
    }

    fn skipped(stage: StageId) -> Self {
        Self {
            stage,
            status: StageStatus::Skipped,
            detail: None,
            exit_code: EXIT_SUCCESS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineOutcome {
    pub passed: bool,
    pub exit_code: i32,
    pub stages: Vec<StageReport>,
}

/// External capabilities the pipeline delegates to.
pub struct Collaborators<'a> {
    pub diff: &'a dyn DiffSource,
    pub reproduction: &'a dyn TestProgram,
    pub invariants: &'a dyn TestProgram,
}

/// Receives stage boundaries as they happen, so test program output lands
/// under the right heading.
pub trait StageObserver {
    fn stage_started(&mut self, _stage: StageId) {}
    fn stage_finished(&mut self, _report: &StageReport) {}
}

/// Observer that ignores all events.
pub struct Silent;

impl StageObserver for Silent {}

pub fn run_pipeline(
    config: &AuditConfig,
    root: &Path,
    collaborators: &Collaborators<'_>,
    observer: &mut dyn StageObserver,
) -> PipelineOutcome {
    let mut stages = Vec::with_capacity(StageId::ALL.len());
    let mut exit_code = EXIT_SUCCESS;
    let mut halted = false;

    for stage in StageId::ALL {
        if halted {
            stages.push(StageReport::skipped(stage));
            continue;
        }
        observer.stage_started(stage);
        let report = run_stage(stage, config, root, collaborators);
        tracing::info!(stage = ?stage, status = ?report.status, "stage finished");
        observer.stage_finished(&report);
        if report.status != StageStatus::Passed {
            halted = true;
            exit_code = if report.exit_code == EXIT_SUCCESS {
                EXIT_FAILED
            } else {
                report.exit_code
            };
        }
        stages.push(report);
    }

    PipelineOutcome {
        passed: !halted,
        exit_code,
        stages,
    }
}

fn run_stage(
    stage: StageId,
    config: &AuditConfig,
    root: &Path,
    collaborators: &Collaborators<'_>,
) -> StageReport {
    match stage {
        StageId::DiffEvidence => diff_stage(config, collaborators.diff),
        StageId::Reproduction => test_stage(stage, collaborators.reproduction),
        StageId::Invariants => test_stage(stage, collaborators.invariants),
        StageId::Structural => structural_stage(config, root),
        StageId::Evidence => StageReport::new(
            stage,
            StageStatus::Passed,
            StageDetail::Evidence {
                files: evidence::enumerate(root, &config.evidence.files),
            },
            EXIT_SUCCESS,
        ),
    }
}

fn diff_stage(config: &AuditConfig, source: &dyn DiffSource) -> StageReport {
    let stage = StageId::DiffEvidence;
    // GitDiff runs inside the root, so the path stays as configured.
    match diff::check_removal(source, Path::new(&config.diff.file), &config.diff.marker) {
        Ok(finding) if finding.found => {
            StageReport::new(stage, StageStatus::Passed, StageDetail::Diff(finding), EXIT_SUCCESS)
        }
        Ok(finding) => {
            StageReport::new(stage, StageStatus::Failed, StageDetail::Diff(finding), EXIT_FAILED)
        }
        Err(err) => StageReport::error(stage, &err),
    }
}

fn test_stage(stage: StageId, program: &dyn TestProgram) -> StageReport {
    let command = program.describe();
    let outcome = match program.run() {
        Ok(outcome) => outcome,
        Err(err) => return StageReport::error(stage, &err),
    };
    let (status, exit_code) = match outcome {
        TestOutcome::Passed => (StageStatus::Passed, EXIT_SUCCESS),
        TestOutcome::Failed { exit_code } => {
            (StageStatus::Failed, exit_code.unwrap_or(EXIT_FAILED))
        }
        TestOutcome::TimedOut { .. } => (StageStatus::Failed, EXIT_TIMEOUT),
    };
    StageReport::new(stage, status, StageDetail::Test { command, outcome }, exit_code)
}

fn structural_stage(config: &AuditConfig, root: &Path) -> StageReport {
    let stage = StageId::Structural;
    let path = resolve_path(root, &config.structural.source_file);
    match structural::verify_file(&path, &config.structural) {
        Ok(verdict) => {
            let (status, exit_code) = if verdict.passed() {
                (StageStatus::Passed, EXIT_SUCCESS)
            } else {
                (StageStatus::Failed, EXIT_FAILED)
            };
            StageReport::new(
                stage,
                status,
                StageDetail::Structural {
                    source_file: config.structural.source_file.clone(),
                    verdict,
                },
                exit_code,
            )
        }
        Err(err) => StageReport::error(stage, &err),
    }
}
