//! The three literal pattern checks run against a scan window.
use super::window::ScanWindow;
use crate::config::StructuralConfig;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    Absent,
    Present,
}

/// Named checks, declared in evaluation and reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    ForbiddenBroadHandler,
    RequiredNarrowHandler,
    RequiredReturnStatement,
}

impl CheckKind {
    pub fn label(&self) -> &'static str {
        match self {
            CheckKind::ForbiddenBroadHandler => "forbidden broad handler",
            CheckKind::RequiredNarrowHandler => "required narrow handler",
            CheckKind::RequiredReturnStatement => "required return statement",
        }
    }

    pub fn expectation(&self) -> Expectation {
        match self {
            CheckKind::ForbiddenBroadHandler => Expectation::Absent,
            CheckKind::RequiredNarrowHandler | CheckKind::RequiredReturnStatement => {
                Expectation::Present
            }
        }
    }

    fn pass_reason(&self) -> &'static str {
        match self {
            CheckKind::ForbiddenBroadHandler => "overly broad handler removed",
            CheckKind::RequiredNarrowHandler => "required narrow handler present",
            CheckKind::RequiredReturnStatement => "required return statement present",
        }
    }

    fn fail_reason(&self) -> &'static str {
        match self {
            CheckKind::ForbiddenBroadHandler => "overly broad handler still present",
            CheckKind::RequiredNarrowHandler => "required narrow handler missing",
            CheckKind::RequiredReturnStatement => "required return statement missing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternCheck {
    pub kind: CheckKind,
    pub marker: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub kind: CheckKind,
    pub marker: String,
    pub expectation: Expectation,
    pub passed: bool,
    pub reason: String,
    /// Window lines where the marker occurs (1-based, absolute).
    pub hit_lines: Vec<usize>,
}

impl PatternCheck {
    /// Case-sensitive literal containment over the joined window text.
    pub fn evaluate(&self, window: &ScanWindow<'_>) -> CheckResult {
        let found = window.text().contains(&self.marker);
        let expectation = self.kind.expectation();
        let passed = match expectation {
            Expectation::Absent => !found,
            Expectation::Present => found,
        };
        let reason = if passed {
            self.kind.pass_reason()
        } else {
            self.kind.fail_reason()
        };
        CheckResult {
            kind: self.kind,
            marker: self.marker.clone(),
            expectation,
            passed,
            reason: reason.to_string(),
            hit_lines: window.lines_containing(&self.marker),
        }
    }
}

/// The fixed check list, in the order results are reported.
pub fn standard_checks(config: &StructuralConfig) -> Vec<PatternCheck> {
    vec![
        PatternCheck {
            kind: CheckKind::ForbiddenBroadHandler,
            marker: config.forbidden_broad_handler.clone(),
        },
        PatternCheck {
            kind: CheckKind::RequiredNarrowHandler,
            marker: config.required_narrow_handler.clone(),
        },
        PatternCheck {
            kind: CheckKind::RequiredReturnStatement,
            marker: config.required_return_statement.clone(),
        },
    ]
}

/// Evaluate every check; a failure never stops the remaining ones.
pub fn evaluate_all(checks: &[PatternCheck], window: &ScanWindow<'_>) -> Vec<CheckResult> {
    checks.iter().map(|check| check.evaluate(window)).collect()
}
