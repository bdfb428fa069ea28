//! Structural verification of the patched function.
//!
//! This is a pattern-presence check over raw text, not a parser: the function
//! is found by the first line containing the locator, its body is approximated
//! by a fixed window of following lines, and three literal markers are tested
//! against that window. A locator miss ends verification before any check runs;
//! otherwise all three checks are evaluated and reported in order.
mod checks;
mod window;

pub use checks::{CheckKind, CheckResult, Expectation};
pub use window::WindowSpan;

use crate::config::StructuralConfig;
use anyhow::{Context, Result};
use checks::standard_checks;
use serde::Serialize;
use std::fs;
use std::path::Path;
use window::SourceLines;

/// Terminal state of one verification pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StructuralVerdict {
    NotFound {
        locator: String,
    },
    Checked {
        function_line: usize,
        window: WindowSpan,
        results: Vec<CheckResult>,
    },
}

impl StructuralVerdict {
    pub fn passed(&self) -> bool {
        match self {
            StructuralVerdict::NotFound { .. } => false,
            StructuralVerdict::Checked { results, .. } => {
                results.iter().all(|result| result.passed)
            }
        }
    }

    /// Reasons of failed checks, in check order.
    pub fn failures(&self) -> Vec<String> {
        match self {
            StructuralVerdict::NotFound { locator } => {
                vec![format!("function not found: {locator}")]
            }
            StructuralVerdict::Checked { results, .. } => results
                .iter()
                .filter(|result| !result.passed)
                .map(|result| result.reason.clone())
                .collect(),
        }
    }
}

/// Verify source text already split into lines.
pub fn verify_lines(source: &SourceLines, config: &StructuralConfig) -> StructuralVerdict {
    let Some(function_line) = source.locate(&config.function_locator) else {
        tracing::debug!(locator = %config.function_locator, "function locator missed");
        return StructuralVerdict::NotFound {
            locator: config.function_locator.clone(),
        };
    };

    let window = source.window_after(function_line, config.window_size);
    let span = window.span();
    tracing::debug!(
        function_line,
        window_first = span.first_line,
        window_lines = span.line_count,
        "scan window materialized"
    );

    let checks = standard_checks(config);
    let results = checks::evaluate_all(&checks, &window);
    StructuralVerdict::Checked {
        function_line,
        window: span,
        results,
    }
}

pub fn verify_text(text: &str, config: &StructuralConfig) -> StructuralVerdict {
    verify_lines(&SourceLines::from_text(text), config)
}

/// Read `path` (read-only) and verify it.
pub fn verify_file(path: &Path, config: &StructuralConfig) -> Result<StructuralVerdict> {
    let bytes = fs::read(path).with_context(|| format!("read source {}", path.display()))?;
    let text = String::from_utf8_lossy(&bytes);
    tracing::info!(path = %path.display(), bytes = bytes.len(), "verifying source");
    Ok(verify_text(&text, config))
}
