//! Diff evidence: proof that the expected lines were removed.
//!
//! The diff itself comes from version control; this module only decides whether
//! the configured removal marker appears in it.
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Source of a file's textual diff against an earlier revision.
pub trait DiffSource {
    fn diff(&self, file: &Path) -> Result<String>;
}

/// `git diff <base> -- <file>` run inside the audited checkout.
#[derive(Debug, Clone)]
pub struct GitDiff {
    pub root: PathBuf,
    pub base_revision: String,
}

impl GitDiff {
    pub fn new(root: &Path, base_revision: &str) -> Self {
        Self {
            root: root.to_path_buf(),
            base_revision: base_revision.to_string(),
        }
    }

    fn git(&self, args: &[&str], file: &Path) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .arg("--")
            .arg(file)
            .current_dir(&self.root)
            .output()
            .context("spawn git")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "git {} failed (exit {}): {}",
                args.join(" "),
                output
                    .status
                    .code()
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
                stderr.trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl DiffSource for GitDiff {
    fn diff(&self, file: &Path) -> Result<String> {
        if self.base_revision.starts_with('-') {
            return Err(anyhow!(
                "base revision {:?} would be read as a git option",
                self.base_revision
            ));
        }
        // git diff is silent for untracked files; require tracking explicitly.
        self.git(&["ls-files", "--error-unmatch"], file)
            .with_context(|| format!("{} is not under version control", file.display()))?;
        self.git(
            &["diff", "--no-color", "--no-ext-diff", self.base_revision.as_str()],
            file,
        )
        .with_context(|| format!("diff {} against {}", file.display(), self.base_revision))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffFinding {
    pub file: String,
    pub marker: String,
    pub found: bool,
    /// First diff line containing the marker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_line: Option<String>,
    pub diff_lines: usize,
}

/// Fetch the diff for `file` and look for `marker` in it.
pub fn check_removal(source: &dyn DiffSource, file: &Path, marker: &str) -> Result<DiffFinding> {
    let diff = source.diff(file)?;
    let found = diff.contains(marker);
    let evidence_line = diff
        .lines()
        .find(|line| line.contains(marker))
        .map(str::to_string);
    tracing::debug!(
        file = %file.display(),
        diff_bytes = diff.len(),
        found,
        "diff evidence scanned"
    );
    Ok(DiffFinding {
        file: file.display().to_string(),
        marker: marker.to_string(),
        found,
        evidence_line,
        diff_lines: diff.lines().count(),
    })
}
