//! CLI argument parsing.
//!
//! Every flag is optional: a bare `hfgate` runs the full gate with the built-in
//! audit config against the current directory.
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "hfgate",
    version,
    about = "Staged evidence gate for hotfix sign-off",
    after_help = "Stages (each gates the next):\n  1. diff evidence        removal marker present in the VCS diff\n  2. reproduction test    external program exits 0\n  3. invariant tests      external program exits 0\n  4. structural check     patched function body matches required patterns\n  5. evidence package     list audit artifacts\n\nExit status: 0 on success, the failing test's status, 1 for a failed check,\n2 when a stage could not run, 124 when a test timed out."
)]
pub struct RootArgs {
    /// Audit config JSON (defaults are used for omitted fields)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory relative paths resolve against; collaborators run here
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,

    /// Print a machine-readable JSON report instead of the stage sections
    #[arg(long)]
    pub json: bool,

    /// Emit debug logs to stderr
    #[arg(long)]
    pub verbose: bool,

    /// Print the effective config and exit
    #[arg(long, conflicts_with = "json")]
    pub print_config: bool,
}
