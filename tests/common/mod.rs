//! Shared test infrastructure for integration tests.
//!
//! Builds a throwaway git checkout holding a before/after pair of the patched
//! module plus shell test programs, then runs `hfgate` against it.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// `DB.execute` before the hotfix: still carries the catch-all handler.
pub const STORE_BEFORE: &str = "\
import MySQLdb


class DB(object):
    def __init__(self, cfg):
        self.config = cfg
        self.conn = None

    def execute(self, *a, **kw):
        cursor = kw.pop('cursor', None)
        try:
            cursor = cursor or self.get_conn().cursor()
            cursor.execute(*a, **kw)
        except (AttributeError, MySQLdb.OperationalError) as e:
            self.conn and self.conn.close()
            self.conn = None
            cursor = self.get_conn().cursor()
            cursor.execute(*a, **kw)
        except Exception as e:
            raise
        return cursor

    def query_all(self, *a, **kw):
        cursor = None
        try:
            cursor = self.execute(*a, **kw)
            return cursor.fetchall()
        finally:
            cursor and cursor.close()
";

pub fn store_after() -> String {
    STORE_BEFORE.replace("        except Exception as e:\n            raise\n", "")
}

pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// A git checkout with two commits: the unpatched module and the hotfix.
pub struct HotfixRepo {
    pub dir: TempDir,
}

impl HotfixRepo {
    /// Returns `None` when `git` or `sh` is unavailable.
    pub fn create() -> Option<Self> {
        find_in_path("git")?;
        find_in_path("sh")?;
        let dir = tempfile::tempdir().expect("create temp dir");
        let repo = Self { dir };
        repo.git(&["init", "-q"]);
        repo.write("rrd/store.py", STORE_BEFORE);
        repo.write("tests/reproduce.sh", "echo reproduce ok\nexit 0\n");
        repo.write("tests/invariants.sh", "echo invariants ok\nexit 0\n");
        repo.commit("import store");
        repo.write("rrd/store.py", &store_after());
        repo.commit("drop catch-all handler in DB.execute");
        Some(repo)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, rel: &str, contents: &str) {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent directory");
        }
        std::fs::write(path, contents).expect("write file");
    }

    /// Write a config that runs the shell test programs in this checkout.
    pub fn write_config(&self, extra: serde_json::Value) -> PathBuf {
        let mut config = serde_json::json!({
            "reproduction": { "command": "sh tests/reproduce.sh" },
            "invariants": { "command": "sh tests/invariants.sh" },
        });
        if let (Some(base), Some(extra)) = (config.as_object_mut(), extra.as_object()) {
            for (key, value) in extra {
                base.insert(key.clone(), value.clone());
            }
        }
        let path = self.path().join("hfgate.json");
        std::fs::write(
            &path,
            serde_json::to_vec_pretty(&config).expect("serialize config"),
        )
        .expect("write config");
        path
    }

    pub fn run_gate(&self, config: &Path, extra_args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_hfgate"))
            .arg("--root")
            .arg(self.path())
            .arg("--config")
            .arg(config)
            .args(extra_args)
            .env_remove("RUST_LOG")
            .output()
            .expect("run hfgate")
    }

    fn commit(&self, message: &str) {
        self.git(&["add", "-A"]);
        self.git(&[
            "-c",
            "user.name=Release Engineer",
            "-c",
            "user.email=release@example.com",
            "-c",
            "commit.gpgsign=false",
            "commit",
            "-q",
            "-m",
            message,
        ]);
    }

    fn git(&self, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .status()
            .expect("run git");
        assert!(status.success(), "git {args:?} failed");
    }
}
