//! Audit configuration.
//!
//! Every input the gate consults (files, markers, collaborator commands, the
//! evidence list) comes from one JSON document. Running without a config uses
//! the defaults for the `DB.execute` hotfix.
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Default scan window length, in lines, following the located declaration.
pub const DEFAULT_WINDOW_SIZE: usize = 50;

const DEFAULT_PATCHED_FILE: &str = "rrd/store.py";

/// Root audit config; all sections fall back to their defaults when omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    pub schema_version: u32,
    pub diff: DiffConfig,
    #[serde(
        default = "default_reproduction",
        deserialize_with = "reproduction_section"
    )]
    pub reproduction: TestConfig,
    #[serde(default = "default_invariants", deserialize_with = "invariants_section")]
    pub invariants: TestConfig,
    pub structural: StructuralConfig,
    pub evidence: EvidenceConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiffConfig {
    pub file: String,
    pub base_revision: String,
    pub marker: String,
}

/// An external test program. `command` is split shell-style into argv.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestConfig {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

/// A test section as written; omitted fields come from that section's defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TestSection {
    command: Option<String>,
    timeout_seconds: Option<u64>,
}

impl TestSection {
    fn over(self, defaults: TestConfig) -> TestConfig {
        TestConfig {
            command: self.command.unwrap_or(defaults.command),
            timeout_seconds: self.timeout_seconds.or(defaults.timeout_seconds),
        }
    }
}

fn reproduction_section<'de, D>(deserializer: D) -> std::result::Result<TestConfig, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(TestSection::deserialize(deserializer)?.over(default_reproduction()))
}

fn invariants_section<'de, D>(deserializer: D) -> std::result::Result<TestConfig, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(TestSection::deserialize(deserializer)?.over(default_invariants()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StructuralConfig {
    pub source_file: String,
    pub function_locator: String,
    pub window_size: usize,
    pub forbidden_broad_handler: String,
    pub required_narrow_handler: String,
    pub required_return_statement: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvidenceConfig {
    pub files: Vec<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            diff: DiffConfig::default(),
            reproduction: default_reproduction(),
            invariants: default_invariants(),
            structural: StructuralConfig::default(),
            evidence: EvidenceConfig::default(),
        }
    }
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            file: DEFAULT_PATCHED_FILE.to_string(),
            base_revision: "HEAD~1".to_string(),
            marker: "-        except Exception as e:".to_string(),
        }
    }
}

impl Default for StructuralConfig {
    fn default() -> Self {
        Self {
            source_file: DEFAULT_PATCHED_FILE.to_string(),
            function_locator: "def execute(self".to_string(),
            window_size: DEFAULT_WINDOW_SIZE,
            forbidden_broad_handler: "except Exception".to_string(),
            required_narrow_handler: "except (AttributeError".to_string(),
            required_return_statement: "return cursor".to_string(),
        }
    }
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            files: [
                "hotfix_store.diff",
                "tests/test_hotfix_reproduce.py",
                "tests/test_hotfix_invariants.py",
                "hfgate",
                "HOTFIX_REPORT.md",
            ]
            .iter()
            .map(|name| name.to_string())
            .collect(),
        }
    }
}

fn default_reproduction() -> TestConfig {
    TestConfig {
        command: "python tests/test_hotfix_reproduce.py".to_string(),
        timeout_seconds: None,
    }
}

fn default_invariants() -> TestConfig {
    TestConfig {
        command: "python tests/test_hotfix_invariants.py".to_string(),
        timeout_seconds: None,
    }
}

impl TestConfig {
    /// Split the configured command into argv without invoking a shell.
    pub fn argv(&self) -> Result<Vec<String>> {
        let argv = shell_words::split(&self.command)
            .with_context(|| format!("parse command {:?}", self.command))?;
        if argv.is_empty() {
            return Err(anyhow!("command must be non-empty"));
        }
        Ok(argv)
    }
}

/// Load a config file. Callers run [`validate_config`] before use.
pub fn load_config(path: &Path) -> Result<AuditConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: AuditConfig =
        serde_json::from_slice(&bytes).context("parse audit config JSON")?;
    Ok(config)
}

/// Render the config in the stable JSON form `--print-config` emits.
pub fn config_json(config: &AuditConfig) -> Result<String> {
    serde_json::to_string_pretty(config).context("serialize audit config")
}

/// Reject configs that would make a stage meaningless before anything runs.
pub fn validate_config(config: &AuditConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported audit config schema_version {}",
            config.schema_version
        ));
    }

    validate_path(&config.diff.file, "diff.file")?;
    require_non_empty(&config.diff.base_revision, "diff.base_revision")?;
    if config.diff.base_revision.starts_with('-') {
        return Err(anyhow!(
            "diff.base_revision must name a revision, not an option: {}",
            config.diff.base_revision
        ));
    }
    require_non_empty(&config.diff.marker, "diff.marker")?;

    for (label, test) in [
        ("reproduction", &config.reproduction),
        ("invariants", &config.invariants),
    ] {
        test.argv()
            .with_context(|| format!("invalid {label}.command"))?;
        if test.timeout_seconds == Some(0) {
            return Err(anyhow!("{label}.timeout_seconds must be positive"));
        }
    }

    let structural = &config.structural;
    validate_path(&structural.source_file, "structural.source_file")?;
    require_non_empty(&structural.function_locator, "structural.function_locator")?;
    if structural.window_size == 0 {
        return Err(anyhow!("structural.window_size must be positive"));
    }
    require_non_empty(
        &structural.forbidden_broad_handler,
        "structural.forbidden_broad_handler",
    )?;
    require_non_empty(
        &structural.required_narrow_handler,
        "structural.required_narrow_handler",
    )?;
    require_non_empty(
        &structural.required_return_statement,
        "structural.required_return_statement",
    )?;

    if config.evidence.files.is_empty() {
        return Err(anyhow!("evidence.files must list at least one artifact"));
    }
    for file in &config.evidence.files {
        validate_path(file, "evidence.files")?;
    }
    Ok(())
}

/// Resolve a config path against the audit root; absolute paths pass through.
pub fn resolve_path(root: &Path, value: &str) -> PathBuf {
    let path = Path::new(value);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn require_non_empty(value: &str, label: &str) -> Result<()> {
    if value.is_empty() {
        return Err(anyhow!("{label} must be non-empty"));
    }
    Ok(())
}

fn validate_path(value: &str, label: &str) -> Result<()> {
    require_non_empty(value.trim(), label)?;
    let path = Path::new(value);
    if path.is_absolute() {
        return Ok(());
    }
    if path
        .components()
        .any(|component| matches!(component, Component::ParentDir))
    {
        return Err(anyhow!("{label} must not contain '..': {value}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_the_execute_hotfix() {
        let config = AuditConfig::default();
        assert_eq!(config.structural.function_locator, "def execute(self");
        assert_eq!(config.structural.window_size, 50);
        assert_eq!(config.diff.file, "rrd/store.py");
        assert_eq!(config.evidence.files.len(), 5);
        validate_config(&config).expect("defaults validate");
    }

    #[test]
    fn partial_config_keeps_defaults_for_missing_sections() {
        let config: AuditConfig = serde_json::from_str(
            r#"{"structural": {"window_size": 10}, "invariants": {"command": "true", "timeout_seconds": 30}}"#,
        )
        .expect("parse partial config");
        assert_eq!(config.structural.window_size, 10);
        assert_eq!(config.structural.function_locator, "def execute(self");
        assert_eq!(config.invariants.timeout_seconds, Some(30));
        assert_eq!(config.reproduction, default_reproduction());
    }

    #[test]
    fn timeout_only_section_keeps_default_command() {
        let config: AuditConfig =
            serde_json::from_str(r#"{"reproduction": {"timeout_seconds": 30}}"#)
                .expect("parse timeout-only section");
        assert_eq!(
            config.reproduction,
            TestConfig {
                command: "python tests/test_hotfix_reproduce.py".to_string(),
                timeout_seconds: Some(30),
            }
        );
        assert_eq!(config.invariants, default_invariants());
        validate_config(&config).expect("timeout-only config validates");
    }

    #[test]
    fn unknown_test_section_fields_are_rejected() {
        let err = serde_json::from_str::<AuditConfig>(r#"{"invariants": {"cmd": "true"}}"#)
            .expect_err("unknown field");
        assert!(err.to_string().contains("cmd"));
    }

    #[test]
    fn option_like_base_revision_is_rejected() {
        let mut config = AuditConfig::default();
        config.diff.base_revision = "--output=/tmp/written_by_gate.txt".to_string();
        let err = validate_config(&config).expect_err("option-like revision");
        assert!(err.to_string().contains("diff.base_revision"));
    }

    #[test]
    fn load_config_parses_without_validating() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("hfgate.json");
        fs::write(&path, r#"{"structural": {"window_size": 0}}"#).expect("write config");
        let config = load_config(&path).expect("load config");
        assert_eq!(config.structural.window_size, 0);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = serde_json::from_str::<AuditConfig>(r#"{"structurl": {}}"#)
            .expect_err("unknown field");
        assert!(err.to_string().contains("structurl"));
    }

    #[test]
    fn zero_window_is_rejected() {
        let mut config = AuditConfig::default();
        config.structural.window_size = 0;
        let err = validate_config(&config).expect_err("zero window");
        assert!(err.to_string().contains("window_size"));
    }

    #[test]
    fn unbalanced_quotes_in_command_are_rejected() {
        let mut config = AuditConfig::default();
        config.reproduction.command = "python 'tests/unterminated.py".to_string();
        let err = validate_config(&config).expect_err("bad command");
        assert!(format!("{err:#}").contains("reproduction.command"));
    }

    #[test]
    fn parent_escaping_paths_are_rejected() {
        let mut config = AuditConfig::default();
        config.structural.source_file = "../outside/store.py".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn argv_splits_quoted_arguments() {
        let test = TestConfig {
            command: r#"python -m pytest "tests/with space.py""#.to_string(),
            timeout_seconds: None,
        };
        assert_eq!(
            test.argv().expect("split"),
            vec!["python", "-m", "pytest", "tests/with space.py"]
        );
    }

    #[test]
    fn resolve_path_keeps_absolute_paths() {
        let root = Path::new("/audit");
        assert_eq!(
            resolve_path(root, "rrd/store.py"),
            PathBuf::from("/audit/rrd/store.py")
        );
        assert_eq!(resolve_path(root, "/tmp/x"), PathBuf::from("/tmp/x"));
    }
}
