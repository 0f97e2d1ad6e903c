//! Configuration file management for stepgraph.
//!
//! Provides a TOML-based config file at `~/.config/stepgraph/config.toml` and
//! a resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use stepgraph_core::plan::{DEFAULT_MAX_STEPS, PlanPolicy};
use stepgraph_core::source::SourceConfig;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub model: ModelSection,
    #[serde(default)]
    pub planning: PlanningSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSection {
    pub url: String,
    pub name: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningSection {
    #[serde(default)]
    pub require_reasoning: bool,
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

impl Default for PlanningSection {
    fn default() -> Self {
        Self {
            require_reasoning: false,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

fn default_timeout_secs() -> u64 {
    SourceConfig::DEFAULT_TIMEOUT_SECS
}

fn default_max_steps() -> usize {
    DEFAULT_MAX_STEPS
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the stepgraph config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/stepgraph` or
/// `~/.config/stepgraph`, on every platform.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("stepgraph");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("stepgraph")
}

/// Return the path to the stepgraph config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load the config file at `path`. A missing file is `Ok(None)`; a file that
/// exists but does not parse is an error.
pub fn load_config_from(path: &Path) -> Result<Option<ConfigFile>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("failed to read config file at {}", path.display()));
        }
    };
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(Some(config))
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config_to(config: &ConfigFile, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line. `None`/`false` means "not given".
#[derive(Debug, Default, Clone)]
pub struct CliOverrides<'a> {
    pub model_url: Option<&'a str>,
    pub model: Option<&'a str>,
    pub require_reasoning: bool,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug, Clone)]
pub struct StepgraphConfig {
    pub source: SourceConfig,
    pub policy: PlanPolicy,
}

impl StepgraphConfig {
    /// Resolve configuration from the CLI, the environment and the config file.
    pub fn resolve(cli: &CliOverrides<'_>) -> Result<Self> {
        let file = load_config_from(&config_path())?;
        Self::resolve_with(cli, file.as_ref())
    }

    /// Resolve using the chain: CLI flag > env var > config file > default.
    ///
    /// - URL: `--model-url` > `STEPGRAPH_MODEL_URL` > `model.url` > `SourceConfig::DEFAULT_URL`
    /// - Model: `--model` > `STEPGRAPH_MODEL` > `model.name` > `SourceConfig::DEFAULT_MODEL`
    /// - Timeout: `STEPGRAPH_TIMEOUT_SECS` > `model.timeout_secs` > default
    /// - Reasoning: `--require-reasoning` or `planning.require_reasoning`
    pub fn resolve_with(cli: &CliOverrides<'_>, file: Option<&ConfigFile>) -> Result<Self> {
        let url = if let Some(url) = cli.model_url {
            url.to_string()
        } else if let Ok(url) = std::env::var("STEPGRAPH_MODEL_URL") {
            url
        } else if let Some(cfg) = file {
            cfg.model.url.clone()
        } else {
            SourceConfig::DEFAULT_URL.to_string()
        };

        let model = if let Some(model) = cli.model {
            model.to_string()
        } else if let Ok(model) = std::env::var("STEPGRAPH_MODEL") {
            model
        } else if let Some(cfg) = file {
            cfg.model.name.clone()
        } else {
            SourceConfig::DEFAULT_MODEL.to_string()
        };

        let timeout_secs = if let Ok(raw) = std::env::var("STEPGRAPH_TIMEOUT_SECS") {
            raw.trim()
                .parse::<u64>()
                .with_context(|| format!("STEPGRAPH_TIMEOUT_SECS is not a number: {raw:?}"))?
        } else if let Some(cfg) = file {
            cfg.model.timeout_secs
        } else {
            SourceConfig::DEFAULT_TIMEOUT_SECS
        };
        if timeout_secs == 0 {
            bail!("model timeout must be at least one second");
        }

        let planning = file.map(|cfg| cfg.planning.clone()).unwrap_or_default();
        if planning.max_steps == 0 {
            bail!("planning.max_steps must be at least 1");
        }

        Ok(Self {
            source: SourceConfig::new(url, model).with_timeout(Duration::from_secs(timeout_secs)),
            policy: PlanPolicy {
                require_reasoning: cli.require_reasoning || planning.require_reasoning,
                max_steps: planning.max_steps,
            },
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    fn clear_env() {
        unsafe { std::env::remove_var("STEPGRAPH_MODEL_URL") };
        unsafe { std::env::remove_var("STEPGRAPH_MODEL") };
        unsafe { std::env::remove_var("STEPGRAPH_TIMEOUT_SECS") };
    }

    fn sample_file() -> ConfigFile {
        ConfigFile {
            model: ModelSection {
                url: "http://file-host:11434".to_string(),
                name: "file-model".to_string(),
                timeout_secs: 45,
            },
            planning: PlanningSection {
                require_reasoning: true,
                max_steps: 30,
            },
        }
    }

    #[test]
    fn save_and_load_config_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("stepgraph").join("config.toml");

        save_config_to(&sample_file(), &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded, Some(sample_file()));
    }

    #[cfg(unix)]
    #[test]
    fn save_config_sets_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        save_config_to(&sample_file(), &path).unwrap();

        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn missing_file_is_none() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert_eq!(load_config_from(&tmp.path().join("absent.toml")).unwrap(), None);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[model\nurl = ").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse config file"));
    }

    #[test]
    fn planning_section_is_optional() {
        let cfg: ConfigFile = toml::from_str(
            r#"
            [model]
            url = "http://localhost:11434"
            name = "llama3.1"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.model.timeout_secs, SourceConfig::DEFAULT_TIMEOUT_SECS);
        assert_eq!(cfg.planning, PlanningSection::default());
    }

    #[test]
    fn resolve_with_cli_flag_overrides_all() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var("STEPGRAPH_MODEL_URL", "http://env-host:11434") };
        unsafe { std::env::set_var("STEPGRAPH_MODEL", "env-model") };

        let cli = CliOverrides {
            model_url: Some("http://cli-host:11434"),
            model: Some("cli-model"),
            require_reasoning: false,
        };
        let config = StepgraphConfig::resolve_with(&cli, Some(&sample_file())).unwrap();
        assert_eq!(config.source.base_url, "http://cli-host:11434");
        assert_eq!(config.source.model, "cli-model");

        clear_env();
    }

    #[test]
    fn resolve_with_env_var_overrides_config_file() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var("STEPGRAPH_MODEL_URL", "http://env-host:11434") };
        unsafe { std::env::set_var("STEPGRAPH_TIMEOUT_SECS", "7") };

        let config =
            StepgraphConfig::resolve_with(&CliOverrides::default(), Some(&sample_file())).unwrap();
        assert_eq!(config.source.base_url, "http://env-host:11434");
        assert_eq!(config.source.model, "file-model");
        assert_eq!(config.source.timeout, Duration::from_secs(7));

        clear_env();
    }

    #[test]
    fn resolve_uses_config_file_over_defaults() {
        let _lock = lock_env();
        clear_env();

        let config =
            StepgraphConfig::resolve_with(&CliOverrides::default(), Some(&sample_file())).unwrap();
        assert_eq!(config.source.base_url, "http://file-host:11434");
        assert_eq!(config.source.timeout, Duration::from_secs(45));
        assert!(config.policy.require_reasoning);
        assert_eq!(config.policy.max_steps, 30);
    }

    #[test]
    fn resolve_defaults_when_nothing_set() {
        let _lock = lock_env();
        clear_env();

        let config = StepgraphConfig::resolve_with(&CliOverrides::default(), None).unwrap();
        assert_eq!(config.source.base_url, SourceConfig::DEFAULT_URL);
        assert_eq!(config.source.model, SourceConfig::DEFAULT_MODEL);
        assert_eq!(config.policy, PlanPolicy::default());
    }

    #[test]
    fn require_reasoning_flag_turns_policy_on() {
        let _lock = lock_env();
        clear_env();

        let cli = CliOverrides {
            require_reasoning: true,
            ..CliOverrides::default()
        };
        let config = StepgraphConfig::resolve_with(&cli, None).unwrap();
        assert!(config.policy.require_reasoning);
    }

    #[test]
    fn resolve_rejects_bad_timeout_env() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var("STEPGRAPH_TIMEOUT_SECS", "soon") };

        let result = StepgraphConfig::resolve_with(&CliOverrides::default(), None);
        clear_env();

        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("STEPGRAPH_TIMEOUT_SECS"), "unexpected error: {msg}");
    }

    #[test]
    fn resolve_rejects_zero_max_steps() {
        let _lock = lock_env();
        clear_env();
        let mut file = sample_file();
        file.planning.max_steps = 0;
        assert!(StepgraphConfig::resolve_with(&CliOverrides::default(), Some(&file)).is_err());
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("stepgraph/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
