//! Configuration for the composite CLI.
//!
//! Settings are read from `.composite/composite.toml` and layered
//! file → environment → CLI.
//!
//! # Configuration File Format
//!
//! ```toml
//! [divisors]
//! values = [80, 40, 20, 10, 5, 4, 1, 0]
//!
//! [snapshot]
//! enabled = false
//! dir = "snapshots"
//!
//! [registry]
//! actor = "local"
//!
//! [logging]
//! level = "info"
//! json = false
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::divisors::{CHECKS_DIVISORS, Divisor, DivisorTable, parse_divisors};

/// Environment variable overriding `[divisors] values`.
pub const DIVISORS_ENV: &str = "COMPOSITE_DIVISORS";
/// Environment variable overriding `[snapshot] dir`.
pub const SNAPSHOT_DIR_ENV: &str = "COMPOSITE_SNAPSHOT_DIR";

const CONFIG_DIR: &str = ".composite";
const CONFIG_FILE: &str = "composite.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DivisorsSection {
    #[serde(default = "default_divisors")]
    pub values: Vec<Divisor>,
}

fn default_divisors() -> Vec<Divisor> {
    CHECKS_DIVISORS.to_vec()
}

impl Default for DivisorsSection {
    fn default() -> Self {
        Self {
            values: default_divisors(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSection {
    /// Record snapshots on every reduction
    #[serde(default)]
    pub enabled: bool,
    /// Output directory, relative to the project directory
    #[serde(default = "default_snapshot_dir")]
    pub dir: String,
}

fn default_snapshot_dir() -> String {
    "snapshots".to_string()
}

impl Default for SnapshotSection {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: default_snapshot_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySection {
    /// Identity merge batches are submitted as
    #[serde(default = "default_actor")]
    pub actor: String,
}

fn default_actor() -> String {
    "local".to_string()
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            actor: default_actor(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
    /// Also write logs to this directory, relative to the project directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            dir: None,
        }
    }
}

/// Contents of `composite.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompositeToml {
    #[serde(default)]
    pub divisors: DivisorsSection,
    #[serde(default)]
    pub snapshot: SnapshotSection,
    #[serde(default)]
    pub registry: RegistrySection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl CompositeToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse composite.toml")
    }

    /// Load `composite.toml` from `config_dir`, or defaults if it is missing.
    pub fn load_or_default(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize composite.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Divisor table, with `COMPOSITE_DIVISORS` taking precedence.
    pub fn divisor_table(&self) -> Result<DivisorTable> {
        if let Ok(env_val) = std::env::var(DIVISORS_ENV) {
            return parse_divisors(&env_val)
                .with_context(|| format!("Invalid {} value '{}'", DIVISORS_ENV, env_val));
        }
        DivisorTable::new(self.divisors.values.clone()).context("Invalid [divisors] values")
    }

    /// Snapshot directory, with `COMPOSITE_SNAPSHOT_DIR` taking precedence.
    pub fn snapshot_dir(&self) -> String {
        std::env::var(SNAPSHOT_DIR_ENV).unwrap_or_else(|_| self.snapshot.dir.clone())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.divisors.values.is_empty() {
            warnings.push("[divisors] values is empty; every reduction will fail".to_string());
        } else {
            match self.divisors.values.iter().position(|d| *d == 0) {
                None => warnings.push(
                    "[divisors] values has no 0 sentinel; long inputs may run past the table"
                        .to_string(),
                ),
                Some(pos) if pos + 1 < self.divisors.values.len() => warnings.push(format!(
                    "[divisors] entries after the 0 sentinel at index {} are unreachable from round 0",
                    pos
                )),
                Some(_) => {}
            }
        }

        if self.registry.actor.trim().is_empty() {
            warnings.push("[registry] actor is empty".to_string());
        }

        if self.logging.level.trim().is_empty() {
            warnings.push("[logging] level is empty".to_string());
        }

        warnings
    }
}

/// Directory holding `composite.toml` for a project.
pub fn config_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(CONFIG_DIR)
}

/// Path of `composite.toml` for a project.
pub fn config_path(project_dir: &Path) -> PathBuf {
    config_dir(project_dir).join(CONFIG_FILE)
}

/// Effective configuration for one CLI invocation.
///
/// Merges settings from:
/// 1. composite.toml file
/// 2. Environment variables
/// 3. CLI arguments
#[derive(Debug, Clone)]
pub struct CompositeConfig {
    pub project_dir: PathBuf,
    pub toml: CompositeToml,
    pub verbose: bool,
    /// CLI override for the divisor table
    pub cli_divisors: Option<DivisorTable>,
    /// CLI override for the snapshot directory
    pub cli_snapshot_dir: Option<PathBuf>,
    /// CLI override for the acting identity
    pub cli_actor: Option<String>,
}

impl CompositeConfig {
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let toml = CompositeToml::load_or_default(&config_dir(&project_dir))?;

        Ok(Self {
            project_dir,
            toml,
            verbose: false,
            cli_divisors: None,
            cli_snapshot_dir: None,
            cli_actor: None,
        })
    }

    /// Create CompositeConfig with CLI overrides.
    pub fn with_cli_args(
        project_dir: PathBuf,
        verbose: bool,
        divisors: Option<DivisorTable>,
        snapshot_dir: Option<PathBuf>,
        actor: Option<String>,
    ) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.verbose = verbose;
        config.cli_divisors = divisors;
        config.cli_snapshot_dir = snapshot_dir;
        config.cli_actor = actor;
        Ok(config)
    }

    /// Divisor table (CLI → env → file → default).
    pub fn divisors(&self) -> Result<DivisorTable> {
        match &self.cli_divisors {
            Some(table) => Ok(table.clone()),
            None => self.toml.divisor_table(),
        }
    }

    /// Snapshot directory (CLI → env → file → default), resolved against the project.
    pub fn snapshot_dir(&self) -> PathBuf {
        match &self.cli_snapshot_dir {
            Some(dir) => self.project_dir.join(dir),
            None => self.project_dir.join(self.toml.snapshot_dir()),
        }
    }

    /// Whether snapshots are on by default.
    pub fn snapshot_enabled(&self) -> bool {
        self.toml.snapshot.enabled
    }

    /// Acting identity (CLI → file → default).
    pub fn actor(&self) -> String {
        self.cli_actor
            .clone()
            .unwrap_or_else(|| self.toml.registry.actor.clone())
    }

    /// Log directory, if file logging is configured.
    pub fn log_dir(&self) -> Option<PathBuf> {
        self.toml
            .logging
            .dir
            .as_ref()
            .map(|dir| self.project_dir.join(dir))
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}
