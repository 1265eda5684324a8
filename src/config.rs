//! Runtime configuration, loaded from `argon.toml`.
//!
//! Grounded on the teacher's `NeurlangConfig`: the `serde` + `toml`
//! round-trip, the upward-searching `find_and_load`, and the
//! `#[derive(thiserror::Error)]` error enum are kept wholesale; the field
//! set is replaced with the scheduler/fiber knobs this runtime actually
//! reads (`max_vc`, `max_ost`, `fiber_ss`, `fiber_pool`) plus a `[modules]`
//! search-path section, per SPEC_FULL.md §3.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config file not found: {0}")]
    NotFound(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Root configuration structure matching `argon.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub modules: ModulesConfig,
}

impl Config {
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn load_from_cwd() -> ConfigResult<Self> {
        let cwd = std::env::current_dir().map_err(ConfigError::Io)?;
        Self::find_and_load(&cwd)
    }

    /// Searches upward from `start_dir` for `argon.toml`, falling back to
    /// defaults if it reaches the filesystem root without finding one.
    pub fn find_and_load(start_dir: &Path) -> ConfigResult<Self> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let config_path = dir.join("argon.toml");
            if config_path.exists() {
                return Self::load(&config_path);
            }
            if !dir.pop() {
                return Ok(Self::default());
            }
        }
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Scheduler/fiber knobs, per spec.md §4.7's "Configuration" section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Maximum number of virtual cores.
    #[serde(default = "default_max_vc")]
    pub max_vc: usize,

    /// Maximum number of OS threads the scheduler may spawn.
    #[serde(default = "default_max_ost")]
    pub max_ost: usize,

    /// Per-fiber frame region budget (frame-equivalents).
    #[serde(default = "default_fiber_ss")]
    pub fiber_ss: usize,

    /// Size of the idle-fiber free-list the scheduler recycles from.
    #[serde(default = "default_fiber_pool")]
    pub fiber_pool: usize,

    /// Local run-queue capacity per virtual core (0 = unbounded).
    #[serde(default)]
    pub queue_max_len: usize,
}

fn default_max_vc() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

fn default_max_ost() -> usize {
    default_max_vc() * 2
}

fn default_fiber_ss() -> usize {
    64
}

fn default_fiber_pool() -> usize {
    128
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            max_vc: default_max_vc(),
            max_ost: default_max_ost(),
            fiber_ss: default_fiber_ss(),
            fiber_pool: default_fiber_pool(),
            queue_max_len: 0,
        }
    }
}

/// Module search configuration. Import-path resolution proper is out of
/// scope (spec.md §1's Non-goals); this section only carries the surface a
/// future importer would read, per SPEC_FULL.md §3.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModulesConfig {
    #[serde(default)]
    pub search_paths: Vec<String>,
}
