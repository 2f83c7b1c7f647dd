//! Checker configuration
//!
//! Settings come, in increasing priority, from the defaults, a TOML file, the
//! `--cfg=model-check/<key>:<value>` flags and the environment.

use crate::error::ConfigError;
use crate::observability::{LogConfig, LogFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Environment variable asking for a memory report at the end of the run
pub const SYSTEM_STATISTICS_ENV: &str = "SIMGRID_MC_SYSTEM_STATISTICS";

/// Partial-order reduction applied during the exploration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReductionMode {
    /// Explore every interleaving
    None,
    /// Classic DPOR with sleep sets
    Dpor,
    /// Source-set DPOR
    Sdpor,
    /// Optimal DPOR with wakeup trees, depth-first
    Odpor,
    /// Optimal DPOR, children materialized and explored breadth-first
    BfsOdpor,
    /// Optimal DPOR, children materialized and explored best-first
    BefsOdpor,
}

impl Default for ReductionMode {
    fn default() -> Self {
        ReductionMode::Dpor
    }
}

impl ReductionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReductionMode::None => "none",
            ReductionMode::Dpor => "dpor",
            ReductionMode::Sdpor => "sdpor",
            ReductionMode::Odpor => "odpor",
            ReductionMode::BfsOdpor => "bfs-odpor",
            ReductionMode::BefsOdpor => "befs-odpor",
        }
    }
}

impl FromStr for ReductionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(ReductionMode::None),
            "dpor" => Ok(ReductionMode::Dpor),
            "sdpor" => Ok(ReductionMode::Sdpor),
            "odpor" => Ok(ReductionMode::Odpor),
            "bfs-odpor" => Ok(ReductionMode::BfsOdpor),
            "befs-odpor" => Ok(ReductionMode::BefsOdpor),
            _ => Err(invalid("reduction", s)),
        }
    }
}

/// Order in which the exploration tree is walked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ExplorerKind {
    /// Depth-first, one stack
    #[default]
    Dfs,
    /// Best-first over the set of opened states
    Befs,
}

impl FromStr for ExplorerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dfs" => Ok(ExplorerKind::Dfs),
            "befs" => Ok(ExplorerKind::Befs),
            _ => Err(invalid("explorer", s)),
        }
    }
}

/// Guiding strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    None,
    MaxMatchComm,
    MinMatchComm,
    MinWait,
    Uniform,
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(StrategyKind::None),
            "max_match_comm" => Ok(StrategyKind::MaxMatchComm),
            "min_match_comm" => Ok(StrategyKind::MinMatchComm),
            "min_wait" => Ok(StrategyKind::MinWait),
            "uniform" => Ok(StrategyKind::Uniform),
            _ => Err(invalid("strategy", s)),
        }
    }
}

/// Configuration of one model-checking run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    pub reduction: ReductionMode,
    pub explorer: ExplorerKind,
    pub strategy: StrategyKind,
    /// Deeper states are not explored (a warning is logged)
    pub max_depth: usize,
    /// Bugs tolerated before stopping; negative means never stop
    pub max_errors: i64,
    /// On a bug, look for the transition after which no correct execution remains
    pub search_critical_transition: bool,
    /// Checkpoint the app every that many states (0 disables caching)
    pub cached_states_interval: usize,
    /// Wall-clock budget checked at deadlock-check points (0 disables it)
    pub soft_timeout_secs: u64,
    /// Where to write the dot graph of the explored states
    pub dot_output: Option<PathBuf>,
    /// Seed of the uniform strategy and of the random picks
    pub random_seed: u64,
    /// Percentage above which the best-first explorer switches to a better opened state
    pub befs_threshold: u32,
    /// Fail if two explored maximal executions are equivalent (costly)
    pub debug_optimality: bool,
    /// Let the app run whole paths on its own
    pub one_way: bool,
    /// Restore states by replaying from a fresh app instead of forking checkpoints
    pub no_fork: bool,
    /// Trace the app with ptrace to get accurate exit statuses
    pub use_ptrace: bool,
    /// Extra environment variables for the checked program
    pub setenv: BTreeMap<String, String>,
    /// Dump the actors when a deadlock is found
    pub verbose: bool,
    /// Replay exactly this record trace instead of exploring
    pub replay: Option<String>,
    /// Print a memory report at the end
    pub system_statistics: bool,
    pub log: LogConfig,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        CheckerConfig {
            reduction: ReductionMode::Dpor,
            explorer: ExplorerKind::Dfs,
            strategy: StrategyKind::None,
            max_depth: 1000,
            max_errors: 0,
            search_critical_transition: false,
            cached_states_interval: 0,
            soft_timeout_secs: 0,
            dot_output: None,
            random_seed: 0,
            befs_threshold: 0,
            debug_optimality: false,
            one_way: false,
            no_fork: false,
            use_ptrace: false,
            setenv: BTreeMap::new(),
            verbose: false,
            replay: None,
            system_statistics: false,
            log: LogConfig::default(),
        }
    }
}

impl CheckerConfig {
    /// Configuration for testing (in-process replays, optimality checked)
    pub fn test() -> Self {
        CheckerConfig {
            max_depth: 200,
            no_fork: true,
            debug_optimality: true,
            verbose: true,
            ..Default::default()
        }
    }

    pub fn with_reduction(mut self, reduction: ReductionMode) -> Self {
        self.reduction = reduction;
        if matches!(
            reduction,
            ReductionMode::BfsOdpor | ReductionMode::BefsOdpor
        ) {
            self.explorer = ExplorerKind::Befs;
        }
        self
    }

    pub fn soft_timeout(&self) -> Option<Duration> {
        (self.soft_timeout_secs > 0).then(|| Duration::from_secs(self.soft_timeout_secs))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::File(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::File(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Applies one `model-check/<key>:<value>` setting. A leading `--cfg=` is accepted.
    pub fn apply_flag(&mut self, flag: &str) -> Result<(), ConfigError> {
        let setting = flag.strip_prefix("--cfg=").unwrap_or(flag);
        let setting = setting.trim_matches(|c| c == '\'' || c == '"');
        let (key, value) = setting
            .split_once(':')
            .ok_or_else(|| ConfigError::Malformed(flag.to_string()))?;
        let value = value.trim_matches('\'');

        match key {
            "model-check/reduction" => self.reduction = value.parse()?,
            "model-check/explorer" => self.explorer = value.parse()?,
            "model-check/strategy" => self.strategy = value.parse()?,
            "model-check/max-depth" => self.max_depth = parse_value(key, value)?,
            "model-check/max-errors" => self.max_errors = parse_value(key, value)?,
            "model-check/search-critical-transition" => {
                self.search_critical_transition = parse_bool(key, value)?
            }
            "model-check/cached-states-interval" => {
                self.cached_states_interval = parse_value(key, value)?
            }
            "model-check/soft-timeout" => self.soft_timeout_secs = parse_value(key, value)?,
            "model-check/dot-output" => {
                self.dot_output = (!value.is_empty()).then(|| PathBuf::from(value))
            }
            "model-check/rand-seed" => self.random_seed = parse_value(key, value)?,
            "model-check/befs-threshold" => self.befs_threshold = parse_value(key, value)?,
            "model-check/debug-optimality" => self.debug_optimality = parse_bool(key, value)?,
            "model-check/one-way" => self.one_way = parse_bool(key, value)?,
            "model-check/no-fork" => self.no_fork = parse_bool(key, value)?,
            "model-check/ptrace" => self.use_ptrace = parse_bool(key, value)?,
            "model-check/verbose" => self.verbose = parse_bool(key, value)?,
            "model-check/replay" => {
                self.replay = (!value.is_empty()).then(|| value.to_string())
            }
            "model-check/setenv" => {
                for pair in value.split(';').filter(|p| !p.is_empty()) {
                    let (var, val) = pair.split_once('=').ok_or_else(|| invalid(key, pair))?;
                    self.setenv.insert(var.to_string(), val.to_string());
                }
            }
            "log" => self.log.filter = Some(value.to_string()),
            "log-format" => {
                self.log.format = match value {
                    "text" => LogFormat::Text,
                    "json" => LogFormat::Json,
                    _ => return Err(invalid(key, value)),
                }
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// Applies the settings taken from the environment.
    pub fn apply_env(&mut self) {
        if std::env::var_os(SYSTEM_STATISTICS_ENV).is_some() {
            self.system_statistics = true;
        }
    }

    /// Rejects settings that cannot work together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (self.reduction, self.explorer) {
            (ReductionMode::Odpor, ExplorerKind::Befs) => {
                return Err(ConfigError::Incompatible(
                    "odpor explores depth-first; use bfs-odpor or befs-odpor with the befs explorer"
                        .to_string(),
                ))
            }
            (ReductionMode::BfsOdpor | ReductionMode::BefsOdpor, ExplorerKind::Dfs) => {
                return Err(ConfigError::Incompatible(format!(
                    "{} needs the befs explorer",
                    self.reduction.as_str()
                )))
            }
            _ => {}
        }
        if self.one_way && self.reduction != ReductionMode::None {
            return Err(ConfigError::Incompatible(
                "one-way exploration only works without reduction".to_string(),
            ));
        }
        if self.max_depth == 0 {
            return Err(invalid("model-check/max-depth", "0"));
        }
        if self.befs_threshold > 100 {
            return Err(invalid(
                "model-check/befs-threshold",
                &self.befs_threshold.to_string(),
            ));
        }
        Ok(())
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| invalid(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "" | "yes" | "on" | "true" | "1" => Ok(true),
        "no" | "off" | "false" | "0" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}
