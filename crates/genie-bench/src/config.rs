use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;

const DEFAULT_MISTAKE_RATE: f64 = 0.05;
const DEFAULT_DONT_KNOW_RATE: f64 = 0.08;
const DEFAULT_HEDGE_RATE: f64 = 0.2;
const RUN_ID_ALLOWED: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._-";

/// Root benchmark configuration loaded from YAML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BenchConfig {
    pub run_id: String,
    pub snapshot: String,
    pub games: GamesConfig,
    #[serde(default)]
    pub answerer: AnswererConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BenchConfig {
    /// Load configuration from a YAML file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_buf = path.to_path_buf();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            source,
            path: path_buf.clone(),
        })?;
        let reader = BufReader::new(file);
        let mut cfg: BenchConfig =
            serde_yaml::from_reader(reader).map_err(|source| ConfigError::Parse {
                source,
                path: path_buf.clone(),
            })?;
        cfg.validate().map_err(|source| ConfigError::Invalid {
            path: path_buf,
            source,
        })?;
        Ok(cfg)
    }

    /// Validate the configuration without performing I/O.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        validate_run_id(&self.run_id)?;
        if self.snapshot.trim().is_empty() {
            return Err(ValidationError::InvalidField {
                field: "snapshot".to_string(),
                message: "snapshot path must not be empty".to_string(),
            });
        }
        self.games.validate()?;
        self.answerer.validate()?;
        self.engine.validate()?;
        self.outputs.validate(&self.run_id)?;
        self.logging.normalize();
        Ok(())
    }

    /// Resolve output templates (`{run_id}` placeholders) into paths.
    pub fn resolved_outputs(&self) -> ResolvedOutputs {
        ResolvedOutputs {
            jsonl: resolve_template(&self.run_id, &self.outputs.jsonl),
            summary_md: resolve_template(&self.run_id, &self.outputs.summary_md),
        }
    }
}

/// How many games to simulate and from which seed.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GamesConfig {
    pub seed: Option<u64>,
    pub count: usize,
}

impl GamesConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.count == 0 {
            return Err(ValidationError::InvalidField {
                field: "games.count".to_string(),
                message: "number of games must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Noise model for the simulated player answering from the matrix row.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct AnswererConfig {
    /// Probability of flipping the truthful answer.
    #[serde(default = "default_mistake_rate")]
    pub mistake_rate: f64,
    /// Probability of shrugging instead of answering.
    #[serde(default = "default_dont_know_rate")]
    pub dont_know_rate: f64,
    /// Probability of softening yes/no into probably/probably-not.
    #[serde(default = "default_hedge_rate")]
    pub hedge_rate: f64,
}

impl Default for AnswererConfig {
    fn default() -> Self {
        Self {
            mistake_rate: DEFAULT_MISTAKE_RATE,
            dont_know_rate: DEFAULT_DONT_KNOW_RATE,
            hedge_rate: DEFAULT_HEDGE_RATE,
        }
    }
}

impl AnswererConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        for (label, value) in [
            ("answerer.mistake_rate", self.mistake_rate),
            ("answerer.dont_know_rate", self.dont_know_rate),
            ("answerer.hedge_rate", self.hedge_rate),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: format!("rate {value} must lie in [0, 1]"),
                });
            }
        }
        Ok(())
    }
}

fn default_mistake_rate() -> f64 {
    DEFAULT_MISTAKE_RATE
}

fn default_dont_know_rate() -> f64 {
    DEFAULT_DONT_KNOW_RATE
}

fn default_hedge_rate() -> f64 {
    DEFAULT_HEDGE_RATE
}

/// Optional engine overrides; unset fields keep the engine defaults.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub guess_threshold: Option<f64>,
    #[serde(default)]
    pub max_turns: Option<u32>,
    #[serde(default)]
    pub top_k: Option<usize>,
}

impl EngineConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(threshold) = self.guess_threshold {
            if !threshold.is_finite() || !(0.5..1.0).contains(&threshold) {
                return Err(ValidationError::InvalidField {
                    field: "engine.guess_threshold".to_string(),
                    message: format!("threshold {threshold} must lie in [0.5, 1)"),
                });
            }
        }
        if self.max_turns == Some(0) {
            return Err(ValidationError::InvalidField {
                field: "engine.max_turns".to_string(),
                message: "turn limit must be at least 1".to_string(),
            });
        }
        if self.top_k == Some(0) {
            return Err(ValidationError::InvalidField {
                field: "engine.top_k".to_string(),
                message: "top_k must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Output artifact configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputsConfig {
    pub jsonl: String,
    pub summary_md: String,
}

impl OutputsConfig {
    fn validate(&self, run_id: &str) -> Result<(), ValidationError> {
        for (label, value) in [
            ("outputs.jsonl", &self.jsonl),
            ("outputs.summary_md", &self.summary_md),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "path must not be empty".to_string(),
                });
            }

            let resolved = resolve_template(run_id, value);
            if resolved.components().count() == 0 {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "resolved path is invalid".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Logging configuration defaults to disabled structured logs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable_structured: bool,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_structured: false,
            tracing_level: default_tracing_level(),
        }
    }
}

impl LoggingConfig {
    fn normalize(&mut self) {
        if self.tracing_level.trim().is_empty() {
            self.tracing_level = default_tracing_level();
        }
    }

    pub fn level(&self) -> Option<Level> {
        match self.tracing_level.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn validate_run_id(run_id: &str) -> Result<(), ValidationError> {
    if run_id.trim().is_empty() {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id must not be empty".to_string(),
        });
    }

    if !run_id.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id may only contain alphanumeric characters, '.', '_' or '-'".to_string(),
        });
    }

    Ok(())
}

fn resolve_template(run_id: &str, template: &str) -> PathBuf {
    let replaced = template.replace("{run_id}", run_id);
    PathBuf::from(replaced)
}

/// Fully resolved output paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutputs {
    pub jsonl: PathBuf,
    pub summary_md: PathBuf,
}

/// Errors surfaced when loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid configuration in {path:?}: {source}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

/// Validation failures captured with contextual metadata.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}
