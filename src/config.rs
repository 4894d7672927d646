use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::inferencer::QuestionSequence;

/// Status of config file loading
#[derive(Debug, Clone)]
pub enum ConfigLoadStatus {
    /// Config loaded successfully from existing file
    Loaded,
    /// Created default config file (first run)
    Created,
    /// Error occurred during loading, using defaults
    Error(String),
}

impl ConfigLoadStatus {
    /// Why the defaults were used, if they were.
    pub fn warning(&self) -> Option<&str> {
        match self {
            ConfigLoadStatus::Error(reason) => Some(reason.as_str()),
            ConfigLoadStatus::Loaded | ConfigLoadStatus::Created => None,
        }
    }
}

/// Interview configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterviewConfig {
    /// Number of fixed questions the server asks: 6 (standard) or 4 (legacy).
    pub question_count: u32,
    /// Suggested project name. Falls back to the working directory name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            question_count: 6,
            project_name: None,
        }
    }
}

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PathsConfig {
    /// SQLite database. Unset means the platform data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Whether to save the inferred stack (and provision backlog items)
    /// once the fixed questions are answered.
    pub save_stack: bool,
    /// Whether to print the option parser's trace under each question.
    pub show_parse_trace: bool,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            save_stack: true,
            show_parse_trace: false,
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub interview: InterviewConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub behavior: BehaviorConfig,
}

impl Config {
    /// Expand `~` to home directory in a path string
    pub fn expand_tilde(path: &str) -> PathBuf {
        if let Some(stripped) = path.strip_prefix("~/")
            && let Some(home) = dirs::home_dir()
        {
            return home.join(stripped);
        }
        PathBuf::from(path)
    }

    /// Get the database path, defaulting to the platform data directory.
    pub fn database_path(&self) -> PathBuf {
        match &self.paths.database {
            Some(path) => Self::expand_tilde(path),
            None => ProjectDirs::from("dev", "kickoff", "kickoff")
                .map(|dirs| dirs.data_dir().join("kickoff.db"))
                .unwrap_or_else(|| PathBuf::from("kickoff.db")),
        }
    }

    /// Question sequence for the configured count. Unsupported counts fall
    /// back to the standard sequence.
    pub fn question_sequence(&self) -> QuestionSequence {
        QuestionSequence::from_question_count(self.interview.question_count).unwrap_or_else(|| {
            warn!(
                question_count = self.interview.question_count,
                "unsupported_question_count"
            );
            QuestionSequence::Standard
        })
    }
}

/// Partial interview configuration for project overrides.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PartialInterviewConfig {
    pub question_count: Option<u32>,
    pub project_name: Option<String>,
}

/// Partial path configuration for project overrides.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PartialPathsConfig {
    pub database: Option<String>,
}

/// Partial logging configuration for project overrides.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PartialLoggingConfig {
    pub level: Option<String>,
}

/// Partial behavior configuration for project overrides.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PartialBehaviorConfig {
    pub save_stack: Option<bool>,
    pub show_parse_trace: Option<bool>,
}

/// Project-specific configuration where every field is optional.
/// Parsed from `.kickoff` files. Fields that are `None` inherit from the global config.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PartialConfig {
    pub interview: PartialInterviewConfig,
    pub paths: PartialPathsConfig,
    pub logging: PartialLoggingConfig,
    pub behavior: PartialBehaviorConfig,
}

/// Merge a global config with a project-level partial config.
/// Project values override global values where present.
pub fn merge_config(global: &Config, project: &PartialConfig) -> Config {
    Config {
        interview: InterviewConfig {
            question_count: project
                .interview
                .question_count
                .unwrap_or(global.interview.question_count),
            project_name: project
                .interview
                .project_name
                .clone()
                .or_else(|| global.interview.project_name.clone()),
        },
        paths: PathsConfig {
            database: project
                .paths
                .database
                .clone()
                .or_else(|| global.paths.database.clone()),
        },
        logging: LoggingConfig {
            level: project
                .logging
                .level
                .clone()
                .unwrap_or_else(|| global.logging.level.clone()),
        },
        behavior: BehaviorConfig {
            save_stack: project
                .behavior
                .save_stack
                .unwrap_or(global.behavior.save_stack),
            show_parse_trace: project
                .behavior
                .show_parse_trace
                .unwrap_or(global.behavior.show_parse_trace),
        },
    }
}

/// Loaded configuration with metadata
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub config_path: PathBuf,
    pub project_config_path: Option<PathBuf>,
    pub status: ConfigLoadStatus,
}

/// Get the platform-appropriate config directory
fn get_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("dev", "kickoff", "kickoff").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the full path to the config file
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.kickoff in current working directory).
pub fn get_project_config_path() -> Option<PathBuf> {
    let path = std::env::current_dir().ok()?.join(".kickoff");
    if path.exists() { Some(path) } else { None }
}

/// Load a project config (.kickoff) from the given path.
/// Returns Ok(PartialConfig) on success, Err(String) on parse/read failure.
fn load_project_config(path: &Path) -> Result<PartialConfig, String> {
    let contents = fs::read_to_string(path).map_err(|e| {
        warn!(path = ?path, error = %e, "project_config_read_failed");
        format!("Failed to read .kickoff: {}", e)
    })?;

    toml::from_str::<PartialConfig>(&contents).map_err(|e| {
        warn!(path = ?path, error = %e, "project_config_parse_failed");
        format!("Invalid .kickoff: {}", e)
    })
}

/// Load configuration from file, environment, and defaults
pub fn load_config() -> LoadedConfig {
    let Some(config_path) = get_config_path() else {
        let reason = "could not determine config directory".to_string();
        warn!(error = %reason, "config_dir_unknown");
        return LoadedConfig {
            config: apply_env_overrides(Config::default()),
            config_path: PathBuf::from("config.toml"),
            project_config_path: None,
            status: ConfigLoadStatus::Error(reason),
        };
    };

    let (mut config, status) = load_or_create_config(&config_path);

    let project_config_path = get_project_config_path();
    if let Some(ref project_path) = project_config_path {
        match load_project_config(project_path) {
            Ok(partial) => {
                config = merge_config(&config, &partial);
                info!(path = ?project_path, "project_config_loaded");
            }
            Err(e) => {
                warn!(path = ?project_path, error = %e, "project_config_error");
            }
        }
    }

    let config = apply_env_overrides(config);

    LoadedConfig {
        config,
        config_path,
        project_config_path,
        status,
    }
}

/// Reads the config at `config_path`, writing the defaults there when no file exists.
/// Any other failure falls back to the defaults and reports why.
fn load_or_create_config(config_path: &Path) -> (Config, ConfigLoadStatus) {
    let contents = match fs::read_to_string(config_path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return create_default_config(config_path),
        Err(e) => {
            warn!(path = ?config_path, kind = ?e.kind(), error = %e, "config_read_failed");
            return (
                Config::default(),
                ConfigLoadStatus::Error(format!("could not read {}: {}", config_path.display(), e)),
            );
        }
    };

    match toml::from_str::<Config>(&contents) {
        Ok(config) => {
            debug!(path = ?config_path, "config_file_loaded");
            (config, ConfigLoadStatus::Loaded)
        }
        Err(e) => {
            warn!(path = ?config_path, error = %e, "config_parse_failed");
            (
                Config::default(),
                ConfigLoadStatus::Error(format!("malformed TOML in {}: {}", config_path.display(), e)),
            )
        }
    }
}

/// Writes the default config and returns it. The defaults are still used when the write fails.
fn create_default_config(config_path: &Path) -> (Config, ConfigLoadStatus) {
    let config = Config::default();
    match write_config(config_path, &config) {
        Ok(()) => {
            info!(path = ?config_path, "config_created");
            (config, ConfigLoadStatus::Created)
        }
        Err(e) => {
            warn!(path = ?config_path, error = %e, "config_create_failed");
            (config, ConfigLoadStatus::Error(e))
        }
    }
}

fn write_config(config_path: &Path, config: &Config) -> Result<(), String> {
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            format!("could not create config directory {}: {}", parent.display(), e)
        })?;
    }
    let contents = toml::to_string_pretty(config)
        .map_err(|e| format!("could not serialize default config: {}", e))?;
    fs::write(config_path, contents)
        .map_err(|e| format!("could not write {}: {}", config_path.display(), e))
}

/// Apply environment variable overrides to config
fn apply_env_overrides(config: Config) -> Config {
    apply_overrides(config, |key| env::var(key).ok())
}

fn apply_overrides(mut config: Config, lookup: impl Fn(&str) -> Option<String>) -> Config {
    if let Some(path) = lookup("KICKOFF_DB_PATH") {
        debug!(key = "KICKOFF_DB_PATH", "config_env_override");
        config.paths.database = Some(path);
    }

    if let Some(level) = lookup("KICKOFF_LOG") {
        debug!(key = "KICKOFF_LOG", "config_env_override");
        config.logging.level = level;
    }

    if let Some(count) = lookup("KICKOFF_QUESTION_COUNT") {
        match count.trim().parse::<u32>() {
            Ok(count) => {
                debug!(key = "KICKOFF_QUESTION_COUNT", "config_env_override");
                config.interview.question_count = count;
            }
            Err(e) => warn!(value = %count, error = %e, "invalid_question_count_override"),
        }
    }

    config
}
