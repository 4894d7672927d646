//! Logging infrastructure for kickoff.
//!
//! Provides structured file logging with daily rotation to platform-standard directories.
//! The level filter sits behind a reload layer so the configured level can be applied
//! after the config file has been read.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, reload};

/// Handle for swapping the active level filter at runtime.
pub type ReloadHandle = reload::Handle<EnvFilter, Registry>;

/// Result of initializing the logging system.
pub struct LoggingContext {
    /// Guard that must be held for the application lifetime to ensure logs are flushed.
    pub _guard: WorkerGuard,
    /// The session ID for this kickoff invocation.
    pub session_id: String,
    /// The directory where logs are written.
    pub log_directory: PathBuf,
    /// Reload handle for the level filter.
    pub reload_handle: ReloadHandle,
    /// Whether `RUST_LOG` was set. An explicit env filter wins over the config level.
    pub env_filter_set: bool,
}

/// Error that occurred during logging initialization.
#[derive(Debug)]
pub struct LoggingError {
    pub message: String,
}

impl std::fmt::Display for LoggingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Generates a 6-character random hex session ID.
fn generate_session_id() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    let bytes: [u8; 3] = rng.random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Initializes the logging system.
///
/// Returns a `LoggingContext` on success, or a `LoggingError` on failure.
/// The returned `WorkerGuard` must be held for the application lifetime.
pub fn init() -> Result<LoggingContext, LoggingError> {
    let session_id = generate_session_id();

    let project_dirs =
        ProjectDirs::from("dev", "kickoff", "kickoff").ok_or_else(|| LoggingError {
            message: "Failed to determine platform directories".to_string(),
        })?;

    // macOS: ~/Library/Logs/kickoff/
    // Linux: ~/.local/state/kickoff/
    // Windows: %LocalAppData%\kickoff\
    let log_dir = if cfg!(target_os = "macos") {
        dirs_home_log_dir()
    } else {
        project_dirs
            .state_dir()
            .map(PathBuf::from)
            .or_else(|| Some(project_dirs.data_local_dir().to_path_buf()))
    }
    .ok_or_else(|| LoggingError {
        message: "Failed to determine log directory".to_string(),
    })?;

    fs::create_dir_all(&log_dir).map_err(|e| LoggingError {
        message: format!("Failed to create log directory: {}", e),
    })?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "kickoff");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let (env_filter, env_filter_set) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (EnvFilter::new("info"), false),
    };
    let (filter_layer, reload_handle) = reload::Layer::new(env_filter);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_span_events(FmtSpan::NONE)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    info!(session_id = %session_id, "session_start");

    Ok(LoggingContext {
        _guard: guard,
        session_id,
        log_directory: log_dir,
        reload_handle,
        env_filter_set,
    })
}

/// Replaces the active level filter with `level` (any `EnvFilter` directive).
pub fn update_log_level(handle: &ReloadHandle, level: &str) -> Result<(), String> {
    let filter = EnvFilter::try_new(level).map_err(|e| format!("Invalid log level: {}", e))?;
    handle
        .reload(filter)
        .map_err(|e| format!("Failed to update log level: {}", e))?;
    info!(level = %level, "log_level_changed");
    Ok(())
}

/// Gets the macOS ~/Library/Logs/kickoff/ directory.
fn dirs_home_log_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join("Library").join("Logs").join("kickoff"))
}

/// Cleans up log files older than the retention period.
///
/// Scans the log directory for `kickoff.*` files and deletes those older than 7 days.
/// Errors are logged at WARN level but don't prevent app startup.
pub fn cleanup_old_logs(log_dir: &Path) {
    use std::time::{Duration, SystemTime};
    use tracing::{debug, warn};

    const RETENTION_DAYS: u64 = 7;
    let retention_duration = Duration::from_secs(RETENTION_DAYS * 24 * 60 * 60);

    let entries = match fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "log_cleanup_read_failed");
            return;
        }
    };

    let now = SystemTime::now();
    let mut deleted_count = 0u32;

    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();

        let file_name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) if is_log_file(name) => name,
            _ => continue,
        };

        let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(e) => {
                warn!(file = %file_name, error = %e, "log_metadata_failed");
                continue;
            }
        };

        // Future mtime: skip
        let Ok(age) = now.duration_since(modified) else {
            continue;
        };

        if age > retention_duration {
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(file = %file_name, age_days = age.as_secs() / 86400, "old_log_deleted");
                    deleted_count += 1;
                }
                Err(e) => {
                    warn!(file = %file_name, error = %e, "old_log_delete_failed");
                }
            }
        }
    }

    if deleted_count > 0 {
        debug!(count = deleted_count, "log_cleanup_completed");
    }
}

/// Rolling appender files are named `kickoff.YYYY-MM-DD`.
fn is_log_file(name: &str) -> bool {
    name.starts_with("kickoff.") && name != "kickoff"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_format() {
        let id = generate_session_id();
        assert_eq!(id.len(), 6);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_is_log_file() {
        assert!(is_log_file("kickoff.2026-10-01"));
        assert!(!is_log_file("kickoff"));
        assert!(!is_log_file("other.2026-10-01"));
    }

    #[test]
    fn test_cleanup_keeps_fresh_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let fresh = dir.path().join("kickoff.2026-10-19");
        let foreign = dir.path().join("notes.txt");
        fs::write(&fresh, "log").unwrap();
        fs::write(&foreign, "keep").unwrap();

        cleanup_old_logs(dir.path());

        assert!(fresh.exists());
        assert!(foreign.exists());
    }

    #[test]
    fn test_cleanup_missing_directory_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        cleanup_old_logs(&dir.path().join("missing"));
    }
}
