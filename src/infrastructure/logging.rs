//! Logging system configuration and initialization
//!
//! - Console and file output, each optional
//! - Existing log file renamed with its timestamp on startup
//! - Structured JSON file logging (optional)
//! - KST (Korea Standard Time) timestamps

use anyhow::{Result, anyhow};
use chrono::{DateTime, FixedOffset, Offset, Utc};
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

/// Log file written by the current run
pub const LOG_FILE_NAME: &str = "culturelecture-scrape.log";

const KST_OFFSET_SECONDS: i32 = 9 * 3600;

// Keeps the non-blocking file writer alive until process exit
static LOG_GUARDS: Lazy<Mutex<Vec<WorkerGuard>>> = Lazy::new(|| Mutex::new(Vec::new()));

fn kst() -> FixedOffset {
    FixedOffset::east_opt(KST_OFFSET_SECONDS).unwrap_or_else(|| Utc.fix())
}

/// Custom time formatter for KST (Korea Standard Time, UTC+9)
struct KstTimeFormatter;

impl FormatTime for KstTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        let kst_time = Utc::now().with_timezone(&kst());
        write!(w, "{}", kst_time.format("%Y-%m-%d %H:%M:%S%.3f %:z"))
    }
}

/// `logs/` next to the executable, or the configured directory
pub fn get_log_directory(config: &LoggingConfig) -> PathBuf {
    if let Some(dir) = &config.log_dir {
        return dir.clone();
    }

    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    exe_dir.join("logs")
}

/// Name under which a previous run's log file is kept
fn rotated_file_name(log_file_name: &str, written_at: DateTime<FixedOffset>) -> String {
    let file_stem = log_file_name.trim_end_matches(".log");
    format!("{}.{}.log", file_stem, written_at.format("%Y%m%dT%H%M%S"))
}

/// Rename the previous run's log file with its timestamp
fn rotate_existing_log_file(log_dir: &Path, log_file_name: &str) -> Result<Option<String>> {
    let log_file_path = log_dir.join(log_file_name);
    if !log_file_path.exists() {
        return Ok(None);
    }

    let metadata = std::fs::metadata(&log_file_path)
        .map_err(|e| anyhow!("Failed to get log file metadata: {e}"))?;
    let file_time = metadata
        .modified()
        .or_else(|_| metadata.created())
        .unwrap_or_else(|_| std::time::SystemTime::now());

    let datetime: DateTime<Utc> = file_time.into();
    let timestamped_name = rotated_file_name(log_file_name, datetime.with_timezone(&kst()));
    let timestamped_path = log_dir.join(&timestamped_name);

    std::fs::rename(&log_file_path, &timestamped_path).map_err(|e| {
        anyhow!(
            "Failed to rotate log file {} to {}: {e}",
            log_file_path.display(),
            timestamped_path.display()
        )
    })?;

    Ok(Some(timestamped_name))
}

/// Base filter: configured level for this crate, dependency chatter suppressed unless TRACE
fn build_env_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut directives = vec![level.to_string()];
    if !level.to_lowercase().contains("trace") {
        directives.extend([
            "reqwest=info".to_string(),
            "hyper=warn".to_string(),
            "hyper_util=warn".to_string(),
            "h2=warn".to_string(),
            "html5ever=warn".to_string(),
            "selectors=warn".to_string(),
            "tokio=info".to_string(),
            "runtime=warn".to_string(),
        ]);
    }
    directives.push(format!("culturelecture_scrape_lib={level}"));
    directives.push(format!("culturelecture_scrape={level}"));

    EnvFilter::try_new(directives.join(","))
        .map_err(|e| anyhow!("Invalid log level '{level}': {e}"))
}

/// Initialize logging with custom configuration
///
/// `RUST_LOG` overrides the configured level and the dependency filters:
/// ```bash
/// RUST_LOG="debug,reqwest=debug,hyper=debug" culturelecture-scrape
/// ```
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    if !config.file_output && !config.console_output {
        return Err(anyhow!("No logging output configured"));
    }

    let env_filter = build_env_filter(&config.level)?;

    let log_dir = get_log_directory(config);
    let mut rotated = None;
    let file_writer = if config.file_output {
        std::fs::create_dir_all(&log_dir)
            .map_err(|e| anyhow!("Failed to create log directory {log_dir:?}: {e}"))?;
        rotated = rotate_existing_log_file(&log_dir, LOG_FILE_NAME)?;

        let (writer, guard) = non_blocking(rolling::never(&log_dir, LOG_FILE_NAME));
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("Log guard registry poisoned"))?
            .push(guard);
        Some(writer)
    } else {
        None
    };

    let json_file_layer = file_writer.clone().filter(|_| config.json_format).map(|writer| {
        fmt::Layer::new()
            .json()
            .with_writer(writer)
            .with_timer(KstTimeFormatter)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
    });

    // time + level + message only
    let plain_file_layer = file_writer.filter(|_| !config.json_format).map(|writer| {
        fmt::Layer::new()
            .with_writer(writer)
            .with_timer(KstTimeFormatter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(false)
    });

    let console_layer = config.console_output.then(|| {
        fmt::Layer::new()
            .with_writer(std::io::stdout)
            .with_timer(KstTimeFormatter)
            .with_target(false)
    });

    Registry::default()
        .with(env_filter)
        .with(json_file_layer)
        .with(plain_file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))?;

    info!("Logging system initialized");
    if let Some(name) = rotated {
        info!("Rotated existing log file to: {}", name);
    }
    if config.file_output {
        info!("Log directory: {:?}", log_dir);
    }
    info!("Log level: {}", config.level);
    info!("JSON format: {}", config.json_format);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert!(!config.level.is_empty());
        assert!(config.console_output);
        assert!(config.file_output);
    }

    #[test]
    fn test_log_directory_defaults_to_logs() {
        let log_dir = get_log_directory(&LoggingConfig::default());
        assert!(log_dir.to_string_lossy().ends_with("logs"));
    }

    #[test]
    fn test_configured_log_directory_wins() {
        let config = LoggingConfig {
            log_dir: Some(PathBuf::from("/tmp/culture-logs")),
            ..LoggingConfig::default()
        };
        assert_eq!(get_log_directory(&config), PathBuf::from("/tmp/culture-logs"));
    }

    #[test]
    fn test_rotation_renames_previous_log() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(LOG_FILE_NAME), "previous run\n").unwrap();

        let rotated = rotate_existing_log_file(dir.path(), LOG_FILE_NAME).unwrap().unwrap();

        assert!(rotated.starts_with("culturelecture-scrape."));
        assert!(rotated.ends_with(".log"));
        assert!(!dir.path().join(LOG_FILE_NAME).exists());
        assert!(dir.path().join(&rotated).exists());
    }

    #[test]
    fn test_rotation_without_previous_log() {
        let dir = tempfile::tempdir().unwrap();
        assert!(rotate_existing_log_file(dir.path(), LOG_FILE_NAME).unwrap().is_none());
    }

    #[test]
    fn test_rotated_name_has_no_colons() {
        let at = kst().with_ymd_and_hms(2021, 7, 3, 14, 5, 9).unwrap();
        assert_eq!(
            rotated_file_name(LOG_FILE_NAME, at),
            "culturelecture-scrape.20210703T140509.log"
        );
    }
}
