use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::FocusError;

/// Logging configuration for focuswall
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Whether to include thread names in logs
    pub include_thread_names: bool,

    /// Whether to include file and line number information
    pub include_file_info: bool,

    /// Whether to enable colored output on stderr
    pub enable_colors: bool,

    /// Log file path (optional, if None logs only to stderr)
    pub log_file: Option<String>,

    /// Module-specific log levels
    pub module_levels: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut module_levels = HashMap::new();

        // The proxy stack is chatty at info; keep it quiet under the shell prompt
        module_levels.insert("focus_core".to_string(), "warn".to_string());
        module_levels.insert("hudsucker".to_string(), "error".to_string());
        module_levels.insert("hyper".to_string(), "warn".to_string());
        module_levels.insert("rustls".to_string(), "error".to_string());

        Self {
            level: "warn".to_string(),
            include_thread_names: false,
            include_file_info: false,
            enable_colors: true,
            log_file: None,
            module_levels,
        }
    }
}

/// Build the filter: `RUST_LOG` wins, otherwise level plus module directives.
fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, FocusError> {
    if !levels::is_valid_level(&config.level) {
        let msg = format!("Invalid log level '{}'", config.level);
        return Err(FocusError::Logging(msg));
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::new(&config.level);
    for (module, level) in &config.module_levels {
        let directive = format!("{}={}", module, level);
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|e| FocusError::Logging(format!("Invalid log directive: {}", e)))?,
        );
    }
    Ok(filter)
}

/// Initialize logging based on the provided configuration.
///
/// Logs go to stderr so they do not interleave with the command prompt on stdout.
/// When a log file is configured, the returned guard must be kept alive for the
/// lifetime of the process or buffered lines are lost.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, FocusError> {
    let filter = build_filter(config)?;

    let (file_layer, guard) = match &config.log_file {
        Some(path) => {
            let appender = create_file_appender(path)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // Try to initialize logging, ignore if already initialized
    let result = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_names(config.include_thread_names)
                .with_file(config.include_file_info)
                .with_line_number(config.include_file_info)
                .with_ansi(config.enable_colors),
        )
        .with(file_layer)
        .try_init();

    match result {
        Ok(_) => tracing::debug!("Logging initialized with config level: {}", config.level),
        Err(_) => tracing::debug!("Logging already initialized, skipping"),
    }

    Ok(guard)
}

/// Create a non-rotating file appender for the given path
fn create_file_appender(
    log_file: &str,
) -> Result<tracing_appender::rolling::RollingFileAppender, FocusError> {
    let log_path = Path::new(log_file);
    let directory = match log_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let filename = log_path
        .file_name()
        .ok_or_else(|| FocusError::Logging("Invalid log file name".to_string()))?;

    std::fs::create_dir_all(directory)
        .map_err(|e| FocusError::Logging(format!("Failed to create log directory: {}", e)))?;

    Ok(tracing_appender::rolling::never(directory, filename))
}

/// Log level utilities
pub mod levels {
    /// Check if a log level string is valid
    pub fn is_valid_level(level: &str) -> bool {
        matches!(
            level.to_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_logging_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "warn");
        assert!(config.log_file.is_none());
        assert_eq!(
            config.module_levels.get("hudsucker").map(String::as_str),
            Some("error")
        );
    }

    #[test]
    fn test_log_level_validation() {
        assert!(levels::is_valid_level("info"));
        assert!(levels::is_valid_level("DEBUG"));
        assert!(!levels::is_valid_level("verbose"));
        assert!(!levels::is_valid_level(""));
    }

    #[test]
    fn test_invalid_level_rejected_by_filter() {
        let config = LoggingConfig {
            level: "verbose".to_string(),
            ..Default::default()
        };
        assert!(matches!(build_filter(&config), Err(FocusError::Logging(_))));
        assert!(matches!(init_logging(&config), Err(FocusError::Logging(_))));
    }

    #[test]
    fn test_invalid_module_directive_rejected() {
        let mut config = LoggingConfig::default();
        config
            .module_levels
            .insert("focus_core".to_string(), "loud".to_string());
        // RUST_LOG would bypass the configured directives entirely
        if std::env::var("RUST_LOG").is_err() {
            assert!(matches!(build_filter(&config), Err(FocusError::Logging(_))));
        }
    }

    #[test]
    fn test_file_appender_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("focuswall.log");
        create_file_appender(path.to_str().unwrap()).unwrap();
        assert!(dir.path().join("logs").is_dir());
    }
}
