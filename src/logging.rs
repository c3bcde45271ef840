/*!
 * Logging and tracing initialization
 */

use std::fs::File;
use std::path::Path;
use tracing::{Level, Subscriber};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::{LogLevel, LoggingConfig};
use crate::error::{ReconError, Result};

/// Level the filter falls back to when `RUST_LOG` is unset
pub fn effective_level(config: &LoggingConfig) -> Level {
    if config.verbose {
        Level::DEBUG
    } else {
        config.log_level.to_tracing_level()
    }
}

/// Initialize structured logging based on configuration
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let log_level = effective_level(config);

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("reconcile={}", log_level)))
        .map_err(|e| ReconError::Config(format!("Failed to create log filter: {}", e)))?;

    if let Some(ref log_path) = config.log_file {
        init_file_logging(log_path, env_filter)?;
    } else {
        init_stderr_logging(env_filter);
    }

    Ok(())
}

/// Log to stderr so stdout stays clean for verdict lines
fn init_stderr_logging(env_filter: EnvFilter) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// Initialize logging to a file
fn init_file_logging(log_path: &Path, env_filter: EnvFilter) -> Result<()> {
    let file = File::create(log_path)
        .map_err(|e| ReconError::Config(format!("Failed to create log file: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_writer(file)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(false)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}

/// Subscriber scoped around configuration loading.
///
/// The real subscriber depends on the loaded `[logging]` section, so notices
/// raised while reading the file and the environment go through this one.
pub fn bootstrap_subscriber<W>(make_writer: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let level = LogLevel::default().to_tracing_level();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("reconcile={}", level)))
        .with_writer(make_writer)
        .with_target(true)
        .with_ansi(false)
        .compact()
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconConfig;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_verbose_forces_debug() {
        let config = LoggingConfig {
            log_level: LogLevel::Warn,
            log_file: None,
            verbose: true,
        };
        assert_eq!(effective_level(&config), Level::DEBUG);
    }

    #[test]
    fn test_configured_level() {
        let config = LoggingConfig {
            log_level: LogLevel::Error,
            log_file: None,
            verbose: false,
        };
        assert_eq!(effective_level(&config), Level::ERROR);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[test]
    fn test_bootstrap_captures_config_warnings() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = bootstrap_subscriber(move || writer.clone());

        let mut config = ReconConfig::default();
        tracing::subscriber::with_default(subscriber, || {
            config
                .apply_env(|key| (key == "LOGLEVEL").then(|| "chatty".to_string()))
                .unwrap();
        });

        assert_eq!(config.logging.log_level, LogLevel::Trace);
        assert!(captured.text().contains("Log level 'chatty' not supported"));
    }

    #[test]
    fn test_bootstrap_skips_debug() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = bootstrap_subscriber(move || writer.clone());

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("hidden");
            tracing::info!("shown");
        });

        let text = captured.text();
        assert!(text.contains("shown"));
        assert!(!text.contains("hidden"));
    }
}
