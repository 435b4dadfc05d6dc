//! Unified logging system
//!
//! Structured logging with configurable output and optional timing of
//! session operations

use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// `[logging]` section of the client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Fallback level when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
    /// Source file and line on each event
    pub include_location: bool,
    /// Thread ids and names on each event
    pub include_thread: bool,
    /// Append to `log_file_path` instead of stderr
    pub log_to_file: bool,
    pub log_file_path: Option<String>,
    /// Emit span close events, e.g. the duration of `authenticate`
    pub enable_performance_monitoring: bool,
    /// Extra `EnvFilter` directives such as `tradelink_session=debug`
    pub filter_directives: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            include_location: false,
            include_thread: false,
            log_to_file: false,
            log_file_path: None,
            enable_performance_monitoring: false,
            filter_directives: vec![
                "tradelink_core=info".to_string(),
                "tradelink_session=info".to_string(),
            ],
        }
    }
}

impl LoggingConfig {
    /// Verbose preset used by `--verbose`
    pub fn verbose() -> Self {
        Self {
            level: "debug".to_string(),
            include_location: true,
            enable_performance_monitoring: true,
            filter_directives: vec![
                "tradelink_core=debug".to_string(),
                "tradelink_session=debug".to_string(),
                "tradelink=debug".to_string(),
            ],
            ..Default::default()
        }
    }
}

/// Initialize the logging system
pub fn init_logging(
    config: &LoggingConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    for directive in &config.filter_directives {
        filter = filter.add_directive(directive.parse()?);
    }

    let span_events = if config.enable_performance_monitoring {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let base = fmt::layer()
        .with_span_events(span_events)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_thread_ids(config.include_thread)
        .with_thread_names(config.include_thread);

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match (&config.format, config.log_to_file)
    {
        (format, true) => {
            let log_path = config
                .log_file_path
                .as_ref()
                .ok_or("log_file_path must be specified when log_to_file is true")?;
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)?;
            let writer = std::sync::Mutex::new(file);

            match format {
                LogFormat::Json => base.json().with_writer(writer).boxed(),
                LogFormat::Pretty => base.pretty().with_writer(writer).boxed(),
                LogFormat::Compact => base.compact().with_writer(writer).boxed(),
            }
        }
        (LogFormat::Json, false) => base.json().with_writer(std::io::stderr).boxed(),
        (LogFormat::Pretty, false) => base.pretty().with_writer(std::io::stderr).boxed(),
        (LogFormat::Compact, false) => base.compact().with_writer(std::io::stderr).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()?;

    Ok(())
}

/// Performance monitoring utilities
pub mod performance {
    use std::time::Instant;
    use tracing::{info_span, Instrument};

    /// Measure and log execution time of an async operation
    pub async fn measure_async<F, T>(operation_name: &str, future: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        let span = info_span!("performance", operation = operation_name);
        let start = Instant::now();

        let result = future.instrument(span).await;

        tracing::debug!(
            target: "performance",
            operation = operation_name,
            duration_ms = start.elapsed().as_millis() as u64,
            "Operation completed"
        );

        result
    }
}
