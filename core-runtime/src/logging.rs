//! # Logging & Tracing Infrastructure
//!
//! Structured logging with the `tracing` crate:
//! - JSON, pretty and compact output formats
//! - Per-crate filtering through `EnvFilter`
//! - Redaction of private share-link tokens
//! - Forwarding to the host's logger via `LoggerSink`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_traits::time::{ConsoleLogger, LogLevel};
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = LoggingConfig::default()
//!         .with_format(LogFormat::Pretty)
//!         .with_level(LogLevel::Debug)
//!         .with_logger_sink(Arc::new(ConsoleLogger::default()));
//!
//!     init_logging(config).expect("Failed to initialize logging");
//!     tracing::info!("Player shell started");
//! }
//! ```
//!
//! ## LoggerSink integration
//!
//! When a sink is configured, every event that survives filtering is mirrored
//! to it as a [`LogEntry`](bridge_traits::time::LogEntry) carrying the
//! original message plus the event's fields. Inside a Tokio runtime the sink
//! is called on a spawned task; outside of one it is driven to completion
//! inline.

use crate::error::{Error, Result};

use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    filter::EnvFilter,
    fmt::format::FmtSpan,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer, Registry,
};

/// Crates whose level follows [`LoggingConfig::level`] in the default filter.
const OWN_CRATES: &[&str] = &[
    "soundstage_workspace",
    "core_runtime",
    "core_consent",
    "core_playback",
    "core_service",
    "bridge_desktop",
];

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable pretty format with colors
    Pretty,
    /// Structured JSON format for machine parsing
    Json,
    /// Compact format for production
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        #[cfg(debug_assertions)]
        return Self::Pretty;

        #[cfg(not(debug_assertions))]
        return Self::Json;
    }
}

/// Logging configuration
#[derive(Clone)]
pub struct LoggingConfig {
    /// Output format
    pub format: LogFormat,
    /// Minimum log level
    pub level: LogLevel,
    /// Custom filter string (e.g., "core_playback=trace,sqlx=warn")
    pub filter: Option<String>,
    /// Optional logger sink for forwarding logs to host
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Emit span enter/exit records
    pub enable_spans: bool,
    /// Display target module in logs
    pub display_target: bool,
    /// Display thread info
    pub display_thread_info: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            logger_sink: None,
            enable_spans: true,
            display_target: true,
            display_thread_info: false,
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("filter", &self.filter)
            .field("has_logger_sink", &self.logger_sink.is_some())
            .field("enable_spans", &self.enable_spans)
            .finish()
    }
}

impl LoggingConfig {
    /// Set log format
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set minimum log level
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Set custom filter string
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Set logger sink for host integration
    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    /// Enable or disable span records
    pub fn with_spans(mut self, enable: bool) -> Self {
        self.enable_spans = enable;
        self
    }

    /// Enable or disable target display
    pub fn with_target(mut self, display: bool) -> Self {
        self.display_target = display;
        self
    }

    /// Enable or disable thread info
    pub fn with_thread_info(mut self, display: bool) -> Self {
        self.display_thread_info = display;
        self
    }
}

/// Initialize the global subscriber.
///
/// Call once during startup. A second call fails with [`Error::Logging`]
/// because a global subscriber is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;

    tracing_subscriber::registry()
        .with(output_layer(&config))
        .with(LoggerSinkLayer::new(config.logger_sink.clone()))
        .with(filter)
        .try_init()
        .map_err(|e| Error::Logging(format!("Failed to initialize logging: {}", e)))
}

/// Stdout layer for the configured format. Span records only apply to the
/// human-readable formats; JSON lines carry the span list instead.
fn output_layer(config: &LoggingConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let span_events = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let layer = tracing_subscriber::fmt::layer()
        .with_target(config.display_target)
        .with_thread_ids(config.display_thread_info)
        .with_thread_names(config.display_thread_info)
        .with_writer(io::stdout);

    match config.format {
        LogFormat::Pretty => layer.pretty().with_span_events(span_events).boxed(),
        LogFormat::Compact => layer.compact().with_span_events(span_events).boxed(),
        LogFormat::Json => layer
            .json()
            .flatten_event(true)
            .with_current_span(config.enable_spans)
            .with_span_list(config.enable_spans)
            .boxed(),
    }
}

fn default_filter_string(level: LogLevel) -> String {
    let level = level.as_directive();
    let mut directives: Vec<String> = OWN_CRATES
        .iter()
        .map(|krate| format!("{}={}", krate, level))
        .collect();
    directives.push("sqlx=warn".to_string());
    directives.join(",")
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let filter_string = config
        .filter
        .clone()
        .unwrap_or_else(|| default_filter_string(config.level));

    EnvFilter::try_new(filter_string)
        .map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))
}

/// Layer that forwards events to a `LoggerSink` implementation.
struct LoggerSinkLayer {
    sink: Option<Arc<dyn LoggerSink>>,
}

impl LoggerSinkLayer {
    fn new(sink: Option<Arc<dyn LoggerSink>>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for LoggerSinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };

        let metadata = event.metadata();
        let level = tracing_level_to_log_level(*metadata.level());
        if level < sink.min_level() {
            return;
        }

        let mut visitor = SinkVisitor::default();
        event.record(&mut visitor);

        let message = visitor
            .message
            .unwrap_or_else(|| metadata.name().to_string());

        let mut entry = LogEntry::new(level, metadata.target(), message);
        for (key, value) in visitor.fields {
            entry = entry.with_field(key, value);
        }
        if let Some(span) = ctx.lookup_current() {
            entry = entry.with_span(span.name());
        }

        let sink = Arc::clone(sink);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(err) = sink.log(entry).await {
                    eprintln!("LoggerSink error: {}", err);
                }
            });
            return;
        }

        if let Err(err) = futures::executor::block_on(sink.log(entry)) {
            eprintln!("LoggerSink error: {}", err);
        }
    }
}

#[derive(Default)]
struct SinkVisitor {
    message: Option<String>,
    fields: HashMap<String, String>,
}

impl SinkVisitor {
    fn record_value(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for SinkVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_value(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_value(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_value(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record_value(field, value.to_string());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.record_value(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.record_value(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_value(field, format!("{:?}", value));
    }
}

fn tracing_level_to_log_level(level: tracing::Level) -> LogLevel {
    match level {
        tracing::Level::TRACE => LogLevel::Trace,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::ERROR => LogLevel::Error,
    }
}

/// Drop the query string and fragment of a URL before logging it.
///
/// Private share links carry their access token in the query
/// (`?secret_token=...`); the path alone is enough to identify the source.
///
/// ```ignore
/// use core_runtime::logging::strip_query;
///
/// let url = "https://soundcloud.com/artist/sets/demo?secret_token=s-abc";
/// tracing::info!(source = %strip_query(url), "Mounting widget");
/// // Logs: source="https://soundcloud.com/artist/sets/demo"
/// ```
pub fn strip_query(url: &str) -> &str {
    let end = url.find(|c| c == '?' || c == '#').unwrap_or(url.len());
    &url[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as SinkResult;
    use std::sync::Mutex;

    #[test]
    fn test_logging_config_builder() {
        let config = LoggingConfig::default()
            .with_format(LogFormat::Json)
            .with_level(LogLevel::Debug)
            .with_filter("core_playback=trace")
            .with_spans(false)
            .with_target(true)
            .with_thread_info(true);

        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.filter, Some("core_playback=trace".to_string()));
        assert!(!config.enable_spans);
        assert!(config.display_target);
        assert!(config.display_thread_info);
    }

    #[test]
    fn test_strip_query() {
        assert_eq!(
            strip_query("https://soundcloud.com/a/sets/demo?secret_token=s-abc"),
            "https://soundcloud.com/a/sets/demo"
        );
        assert_eq!(
            strip_query("https://soundcloud.com/a/track#t=1:20"),
            "https://soundcloud.com/a/track"
        );
        assert_eq!(strip_query("https://soundcloud.com/a"), "https://soundcloud.com/a");
    }

    #[test]
    fn test_default_format() {
        #[cfg(debug_assertions)]
        assert_eq!(LogFormat::default(), LogFormat::Pretty);

        #[cfg(not(debug_assertions))]
        assert_eq!(LogFormat::default(), LogFormat::Json);
    }

    #[test]
    fn test_build_filter_covers_own_crates() {
        let config = LoggingConfig::default().with_level(LogLevel::Debug);
        let filter = build_filter(&config).unwrap().to_string();
        assert!(filter.contains("core_playback=debug"));
        assert!(filter.contains("core_consent=debug"));
        assert!(filter.contains("sqlx=warn"));
    }

    #[test]
    fn test_build_custom_filter() {
        let config = LoggingConfig::default().with_filter("core_consent=trace");
        let filter = build_filter(&config).unwrap();
        assert!(filter.to_string().contains("core_consent=trace"));
    }

    #[test]
    fn test_logger_sink_layer_forwards_event() {
        let sink = Arc::new(TestLoggerSink::default());
        let trait_sink: Arc<dyn LoggerSink> = sink.clone();
        let subscriber = tracing_subscriber::registry().with(LoggerSinkLayer::new(Some(trait_sink)));
        let _guard = tracing::subscriber::set_default(subscriber);

        tracing::info!(target: "core_playback::engine", volume = 37u64, "Widget ready");

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.target, "core_playback::engine");
        assert_eq!(entry.message, "Widget ready");
        assert_eq!(entry.fields.get("volume"), Some(&"37".to_string()));
    }

    #[test]
    fn test_logger_sink_respects_min_level() {
        let sink = Arc::new(TestLoggerSink {
            min: LogLevel::Warn,
            ..Default::default()
        });
        let trait_sink: Arc<dyn LoggerSink> = sink.clone();
        let subscriber = tracing_subscriber::registry().with(LoggerSinkLayer::new(Some(trait_sink)));
        let _guard = tracing::subscriber::set_default(subscriber);

        tracing::debug!("setter noise");
        tracing::warn!("pause failed during teardown");

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Warn);
    }

    struct TestLoggerSink {
        entries: Mutex<Vec<LogEntry>>,
        min: LogLevel,
    }

    impl Default for TestLoggerSink {
        fn default() -> Self {
            Self {
                entries: Mutex::new(Vec::new()),
                min: LogLevel::Trace,
            }
        }
    }

    #[async_trait]
    impl LoggerSink for TestLoggerSink {
        async fn log(&self, entry: LogEntry) -> SinkResult<()> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }

        fn min_level(&self) -> LogLevel {
            self.min
        }
    }
}
