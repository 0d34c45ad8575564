mod fields;
mod logging;
mod spans;

pub use logging::{LogQuery, LogRecord, SqliteLogLayer, SqliteLogSink};
pub use spans::{SpanFilter, SpanRecord, SqliteSpanLayer, SqliteSpanSink};

use std::path::PathBuf;
use std::sync::Arc;

use nimbus_core::Settings;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by RUST_LOG env var.
    pub log_level: Level,
    /// Per-module level overrides (e.g. "nimbus_store" => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    /// Whether warn+ logs and agent spans are persisted to SQLite.
    pub trace_to_sqlite: bool,
    /// Path to the trace database (logs and spans tables).
    pub trace_db_path: PathBuf,
    /// Service name stamped on every stdout record.
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        let settings = Settings::default();
        Self::from(&settings)
    }
}

impl From<&Settings> for TelemetryConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            log_level: Level::INFO,
            module_levels: Vec::new(),
            trace_to_sqlite: settings.trace.enabled,
            trace_db_path: settings.trace.db_path.clone(),
            service_name: settings.app_name.clone(),
        }
    }
}

/// Keeps the SQLite sinks reachable for querying after init.
pub struct TelemetryGuard {
    log_sink: Option<Arc<SqliteLogSink>>,
    span_sink: Option<Arc<SqliteSpanSink>>,
}

impl TelemetryGuard {
    /// Access the log sink for querying persisted logs.
    pub fn logs(&self) -> Option<&SqliteLogSink> {
        self.log_sink.as_deref()
    }

    /// Access the span sink for querying exported spans.
    pub fn spans(&self) -> Option<&SqliteSpanSink> {
        self.span_sink.as_deref()
    }
}

fn filter_directive(config: &TelemetryConfig) -> String {
    let mut filter_str = config.log_level.to_string().to_lowercase();
    for (module, level) in &config.module_levels {
        filter_str.push_str(&format!(",{}={}", module, level.to_string().to_lowercase()));
    }
    filter_str
}

/// Initialize the telemetry subsystem. Call once at startup.
pub fn init_telemetry(config: TelemetryConfig) -> TelemetryGuard {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(&config)));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_target(true)
        .with_current_span(true)
        .with_span_list(false)
        .with_filter(env_filter);

    let (log_sink, span_sink) = if config.trace_to_sqlite {
        let logs = SqliteLogSink::new(&config.trace_db_path)
            .map_err(|e| eprintln!("nimbus-telemetry: failed to open log DB: {e}"))
            .ok()
            .map(Arc::new);
        let spans = SqliteSpanSink::new(&config.trace_db_path)
            .map_err(|e| eprintln!("nimbus-telemetry: failed to open span DB: {e}"))
            .ok()
            .map(Arc::new);
        (logs, spans)
    } else {
        (None, None)
    };

    let log_layer = log_sink.clone().map(SqliteLogLayer::new);
    let span_layer = span_sink.clone().map(SqliteSpanLayer::new);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(log_layer)
        .with(span_layer)
        .init();

    tracing::info!(
        service = %config.service_name,
        trace_db = %config.trace_db_path.display(),
        sqlite = config.trace_to_sqlite,
        "telemetry initialized"
    );

    TelemetryGuard { log_sink, span_sink }
}
