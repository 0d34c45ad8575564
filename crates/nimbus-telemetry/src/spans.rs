//! Export of agent-level spans to SQLite.
//!
//! HTTP plumbing spans are noise next to the agent traces, so only spans
//! that carry a conversation id or look like an agent/LLM invocation are
//! written. Everything else still reaches the stdout JSON log.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::span;
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::fields::FieldVisitor;

const EXCLUDED_NAMES: &[&str] = &["POST", "GET", "PUT", "DELETE", "PATCH", "OPTIONS", "HEAD"];
const EXCLUDED_PREFIXES: &[&str] = &["HTTP ", "/chat", "GET /", "POST /"];
const CONVERSATION_KEYS: &[&str] = &["session_id", "thread_id", "conversation_id"];
const AGENT_KEYWORDS: &[&str] = &["invocation", "run_query", "agent", "llm"];

/// Decides which closed spans are exported.
#[derive(Clone, Debug, Default)]
pub struct SpanFilter;

impl SpanFilter {
    pub fn should_export<'a>(&self, name: &str, field_names: impl IntoIterator<Item = &'a str>) -> bool {
        if EXCLUDED_NAMES.contains(&name) {
            return false;
        }
        if EXCLUDED_PREFIXES.iter().any(|p| name.starts_with(p)) {
            return false;
        }
        if field_names.into_iter().any(|f| CONVERSATION_KEYS.contains(&f)) {
            return true;
        }
        let lower = name.to_lowercase();
        AGENT_KEYWORDS.iter().any(|k| lower.contains(k))
    }
}

/// A span persisted to SQLite.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpanRecord {
    pub id: i64,
    pub name: String,
    pub target: String,
    pub started_at: String,
    pub duration_ms: i64,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub fields: Option<String>,
}

const CREATE_SPANS: &str = "
    CREATE TABLE IF NOT EXISTS spans (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        target TEXT NOT NULL,
        started_at TEXT NOT NULL,
        duration_ms INTEGER NOT NULL,
        session_id TEXT,
        user_id TEXT,
        fields TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_spans_session ON spans(session_id);";

pub struct SqliteSpanSink {
    conn: Mutex<Connection>,
}

impl SqliteSpanSink {
    pub fn new(db_path: &Path) -> Result<Self, rusqlite::Error> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(CREATE_SPANS)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_SPANS)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn insert(&self, span: &FinishedSpan) {
        let conn = self.conn.lock();
        let _ = conn.execute(
            "INSERT INTO spans (name, target, started_at, duration_ms, session_id, user_id, fields)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                span.name,
                span.target,
                span.started_at.to_rfc3339(),
                span.duration_ms,
                span.session_id,
                span.user_id,
                span.fields,
            ],
        );
    }

    /// Spans for one session, oldest first.
    pub fn for_session(&self, session_id: &str) -> Result<Vec<SpanRecord>, rusqlite::Error> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, target, started_at, duration_ms, session_id, user_id, fields
             FROM spans WHERE session_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([session_id], row_to_span)?;
        rows.collect()
    }

    pub fn recent(&self, limit: u32) -> Result<Vec<SpanRecord>, rusqlite::Error> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, target, started_at, duration_ms, session_id, user_id, fields
             FROM spans ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit], row_to_span)?;
        rows.collect()
    }
}

fn row_to_span(row: &rusqlite::Row<'_>) -> Result<SpanRecord, rusqlite::Error> {
    Ok(SpanRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        target: row.get(2)?,
        started_at: row.get(3)?,
        duration_ms: row.get(4)?,
        session_id: row.get(5)?,
        user_id: row.get(6)?,
        fields: row.get(7)?,
    })
}

struct FinishedSpan {
    name: String,
    target: String,
    started_at: DateTime<Utc>,
    duration_ms: i64,
    session_id: Option<String>,
    user_id: Option<String>,
    fields: Option<String>,
}

/// Per-span state kept in the registry's extensions until the span closes.
struct OpenSpan {
    started_at: DateTime<Utc>,
    started: Instant,
    field_names: Vec<&'static str>,
    visitor: FieldVisitor,
}

/// tracing Layer that writes filtered spans to a [`SqliteSpanSink`] on close.
pub struct SqliteSpanLayer {
    sink: Arc<SqliteSpanSink>,
    filter: SpanFilter,
}

impl SqliteSpanLayer {
    pub fn new(sink: Arc<SqliteSpanSink>) -> Self {
        Self {
            sink,
            filter: SpanFilter,
        }
    }
}

impl<S> Layer<S> for SqliteSpanLayer
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = FieldVisitor::new();
        attrs.record(&mut visitor);
        let field_names = attrs.metadata().fields().iter().map(|f| f.name()).collect();
        span.extensions_mut().insert(OpenSpan {
            started_at: Utc::now(),
            started: Instant::now(),
            field_names,
            visitor,
        });
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        if let Some(open) = extensions.get_mut::<OpenSpan>() {
            values.record(&mut open.visitor);
        }
    }

    fn on_close(&self, id: span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(&id) else {
            return;
        };
        let Some(open) = span.extensions_mut().remove::<OpenSpan>() else {
            return;
        };
        let name = span.name();
        if !self.filter.should_export(name, open.field_names.iter().copied()) {
            return;
        }

        let finished = FinishedSpan {
            name: name.to_string(),
            target: span.metadata().target().to_string(),
            started_at: open.started_at,
            duration_ms: open.started.elapsed().as_millis() as i64,
            fields: open.visitor.fields_json(),
            session_id: open.visitor.session_id,
            user_id: open.visitor.user_id,
        };
        self.sink.insert(&finished);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn http_method_spans_are_excluded() {
        let filter = SpanFilter;
        assert!(!filter.should_export("POST", ["session_id"]));
        assert!(!filter.should_export("POST /chat", []));
        assert!(!filter.should_export("HTTP request", ["thread_id"]));
        assert!(!filter.should_export("/chat", []));
    }

    #[test]
    fn conversation_spans_are_exported() {
        let filter = SpanFilter;
        assert!(filter.should_export("load", ["user_id", "session_id"]));
        assert!(filter.should_export("whatever", ["conversation_id"]));
    }

    #[test]
    fn agent_named_spans_are_exported() {
        let filter = SpanFilter;
        assert!(filter.should_export("run_query", []));
        assert!(filter.should_export("Agent.run", []));
        assert!(filter.should_export("llm_invocation", []));
        assert!(!filter.should_export("request", ["method", "uri"]));
    }

    #[test]
    fn layer_exports_filtered_spans_with_ids() {
        let sink = Arc::new(SqliteSpanSink::in_memory().unwrap());
        let subscriber = tracing_subscriber::registry().with(SqliteSpanLayer::new(sink.clone()));

        tracing::subscriber::with_default(subscriber, || {
            let http = tracing::info_span!("request", method = "POST");
            let _http = http.enter();
            let span = tracing::info_span!(
                "run_query",
                user_id = "1234",
                session_id = tracing::field::Empty
            );
            span.record("session_id", "sess_987");
            drop(span.enter());
        });

        let recent = sink.recent(10).unwrap();
        assert_eq!(recent.len(), 1, "only run_query should be exported");
        assert_eq!(recent[0].name, "run_query");
        assert_eq!(recent[0].user_id.as_deref(), Some("1234"));

        let by_session = sink.for_session("sess_987").unwrap();
        assert_eq!(by_session.len(), 1);
        assert!(by_session[0].duration_ms >= 0);
    }

    #[test]
    fn late_recorded_fields_are_exported() {
        let sink = Arc::new(SqliteSpanSink::in_memory().unwrap());
        let subscriber = tracing_subscriber::registry().with(SqliteSpanLayer::new(sink.clone()));

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!(
                "agent_call",
                session_id = "sess_1",
                city = tracing::field::Empty
            );
            span.record("city", "Oslo");
        });

        let recent = sink.recent(10).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].fields.as_deref(), Some(r#"{"city":"Oslo"}"#));
    }
}
