//! Process configuration, read once from the environment at startup.
//!
//! Every value has a compiled default. A variable that is set but does not
//! parse, or is out of range, is a startup error.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, SettingsError>;

pub const DEFAULT_COLLECTION: &str = "Weather-Chat";
pub const DEFAULT_APP_NAME: &str = "test_adk_app";
pub const DEFAULT_MAX_HISTORY_MESSAGES: usize = 20;
pub const DEFAULT_MAX_HISTORY_CHARS: usize = 8000;

/// Bounds applied to the history served to the agent, plus where it lives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySettings {
    pub collection: String,
    pub max_messages: usize,
    pub max_chars: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            max_messages: DEFAULT_MAX_HISTORY_MESSAGES,
            max_chars: DEFAULT_MAX_HISTORY_CHARS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    Sqlite,
    Memory,
}

impl std::str::FromStr for StorageKind {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown storage backend: {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    pub kind: StorageKind,
    pub database_path: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            kind: StorageKind::Sqlite,
            database_path: nimbus_dir().join("database").join("history.db"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Base URL of the agent service. `None` runs the offline echo agent.
    pub url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceSettings {
    pub enabled: bool,
    pub db_path: PathBuf,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: nimbus_dir().join("database").join("traces.db"),
        }
    }
}

/// Immutable process configuration. Built once and passed into constructors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub app_name: String,
    pub history: HistorySettings,
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub agent: AgentSettings,
    pub trace: TraceSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            history: HistorySettings::default(),
            server: ServerSettings::default(),
            storage: StorageSettings::default(),
            agent: AgentSettings::default(),
            trace: TraceSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut settings = Self::default();

        // ── History ─────────────────────────────────────────────────────
        if let Some(v) = read("DB_COLLECTION") {
            settings.history.collection = v;
        }
        if let Some(v) = read("MAX_HISTORY_MESSAGES") {
            settings.history.max_messages =
                require(parse_usize_range(&v, 1, 100_000), "MAX_HISTORY_MESSAGES", &v, "integer >= 1")?;
        }
        if let Some(v) = read("MAX_HISTORY_CHARS") {
            settings.history.max_chars =
                require(parse_usize_range(&v, 1, 10_000_000), "MAX_HISTORY_CHARS", &v, "integer >= 1")?;
        }
        if let Some(v) = read("APP_NAME") {
            settings.app_name = v;
        }

        // ── Server ──────────────────────────────────────────────────────
        if let Some(v) = read("NIMBUS_HOST") {
            settings.server.host = v;
        }
        if let Some(v) = read("PORT") {
            settings.server.port = require(parse_u16(&v), "PORT", &v, "port number 0-65535")?;
        }

        // ── Storage ─────────────────────────────────────────────────────
        if let Some(v) = read("NIMBUS_STORAGE") {
            settings.storage.kind = v.parse().map_err(|reason| SettingsError::InvalidValue {
                key: "NIMBUS_STORAGE",
                value: v.clone(),
                reason,
            })?;
        }
        if let Some(v) = read("NIMBUS_DATABASE_PATH") {
            settings.storage.database_path = PathBuf::from(v);
        }

        // ── Agent ───────────────────────────────────────────────────────
        if let Some(v) = read("AGENT_URL") {
            settings.agent.url =
                Some(require(parse_http_url(&v), "AGENT_URL", &v, "expected http:// or https:// URL")?);
        }
        if let Some(v) = read("AGENT_TIMEOUT_SECS") {
            settings.agent.timeout_secs =
                require(parse_u64_range(&v, 1, 600), "AGENT_TIMEOUT_SECS", &v, "seconds 1-600")?;
        }

        // ── Tracing ─────────────────────────────────────────────────────
        if let Some(v) = read("NIMBUS_TRACE_ENABLED") {
            settings.trace.enabled = require(parse_bool(&v), "NIMBUS_TRACE_ENABLED", &v, "boolean")?;
        }
        if let Some(v) = read("NIMBUS_TRACE_DB_PATH") {
            settings.trace.db_path = PathBuf::from(v);
        }

        settings.validate()?;
        debug!(
            collection = %settings.history.collection,
            max_messages = settings.history.max_messages,
            max_chars = settings.history.max_chars,
            "settings loaded"
        );
        Ok(settings)
    }

    /// Check invariants that hold regardless of where values came from.
    pub fn validate(&self) -> Result<()> {
        if self.history.collection.trim().is_empty() {
            return Err(invalid("DB_COLLECTION", &self.history.collection, "must not be empty"));
        }
        if self.app_name.trim().is_empty() {
            return Err(invalid("APP_NAME", &self.app_name, "must not be empty"));
        }
        if self.history.max_messages == 0 {
            return Err(invalid("MAX_HISTORY_MESSAGES", "0", "must be positive"));
        }
        if self.history.max_chars == 0 {
            return Err(invalid("MAX_HISTORY_CHARS", "0", "must be positive"));
        }
        Ok(())
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn parse_u16(val: &str) -> Option<u16> {
    val.trim().parse().ok()
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Accept an http(s) base URL, dropping any trailing slash.
pub fn parse_http_url(val: &str) -> Option<String> {
    let val = val.trim();
    let rest = val
        .strip_prefix("http://")
        .or_else(|| val.strip_prefix("https://"))?;
    if rest.is_empty() {
        return None;
    }
    Some(val.trim_end_matches('/').to_string())
}

fn require<T>(parsed: Option<T>, key: &'static str, value: &str, reason: &str) -> Result<T> {
    parsed.ok_or_else(|| invalid(key, value, reason))
}

fn invalid(key: &'static str, value: &str, reason: &str) -> SettingsError {
    SettingsError::InvalidValue {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// `~/.nimbus`, falling back to `/tmp/.nimbus` when HOME is unset.
pub fn nimbus_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
        .join(".nimbus")
}
