/// SQL DDL for the nimbus-store database.
/// WAL mode enabled at connection time.
pub const SCHEMA_VERSION: u32 = 1;

/// One row per conversation document. `messages` holds the JSON array of
/// messages; the other columns are the denormalized summary fields.
pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS conversations (
    collection TEXT NOT NULL,
    user_id TEXT NOT NULL,
    session_id TEXT NOT NULL,
    messages TEXT NOT NULL,
    last_message_text TEXT NOT NULL,
    last_message_sender TEXT,
    message_count INTEGER NOT NULL,
    last_message_at TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    PRIMARY KEY (collection, user_id, session_id)
);

CREATE INDEX IF NOT EXISTS idx_conversations_user ON conversations(collection, user_id);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;
