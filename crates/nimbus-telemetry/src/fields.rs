use tracing::field::{Field, Visit};

/// Visitor that splits tracing fields into the message, the correlation ids
/// we index on, and everything else as JSON.
pub(crate) struct FieldVisitor {
    pub message: Option<String>,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl FieldVisitor {
    pub fn new() -> Self {
        Self {
            message: None,
            session_id: None,
            user_id: None,
            fields: serde_json::Map::new(),
        }
    }

    fn put(&mut self, name: &str, value: String, json: serde_json::Value) {
        match name {
            "message" => self.message = Some(value),
            "session_id" => self.session_id = Some(value),
            "user_id" => self.user_id = Some(value),
            other => {
                self.fields.insert(other.to_string(), json);
            }
        }
    }

    pub fn fields_json(&self) -> Option<String> {
        if self.fields.is_empty() {
            None
        } else {
            serde_json::to_string(&self.fields).ok()
        }
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let val = format!("{value:?}").trim_matches('"').to_string();
        self.put(field.name(), val.clone(), serde_json::Value::String(val));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(
            field.name(),
            value.to_string(),
            serde_json::Value::String(value.to_string()),
        );
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field.name(), value.to_string(), value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field.name(), value.to_string(), value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.put(field.name(), value.to_string(), serde_json::Value::Number(n));
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field.name(), value.to_string(), value.into());
    }
}

/// Correlation ids stored on a span so child events can inherit them.
#[derive(Clone, Debug, Default)]
pub(crate) struct SpanCorrelation {
    pub session_id: Option<String>,
    pub user_id: Option<String>,
}
