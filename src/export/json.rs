//! JSON exporter

use crate::error::AppResult;
use crate::models::ApiDocumentation;
use chrono::{DateTime, Local};
use serde_json::Value;

/// Pretty-printed documentation with a `generated_at` RFC 3339 timestamp
pub fn render(doc: &ApiDocumentation, generated_at: DateTime<Local>) -> AppResult<String> {
    let mut value = serde_json::to_value(doc)?;
    if let Value::Object(object) = &mut value {
        object.insert(
            "generated_at".to_string(),
            Value::String(generated_at.to_rfc3339()),
        );
    }
    let mut rendered = serde_json::to_string_pretty(&value)?;
    rendered.push('\n');
    Ok(rendered)
}
