//! Prompt construction and response parsing for route enrichment

use crate::llm::{EnrichmentRequest, ProviderError};
use crate::models::RouteRecord;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt::Write as _;

/// Bumped whenever the prompt text or response format changes; part of every cache key
pub const PROMPT_VERSION: &str = "routesage-prompt-v1";

/// Docstrings longer than this are truncated in the prompt
const MAX_DOCSTRING_CHARS: usize = 2000;

pub const SYSTEM_PROMPT: &str = "You are an expert API technical writer documenting FastAPI endpoints.\n\
     Given one endpoint's method, path, parameters and existing docstring, write a concise,\n\
     accurate description for API consumers and choose a few short lowercase tags that\n\
     group the endpoint by resource or purpose.\n\
     Respond with ONLY a JSON object of the form:\n\
     {\"description\": \"...\", \"tags\": [\"...\"]}\n\
     Do not include explanations or any other text.";

/// Build the request for one route
pub fn build_request(route: &RouteRecord) -> EnrichmentRequest {
    EnrichmentRequest {
        method: route.method,
        path: route.path.clone(),
        system_prompt: SYSTEM_PROMPT.to_string(),
        user_prompt: build_user_prompt(route),
    }
}

fn build_user_prompt(route: &RouteRecord) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Method: {}", route.method);
    let _ = writeln!(prompt, "Path: {}", route.path);
    if !route.handler.is_empty() {
        let _ = writeln!(prompt, "Handler: {}", route.handler);
    }
    if route.deprecated {
        let _ = writeln!(prompt, "Deprecated: yes");
    }

    if route.parameters.is_empty() {
        let _ = writeln!(prompt, "Parameters: none");
    } else {
        let _ = writeln!(prompt, "Parameters:");
        for param in &route.parameters {
            let _ = write!(
                prompt,
                "- {} ({}, {}",
                param.name,
                param.kind,
                if param.required { "required" } else { "optional" }
            );
            if let Some(annotation) = &param.annotation {
                let _ = write!(prompt, ", type {}", annotation);
            }
            prompt.push(')');
            if let Some(description) = &param.description {
                let _ = write!(prompt, ": {}", description);
            }
            prompt.push('\n');
        }
    }

    match route.existing_doc.as_deref().map(str::trim) {
        Some(doc) if !doc.is_empty() => {
            let _ = writeln!(prompt, "Existing docstring:\n{}", truncate_chars(doc));
        }
        _ => {
            let _ = writeln!(prompt, "Existing docstring: none");
        }
    }
    prompt
}

fn truncate_chars(text: &str) -> String {
    if text.chars().count() <= MAX_DOCSTRING_CHARS {
        return text.to_string();
    }
    let truncated: String = text.chars().take(MAX_DOCSTRING_CHARS).collect();
    format!("{}... [truncated]", truncated)
}

/// Description and tags parsed from a provider response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrichment {
    pub description: String,
    pub tags: BTreeSet<String>,
}

/// Parse a raw provider response
///
/// Accepts `{"description": ..., "tags": [...]}` (tags may also be one
/// comma-separated string), optionally inside a Markdown code fence. Anything else is
/// taken verbatim as the description with no tags.
///
/// # Errors
///
/// `InvalidResponse` when the response, or its description, is empty.
pub fn parse_response(raw: &str) -> Result<Enrichment, ProviderError> {
    let text = strip_code_fence(raw.trim());
    if text.is_empty() {
        return Err(ProviderError::InvalidResponse(
            "provider returned an empty response".to_string(),
        ));
    }

    if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(text) {
        if let Some(Value::String(description)) = object.get("description") {
            let description = description.trim();
            if description.is_empty() {
                return Err(ProviderError::InvalidResponse(
                    "response has an empty description".to_string(),
                ));
            }
            return Ok(Enrichment {
                description: description.to_string(),
                tags: object.get("tags").map(parse_tags).unwrap_or_default(),
            });
        }
    }

    Ok(Enrichment {
        description: text.to_string(),
        tags: BTreeSet::new(),
    })
}

fn parse_tags(value: &Value) -> BTreeSet<String> {
    let raw: Vec<&str> = match value {
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        Value::String(joined) => joined.split(',').collect(),
        _ => Vec::new(),
    };
    raw.into_iter()
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Remove a surrounding ```` ``` ```` or ```` ```json ```` fence
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string on the opening line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HttpMethod, ParameterInfo, ParameterKind};

    fn user_route() -> RouteRecord {
        let mut route = RouteRecord::new(HttpMethod::Get, "/users/{id}");
        route.handler = "get_user".to_string();
        let mut id = ParameterInfo::new("id", ParameterKind::Path, true);
        id.annotation = Some("int".to_string());
        let mut verbose = ParameterInfo::new("verbose", ParameterKind::Query, false);
        verbose.description = Some("Include audit fields".to_string());
        route.parameters = vec![id, verbose];
        route
    }

    #[test]
    fn test_user_prompt_lists_route_shape() {
        let request = build_request(&user_route());
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.path, "/users/{id}");
        assert_eq!(request.system_prompt, SYSTEM_PROMPT);

        let prompt = &request.user_prompt;
        assert!(prompt.contains("Method: GET"));
        assert!(prompt.contains("Path: /users/{id}"));
        assert!(prompt.contains("- id (path, required, type int)"));
        assert!(prompt.contains("- verbose (query, optional): Include audit fields"));
        assert!(prompt.contains("Existing docstring: none"));
    }

    #[test]
    fn test_user_prompt_includes_docstring() {
        let mut route = RouteRecord::new(HttpMethod::Post, "/items/");
        route.existing_doc = Some("Create item".to_string());
        let prompt = build_request(&route).user_prompt;
        assert!(prompt.contains("Parameters: none"));
        assert!(prompt.contains("Existing docstring:\nCreate item"));
    }

    #[test]
    fn test_long_docstring_is_truncated() {
        let mut route = RouteRecord::new(HttpMethod::Get, "/");
        route.existing_doc = Some("é".repeat(MAX_DOCSTRING_CHARS + 10));
        let prompt = build_request(&route).user_prompt;
        assert!(prompt.contains("... [truncated]"));
    }

    #[test]
    fn test_parse_json_response() {
        let parsed =
            parse_response(r#"{"description": "Fetch one user.", "tags": ["users", " read "]}"#)
                .unwrap();
        assert_eq!(parsed.description, "Fetch one user.");
        assert_eq!(
            parsed.tags.into_iter().collect::<Vec<_>>(),
            vec!["read".to_string(), "users".to_string()]
        );
    }

    #[test]
    fn test_parse_fenced_json_with_comma_tags() {
        let raw = "```json\n{\"description\": \"Create an item\", \"tags\": \"items, write,\"}\n```";
        let parsed = parse_response(raw).unwrap();
        assert_eq!(parsed.description, "Create an item");
        assert_eq!(parsed.tags.len(), 2);
        assert!(parsed.tags.contains("write"));
    }

    #[test]
    fn test_plain_text_becomes_description() {
        let parsed = parse_response("  desc-for-/users/{id}\n").unwrap();
        assert_eq!(parsed.description, "desc-for-/users/{id}");
        assert!(parsed.tags.is_empty());
    }

    #[test]
    fn test_json_without_description_is_plain_text() {
        let parsed = parse_response(r#"{"summary": "x"}"#).unwrap();
        assert_eq!(parsed.description, r#"{"summary": "x"}"#);
    }

    #[test]
    fn test_empty_response_is_invalid() {
        for raw in ["", "   \n", "```\n```", r#"{"description": "  "}"#] {
            let err = parse_response(raw).unwrap_err();
            assert!(
                matches!(err, ProviderError::InvalidResponse(_)),
                "raw {:?}",
                raw
            );
            assert!(!err.is_retryable());
        }
    }
}
