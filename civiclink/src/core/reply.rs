//! Parsing of structured model replies.
//!
//! Replies are JSON documents constrained by a JSON Schema (Draft 2020-12).
//! Models occasionally wrap them in a markdown code fence, which is stripped
//! before validation.

use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use jsonschema::Draft;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^```[A-Za-z0-9_-]*\s*\n(.*?)\n?```$").expect("fence pattern is valid")
});

/// Remove a surrounding markdown code fence, if any.
pub fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    match FENCE_RE.captures(trimmed).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}

/// Validate a JSON instance against a schema.
pub fn validate_schema(instance: &Value, schema: &Value) -> Result<()> {
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .context("compile json schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}

/// Parse a model reply as `T` after checking it against `schema`.
pub fn parse_reply<T: DeserializeOwned>(schema: &str, reply: &str) -> Result<T> {
    let body = strip_code_fence(reply);
    if body.is_empty() {
        bail!("model reply is empty");
    }
    let schema: Value = serde_json::from_str(schema).context("parse output schema")?;
    let instance: Value = serde_json::from_str(body).context("parse model reply as json")?;
    validate_schema(&instance, &schema)?;
    serde_json::from_value(instance).context("deserialize model reply")
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    const SCHEMA: &str = r#"{
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "properties": { "name": { "type": "string" } },
        "required": ["name"],
        "additionalProperties": false
    }"#;

    #[derive(Debug, Deserialize)]
    struct Named {
        name: String,
    }

    #[test]
    fn parses_plain_json() {
        let named: Named = parse_reply(SCHEMA, r#"{"name":"civic"}"#).expect("parse");
        assert_eq!(named.name, "civic");
    }

    #[test]
    fn strips_code_fence() {
        let reply = "```json\n{\"name\":\"civic\"}\n```";
        let named: Named = parse_reply(SCHEMA, reply).expect("parse");
        assert_eq!(named.name, "civic");
    }

    #[test]
    fn rejects_schema_violations() {
        let err = parse_reply::<Named>(SCHEMA, r#"{"name":"civic","extra":1}"#).unwrap_err();
        assert!(err.to_string().contains("schema validation failed"));
    }

    #[test]
    fn rejects_empty_reply() {
        let err = parse_reply::<Named>(SCHEMA, "  ").unwrap_err();
        assert!(err.to_string().contains("empty"));
    }
}
