//! Structured-output request construction, one strategy per provider.
//!
//! Each strategy turns (document, prompt, credentials) into an
//! endpoint/headers/body triple. Nothing here sends anything, and nothing in
//! the core calls into this module.
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{Error, Result};

const MISSING_KEY: &str = "<missing api key>";

pub struct RequestInput<'a> {
    pub document: &'a Value,
    pub prompt: &'a str,
    pub model: Option<&'a str>,
    pub api_key: Option<&'a str>,
    /// Name the provider shows for the schema/tool.
    pub schema_name: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestSpec {
    pub endpoint: String,
    pub headers: IndexMap<String, String>,
    pub body: Value,
}

pub trait RequestStrategy {
    fn id(&self) -> &'static str;
    fn default_model(&self) -> &'static str;
    fn build(&self, input: &RequestInput<'_>) -> RequestSpec;
}

pub struct OpenAi;
pub struct Anthropic;

impl RequestStrategy for OpenAi {
    fn id(&self) -> &'static str {
        "openai"
    }

    fn default_model(&self) -> &'static str {
        "gpt-4o-mini"
    }

    fn build(&self, input: &RequestInput<'_>) -> RequestSpec {
        let mut headers = IndexMap::new();
        headers.insert("Content-Type".into(), "application/json".into());
        headers.insert(
            "Authorization".into(),
            format!("Bearer {}", input.api_key.unwrap_or(MISSING_KEY)),
        );
        RequestSpec {
            endpoint: "https://api.openai.com/v1/chat/completions".into(),
            headers,
            body: json!({
                "model": input.model.unwrap_or(self.default_model()),
                "messages": [{ "role": "user", "content": input.prompt }],
                "response_format": {
                    "type": "json_schema",
                    "json_schema": {
                        "name": schema_identifier(input.schema_name),
                        "strict": true,
                        "schema": input.document,
                    }
                }
            }),
        }
    }
}

impl RequestStrategy for Anthropic {
    fn id(&self) -> &'static str {
        "anthropic"
    }

    fn default_model(&self) -> &'static str {
        "claude-3-5-sonnet-latest"
    }

    /// A single tool whose input is the document, forced via `tool_choice`.
    fn build(&self, input: &RequestInput<'_>) -> RequestSpec {
        let tool = schema_identifier(input.schema_name);
        let mut headers = IndexMap::new();
        headers.insert("content-type".into(), "application/json".into());
        headers.insert("x-api-key".into(), input.api_key.unwrap_or(MISSING_KEY).into());
        headers.insert("anthropic-version".into(), "2023-06-01".into());
        RequestSpec {
            endpoint: "https://api.anthropic.com/v1/messages".into(),
            headers,
            body: json!({
                "model": input.model.unwrap_or(self.default_model()),
                "max_tokens": 4096,
                "messages": [{ "role": "user", "content": input.prompt }],
                "tools": [{
                    "name": tool,
                    "description": "Record the extracted data.",
                    "input_schema": input.document,
                }],
                "tool_choice": { "type": "tool", "name": tool },
            }),
        }
    }
}

pub const PROVIDERS: [&str; 2] = ["openai", "anthropic"];

pub fn strategy_for(id: &str) -> Result<Box<dyn RequestStrategy>> {
    match id.to_ascii_lowercase().as_str() {
        "openai" => Ok(Box::new(OpenAi)),
        "anthropic" => Ok(Box::new(Anthropic)),
        _ => Err(Error::UnknownProvider(id.to_string())),
    }
}

/// Providers accept `[A-Za-z0-9_-]` names only.
fn schema_identifier(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() { "schema".to_string() } else { cleaned }
}
