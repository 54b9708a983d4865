// src/extractors/fallback.rs
//! Last-resort extraction through a language model.

use crate::extractors::fixed_width::table_blocks;
use crate::extractors::row::RawRow;
use crate::utils::error::FallbackError;
use async_trait::async_trait;
use serde::Deserialize;

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const SYSTEM_PROMPT: &str = "\
You convert raw text tables from SEC Form 13F filings into structured rows.
Return one object per holding with these string fields: name_of_issuer,
title_of_class, cusip, figi, value, shares_or_percent_amount,
shares_or_percent_type, put_call, investment_discretion, other_manager,
voting_authority_sole, voting_authority_shared, voting_authority_none.
Numeric fields (value, shares_or_percent_amount and the three voting
authority fields) contain only digits and optional thousands commas; use \"0\"
when the cell is missing or not a number. Text fields are copied as written
with surrounding whitespace removed; use \"\" when missing or N/A. figi is
always \"\". Do not invent rows or values that are not in the table.";

/// A black-box extractor that turns a text block into rows.
///
/// Implementations may be slow and non-deterministic. The cascade calls it at
/// most once per filing and treats any error as "no rows".
#[async_trait]
pub trait ModelFallback: Send + Sync {
    async fn extract_rows(&self, block: &str) -> Result<Vec<RawRow>, FallbackError>;
}

/// Used when no model is configured.
pub struct NoFallback;

#[async_trait]
impl ModelFallback for NoFallback {
    async fn extract_rows(&self, _block: &str) -> Result<Vec<RawRow>, FallbackError> {
        Ok(Vec::new())
    }
}

/// Selects the text worth sending to the model.
///
/// Every table block that mentions both "issuer" and "cusip", joined; or the
/// whole document when it has no table blocks but mentions both. `None`
/// means there is nothing to send.
pub fn fallback_scope(text: &str) -> Option<String> {
    let mentions_both = |s: &str| {
        let lower = s.to_lowercase();
        lower.contains("issuer") && lower.contains("cusip")
    };

    let blocks = table_blocks(text);
    if blocks.is_empty() {
        return mentions_both(text).then(|| text.to_string());
    }

    let scoped: Vec<&str> = blocks.into_iter().filter(|b| mentions_both(b)).collect();
    if scoped.is_empty() {
        None
    } else {
        Some(scoped.join("\n"))
    }
}

/// Chat-completions client asking for `{"result": [rows]}` under a strict JSON schema.
#[derive(Clone)]
pub struct OpenAiFallback {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiFallback {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Reads `OPENAI_API_KEY` and, optionally, `OPENAI_MODEL` and `OPENAI_BASE_URL`.
    pub fn from_env() -> Result<Self, FallbackError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| FallbackError::Config("OPENAI_API_KEY not set".to_string()))?;
        let mut fallback = Self::new(api_key);
        if let Some(model) = non_empty_env("OPENAI_MODEL") {
            fallback = fallback.with_model(model);
        }
        if let Some(url) = non_empty_env("OPENAI_BASE_URL") {
            fallback = fallback.with_base_url(url);
        }
        Ok(fallback)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct TableResponse {
    #[serde(default)]
    result: Vec<RawRow>,
}

const ROW_FIELDS: [&str; 13] = [
    "name_of_issuer",
    "title_of_class",
    "cusip",
    "figi",
    "value",
    "shares_or_percent_amount",
    "shares_or_percent_type",
    "put_call",
    "investment_discretion",
    "other_manager",
    "voting_authority_sole",
    "voting_authority_shared",
    "voting_authority_none",
];

fn response_schema() -> serde_json::Value {
    let properties: serde_json::Map<String, serde_json::Value> = ROW_FIELDS
        .iter()
        .map(|f| (f.to_string(), serde_json::json!({ "type": "string" })))
        .collect();

    serde_json::json!({
        "type": "object",
        "properties": {
            "result": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": properties,
                    "required": ROW_FIELDS,
                    "additionalProperties": false
                }
            }
        },
        "required": ["result"],
        "additionalProperties": false
    })
}

/// Decodes the assistant message content into rows.
pub fn parse_model_output(content: &str) -> Result<Vec<RawRow>, FallbackError> {
    let table: TableResponse = serde_json::from_str(content.trim())?;
    Ok(table.result)
}

#[async_trait]
impl ModelFallback for OpenAiFallback {
    async fn extract_rows(&self, block: &str) -> Result<Vec<RawRow>, FallbackError> {
        let request = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": format!("Parse this text table into rows.\nTable text:\n{}", block) }
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "info_table_rows",
                    "strict": true,
                    "schema": response_schema()
                }
            }
        });

        tracing::info!("Sending {} bytes to model {} for table extraction", block.len(), self.model);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FallbackError::Api(format!("{}: {}", status, body)));
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| FallbackError::Api("response had no choices".to_string()))?;

        let rows = parse_model_output(&content)?;
        tracing::info!("Model returned {} rows", rows.len());
        Ok(rows)
    }
}
