//! Anthropic Claude event analyst.
//!
//! Implements `EventAnalyst` over the Anthropic Messages API: prompt
//! construction, retry with exponential backoff on rate limits and server
//! errors, and extraction of the JSON analysis object from the reply.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::EventAnalyst;
use crate::config::AnalystConfig;
use crate::types::{EconomicEvent, EventAnalysis, SniperError};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Maximum retries on rate limit / server errors.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (ms).
const BASE_BACKOFF_MS: u64 = 1000;

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct AnthropicAnalyst {
    http: Client,
    api_url: String,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
}

impl AnthropicAnalyst {
    pub fn new(api_key: SecretString, model: Option<String>, max_tokens: Option<u32>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to build Anthropic HTTP client")?;

        Ok(Self {
            http,
            api_url: ANTHROPIC_API_URL.to_string(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        })
    }

    /// Build from config. Returns `None` when no API key is set.
    pub fn from_config(cfg: &AnalystConfig) -> Result<Option<Self>> {
        let Some(key) = cfg.api_key() else {
            warn!(env = %cfg.api_key_env, "No analyst API key set, event analysis disabled");
            return Ok(None);
        };
        Self::new(key, Some(cfg.model.clone()), Some(cfg.max_tokens)).map(Some)
    }

    /// Point the client at a different Messages endpoint.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Send a messages request with retry + backoff.
    async fn call_api(&self, system: &str, user_message: &str) -> Result<String> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user".to_string(),
                content: user_message.to_string(),
            }],
            system: Some(system.to_string()),
        };

        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = BASE_BACKOFF_MS * 2u64.pow(attempt - 1);
                debug!(attempt, delay_ms = delay, "Retrying Anthropic API call");
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            let resp = self
                .http
                .post(&self.api_url)
                .header("x-api-key", self.api_key.expose_secret())
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body: MessagesResponse =
                            response.json().await.context("Failed to parse Anthropic response")?;

                        let text = body
                            .content
                            .iter()
                            .filter_map(|b| b.text.as_deref())
                            .collect::<Vec<_>>()
                            .join("");

                        if let Some(usage) = body.usage {
                            debug!(
                                input_tokens = usage.input_tokens,
                                output_tokens = usage.output_tokens,
                                "Anthropic usage"
                            );
                        }

                        return Ok(text);
                    }

                    // Retryable errors: 429 (rate limit), 500+, 529 (overloaded)
                    if status.as_u16() == 429 || status.is_server_error() {
                        let error_text = response.text().await.unwrap_or_default();
                        warn!(status = %status, attempt, error = %error_text, "Retryable Anthropic API error");
                        last_error = Some(format!("HTTP {status}: {error_text}"));
                        continue;
                    }

                    let error_text = response.text().await.unwrap_or_default();
                    anyhow::bail!("Anthropic API error {status}: {error_text}");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Anthropic request failed");
                    last_error = Some(format!("Request error: {e}"));
                    continue;
                }
            }
        }

        anyhow::bail!(
            "Anthropic API failed after {} retries: {}",
            MAX_RETRIES,
            last_error.unwrap_or_default()
        )
    }

    pub fn system_prompt() -> &'static str {
        "You are a Forex market analyst who trades with Smart Money Concepts. \
         You explain scheduled economic releases to traders concisely.\n\n\
         Reply with a single JSON object and nothing else, with exactly these keys:\n\
         - \"explanation\": what the indicator measures and why it matters.\n\
         - \"bullishImpact\": a better-than-expected result (e.g. above forecast) and why it is bullish for the currency.\n\
         - \"bearishImpact\": a worse-than-expected result (e.g. below forecast) and why it is bearish for the currency.\n\
         - \"volatilityRating\": one of \"High\", \"Very High\" or \"Extreme\"."
    }

    pub fn build_prompt(event: &EconomicEvent) -> String {
        let na = "n/a";
        format!(
            "Event Name: {}\nCurrency: {}\nImpact: {}\nScheduled: {}\nForecast: {}\nPrevious: {}\n",
            event.name,
            event.currency,
            event.impact,
            event.date.format("%Y-%m-%d %H:%M UTC"),
            event.forecast.as_deref().unwrap_or(na),
            event.previous.as_deref().unwrap_or(na),
        )
    }

    /// Pull the first `{ ... }` object out of the reply (models sometimes
    /// wrap it in a code fence or prose) and decode it.
    pub fn parse_analysis(text: &str) -> Result<EventAnalysis> {
        let start = text.find('{');
        let end = text.rfind('}');
        let json = match (start, end) {
            (Some(s), Some(e)) if e > s => &text[s..=e],
            _ => return Err(SniperError::Analyst("no JSON object in model reply".into()).into()),
        };
        serde_json::from_str(json)
            .map_err(|e| SniperError::Analyst(format!("malformed analysis JSON: {e}")).into())
    }
}

#[async_trait]
impl EventAnalyst for AnthropicAnalyst {
    async fn analyze(&self, event: &EconomicEvent) -> Result<EventAnalysis> {
        debug!(event_id = %event.id, model = %self.model, "Requesting event analysis");

        let text = self
            .call_api(Self::system_prompt(), &Self::build_prompt(event))
            .await
            .context("Anthropic API call failed")?;

        let analysis = Self::parse_analysis(&text)?;
        info!(
            event_id = %event.id,
            name = %event.name,
            volatility = ?analysis.volatility_rating,
            "Event analysis complete"
        );
        Ok(analysis)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ImpactLevel, VolatilityRating};
    use axum::{routing::post, Json, Router};
    use chrono::{TimeZone, Utc};

    fn event() -> EconomicEvent {
        EconomicEvent {
            id: "event-0-0".into(),
            date: Utc.with_ymd_and_hms(2026, 3, 6, 13, 30, 0).unwrap(),
            currency: "USD".into(),
            impact: ImpactLevel::High,
            name: "Non-Farm Payrolls".into(),
            forecast: Some("2.1%".into()),
            previous: None,
            actual: None,
            analysis: None,
            external_links: Vec::new(),
        }
    }

    const REPLY: &str = r#"{"explanation":"Jobs added.","bullishImpact":"Beat lifts USD.","bearishImpact":"Miss weighs on USD.","volatilityRating":"Extreme"}"#;

    #[test]
    fn test_parse_plain_json() {
        let a = AnthropicAnalyst::parse_analysis(REPLY).unwrap();
        assert_eq!(a.volatility_rating, VolatilityRating::Extreme);
        assert_eq!(a.bullish_impact, "Beat lifts USD.");
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = format!("Here you go:\n```json\n{REPLY}\n```");
        assert!(AnthropicAnalyst::parse_analysis(&text).is_ok());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(AnthropicAnalyst::parse_analysis("no idea").is_err());
        assert!(AnthropicAnalyst::parse_analysis(r#"{"explanation":"x"}"#).is_err());
        let bad_rating = REPLY.replace("Extreme", "Mild");
        assert!(AnthropicAnalyst::parse_analysis(&bad_rating).is_err());
    }

    #[test]
    fn test_prompt_mentions_event() {
        let prompt = AnthropicAnalyst::build_prompt(&event());
        assert!(prompt.contains("Non-Farm Payrolls"));
        assert!(prompt.contains("Forecast: 2.1%"));
        assert!(prompt.contains("Previous: n/a"));
    }

    async fn spawn_messages_api(status: axum::http::StatusCode, body: serde_json::Value) -> String {
        let app = Router::new().route(
            "/v1/messages",
            post(move || {
                let body = body.clone();
                async move { (status, Json(body)) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/v1/messages")
    }

    fn client(url: String) -> AnthropicAnalyst {
        AnthropicAnalyst::new(SecretString::new("test-key".into()), None, None)
            .unwrap()
            .with_api_url(url)
    }

    #[tokio::test]
    async fn test_analyze_against_stub() {
        let url = spawn_messages_api(
            axum::http::StatusCode::OK,
            serde_json::json!({
                "content": [{"type": "text", "text": REPLY}],
                "usage": {"input_tokens": 120, "output_tokens": 80}
            }),
        )
        .await;

        let analyst = client(url);
        assert_eq!(analyst.model_name(), DEFAULT_MODEL);
        let analysis = analyst.analyze(&event()).await.unwrap();
        assert_eq!(analysis.explanation, "Jobs added.");
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let url = spawn_messages_api(
            axum::http::StatusCode::BAD_REQUEST,
            serde_json::json!({"error": {"type": "invalid_request_error", "message": "bad"}}),
        )
        .await;

        let err = client(url).analyze(&event()).await.unwrap_err();
        assert!(format!("{err:#}").contains("400"));
    }
}
