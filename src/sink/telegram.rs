//! Telegram Bot API sink.
//!
//! Sends a MarkdownV2 signal (price levels, sizing, confluence steps)
//! through `sendMessage`. Credentials come from the environment; without
//! them every delivery fails fast.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::MessagingSink;
use crate::config::TelegramConfig;
use crate::strategy::risk::{confidence_pct, RiskPlan};
use crate::types::{format_price, Bias, Opportunity, SymbolKind};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Characters MarkdownV2 reserves outside entities.
const MARKDOWN_V2_RESERVED: &[char] = &[
    '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

pub struct TelegramSink {
    http: Client,
    api_base: String,
    bot_token: Option<SecretString>,
    chat_id: Option<String>,
}

impl TelegramSink {
    pub fn new(api_base: impl Into<String>, bot_token: Option<SecretString>, chat_id: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build Telegram HTTP client")?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bot_token,
            chat_id,
        })
    }

    pub fn from_config(cfg: &TelegramConfig) -> Result<Self> {
        let sink = Self::new(cfg.api_base.clone(), cfg.bot_token(), cfg.chat_id())?;
        if !sink.is_enabled() {
            warn!(
                token_env = %cfg.bot_token_env,
                chat_env = %cfg.chat_id_env,
                "Telegram credentials not set, signal delivery disabled"
            );
        }
        Ok(sink)
    }

    pub fn is_enabled(&self) -> bool {
        self.bot_token.is_some() && self.chat_id.is_some()
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        let (Some(token), Some(chat_id)) = (&self.bot_token, &self.chat_id) else {
            anyhow::bail!("Telegram bot token or chat id is not configured");
        };

        let url = format!("{}/bot{}/sendMessage", self.api_base, token.expose_secret());
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "MarkdownV2",
        };

        let resp = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Telegram request failed")?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("Telegram API returned {status}: {body}");
        }

        let parsed: ApiResponse = serde_json::from_str(&body).context("Malformed Telegram response")?;
        if !parsed.ok {
            anyhow::bail!(
                "Telegram rejected the message: {}",
                parsed.description.unwrap_or_else(|| "no description".into())
            );
        }
        Ok(())
    }
}

#[async_trait]
impl MessagingSink for TelegramSink {
    async fn deliver(&self, opportunity: &Opportunity, balance: f64, risk_pct: f64) -> bool {
        if !self.is_enabled() {
            error!(pair = %opportunity.pair, "Telegram bot token or chat id is not configured");
            return false;
        }

        let text = format_signal(opportunity, balance, risk_pct);
        debug!(id = %opportunity.id, chars = text.len(), "Sending Telegram signal");

        match self.send_text(&text).await {
            Ok(()) => {
                info!(id = %opportunity.id, pair = %opportunity.pair, "Telegram signal delivered");
                true
            }
            Err(e) => {
                error!(id = %opportunity.id, pair = %opportunity.pair, error = %format!("{e:#}"), "Telegram delivery failed");
                false
            }
        }
    }

    fn name(&self) -> &str {
        "telegram"
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Backslash-escape every MarkdownV2 reserved character.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        if MARKDOWN_V2_RESERVED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn concept_emoji(concept: &str, bias: Bias) -> &'static str {
    if concept.contains("MSS") {
        if bias.is_bullish() { "📈" } else { "📉" }
    } else if concept.contains("Liquidity") {
        "💧"
    } else if concept.contains("POI") {
        "📚"
    } else if concept.contains("FVG") || concept.contains("OB") {
        "🎯"
    } else if concept.contains("IDM") {
        "👀"
    } else if concept.contains("OTE") {
        "✅"
    } else if concept.contains("Displacement") {
        "💥"
    } else {
        "🔹"
    }
}

/// Build the MarkdownV2 signal text. Sizing uses the flat $10-per-pip
/// assumption.
pub fn format_signal(opp: &Opportunity, balance: f64, risk_pct: f64) -> String {
    let e = escape_markdown;
    let plan = RiskPlan::flat(opp, balance, risk_pct);
    let setup = opp.setup_findings();
    let confluences = setup.len();
    let direction_icon = if opp.bias.is_bullish() { "📈" } else { "📉" };

    let mut msg = String::with_capacity(1024);
    msg.push_str("*🎯 SMC SNIPER SIGNAL DETECTED*\n\n");

    if SymbolKind::of(&opp.pair) != SymbolKind::Forex {
        msg.push_str("⚡️ *High Volatility Instrument*\n\n");
    }

    msg.push_str(&format!("📊 Pair: *{}*\n", e(&opp.pair)));
    msg.push_str(&format!("{direction_icon} Direction: *{}*\n", e(opp.bias.direction())));
    msg.push_str(&format!("⏰ Timeframe: *{}*\n\n", e(opp.setup_timeframe.short_label())));

    msg.push_str("*PRICE LEVELS:*\n");
    msg.push_str(&format!("Entry: `{}`\n", e(&format_price(&opp.pair, opp.entry_price))));
    msg.push_str(&format!("Stop Loss: `{}`\n", e(&format_price(&opp.pair, opp.stop_loss))));
    msg.push_str(&format!("Take Profit: `{}`\n", e(&format_price(&opp.pair, opp.take_profit))));
    msg.push_str(&format!("Risk/Reward: *{}*\n\n", e(&plan.ratio_label())));

    msg.push_str("*💼 RISK MANAGEMENT:*\n");
    msg.push_str(&format!("Suggested Volume: `{}` lots\n", e(&format!("{:.2}", plan.lot_size))));
    msg.push_str(&format!("Risk Amount: *${}*\n", e(&format!("{:.2}", plan.risk_amount))));
    msg.push_str(&format!("Potential Profit: *${}*\n\n", e(&format!("{:.2}", plan.potential_profit))));

    msg.push_str("*SIGNAL ANALYSIS:*\n");
    msg.push_str(&format!("🔥 Confluences: *{confluences}*\n"));
    msg.push_str(&format!("✨ Confidence: *{}%*\n\n", confidence_pct(confluences)));

    if setup.is_empty() {
        let mut seen = BTreeSet::new();
        let concepts: Vec<&str> = opp
            .analysis
            .iter()
            .flat_map(|a| a.findings.iter())
            .map(|f| f.concept.as_str())
            .filter(|c| seen.insert(*c))
            .take(2)
            .collect();
        msg.push_str(&format!("📝 *Setup:* {}\n", e(&concepts.join(" + "))));
    } else {
        msg.push_str("*🔎 Signal Confluences \\(Sniper Model\\):*\n\n");
        for (i, finding) in setup.iter().enumerate() {
            msg.push_str(&format!(
                "{} *Step {}: {}*\n_{}_\n\n",
                concept_emoji(&finding.concept, opp.bias),
                i + 1,
                e(&finding.concept),
                e(&finding.description),
            ));
        }
    }

    msg
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
