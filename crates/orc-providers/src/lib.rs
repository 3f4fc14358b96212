//! Uniform LLM provider abstraction (spec §4.13).
//!
//! The Agent Runtime depends only on the [`Provider`] trait; it must not
//! branch on which implementation is active. Two concrete providers are
//! shipped: [`EchoProvider`] (offline, deterministic, used by default and
//! in tests) and [`HttpProvider`] (a generic OpenAI-compatible remote
//! backend). Grounded on `tandem-providers::Provider` and its
//! `OpenAICompatibleProvider`/`LocalEchoProvider` implementations.

use async_trait::async_trait;
use orc_types::{Conversation, Message, ModelInfo, ProviderInfo, TokenUsage};
use reqwest::Client;
use serde_json::json;

/// `(input_per_1k_usd, output_per_1k_usd)`.
pub type Rates = (f64, f64);

/// A single LLM turn's reply, with the token accounting the Cost Tracker
/// needs to charge against a Task's [`orc_types::BudgetState`].
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn info(&self) -> ProviderInfo;

    /// Blocking-style invocation (spec §4.13, "invoke"). Implementations on
    /// an async runtime (all of ours) simply await internally; the
    /// distinction from `invoke_async` is the contract's, not Rust's —
    /// both are `async fn` here.
    async fn invoke(&self, conversation: &Conversation, model_override: Option<&str>) -> anyhow::Result<Completion>;

    async fn invoke_async(
        &self,
        conversation: &Conversation,
        model_override: Option<&str>,
    ) -> anyhow::Result<Completion> {
        self.invoke(conversation, model_override).await
    }

    fn estimate_tokens(&self, text: &str) -> usize {
        orc_types::estimate_tokens(text)
    }

    fn rates(&self) -> Rates;
}

fn render_prompt(conversation: &Conversation) -> String {
    conversation
        .messages()
        .iter()
        .map(render_message)
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_message(message: &Message) -> String {
    match message {
        Message::System { content } => format!("system: {content}"),
        Message::User { content } => format!("user: {content}"),
        Message::Assistant { content } => format!("assistant: {content}"),
        Message::ToolResult {
            tool_name, content, ..
        } => format!("tool_result[{tool_name}]: {content}"),
    }
}

/// Offline, deterministic provider used as the engine's default and in
/// every test harness. Echoes the last user message back with a
/// deterministic tool-free response so runtime tests never depend on
/// network access. Grounded on `tandem-providers::LocalEchoProvider`.
pub struct EchoProvider {
    model_id: String,
}

impl EchoProvider {
    pub fn new() -> Self {
        Self {
            model_id: "echo-default".to_string(),
        }
    }
}

impl Default for EchoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for EchoProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: "echo".to_string(),
            name: "Echo (offline)".to_string(),
            models: vec![ModelInfo {
                id: self.model_id.clone(),
                provider_id: "echo".to_string(),
                display_name: "Echo Model".to_string(),
                context_window: 32_000,
            }],
        }
    }

    async fn invoke(
        &self,
        conversation: &Conversation,
        _model_override: Option<&str>,
    ) -> anyhow::Result<Completion> {
        let last_user = conversation
            .messages()
            .iter()
            .rev()
            .find(|m| m.is_user())
            .map(|m| m.content().to_string())
            .unwrap_or_default();
        let text = format!("Echo: {last_user}");
        let usage = TokenUsage {
            input_tokens: self.estimate_tokens(&render_prompt(conversation)) as u64,
            output_tokens: self.estimate_tokens(&text) as u64,
        };
        Ok(Completion { text, usage })
    }

    fn rates(&self) -> Rates {
        (0.0, 0.0)
    }
}

/// Generic OpenAI-compatible remote backend selected by `LLM_PROVIDER` /
/// `LLM_MODEL`. Grounded on `tandem-providers::OpenAICompatibleProvider`,
/// stripped of provider-specific header quirks (OpenRouter's
/// `HTTP-Referer`, etc.) since the spec only requires one generic remote
/// shape.
pub struct HttpProvider {
    id: String,
    name: String,
    base_url: String,
    api_key: Option<String>,
    default_model: String,
    input_rate_per_1k: f64,
    output_rate_per_1k: f64,
    client: Client,
}

impl HttpProvider {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        default_model: impl Into<String>,
        rates: Rates,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            base_url: base_url.into(),
            api_key,
            default_model: default_model.into(),
            input_rate_per_1k: rates.0,
            output_rate_per_1k: rates.1,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Provider for HttpProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            models: vec![ModelInfo {
                id: self.default_model.clone(),
                provider_id: self.id.clone(),
                display_name: self.default_model.clone(),
                context_window: 128_000,
            }],
        }
    }

    async fn invoke(
        &self,
        conversation: &Conversation,
        model_override: Option<&str>,
    ) -> anyhow::Result<Completion> {
        let model = model_override
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.default_model.as_str());

        let wire_messages: Vec<serde_json::Value> = conversation
            .messages()
            .iter()
            .map(|m| {
                let role = match m {
                    Message::System { .. } => "system",
                    Message::User { .. } => "user",
                    Message::Assistant { .. } => "assistant",
                    Message::ToolResult { .. } => "tool",
                };
                json!({ "role": role, "content": m.content() })
            })
            .collect();

        let url = format!("{}/chat/completions", self.base_url);
        let mut req = self.client.post(url).json(&json!({
            "model": model,
            "messages": wire_messages,
            "stream": false,
        }));
        if let Some(api_key) = &self.api_key {
            req = req.bearer_auth(api_key);
        }

        let response = req.send().await?;
        let status = response.status();
        let value: serde_json::Value = response.json().await?;

        if !status.is_success() {
            let detail = extract_error(&value)
                .unwrap_or_else(|| format!("provider request failed with status {status}"));
            anyhow::bail!(detail);
        }
        if let Some(detail) = extract_error(&value) {
            anyhow::bail!(detail);
        }

        let text = extract_text(&value).ok_or_else(|| {
            anyhow::anyhow!(
                "provider returned no completion content for model `{}`",
                model
            )
        })?;

        let usage = extract_usage(&value).unwrap_or(TokenUsage {
            input_tokens: self.estimate_tokens(&render_prompt(conversation)) as u64,
            output_tokens: self.estimate_tokens(&text) as u64,
        });

        Ok(Completion { text, usage })
    }

    fn rates(&self) -> Rates {
        (self.input_rate_per_1k, self.output_rate_per_1k)
    }
}

fn extract_text(value: &serde_json::Value) -> Option<String> {
    value
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}

fn extract_error(value: &serde_json::Value) -> Option<String> {
    value
        .get("error")
        .and_then(|e| e.get("message").or(Some(e)))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

fn extract_usage(value: &serde_json::Value) -> Option<TokenUsage> {
    let usage = value.get("usage")?;
    Some(TokenUsage {
        input_tokens: usage.get("prompt_tokens")?.as_u64()?,
        output_tokens: usage.get("completion_tokens")?.as_u64()?,
    })
}
