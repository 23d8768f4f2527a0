//! Invoice structuring: extracted text → typed [`Invoice`] via an LLM.
//!
//! The model is asked to fill a fixed JSON template (see
//! [`crate::prompts::INVOICE_SYSTEM_PROMPT`]). Replies are parsed leniently:
//! the JSON may sit inside a code fence or prose, amounts may come back as
//! numbers instead of strings, and missing or `null` fields become empty.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient. Exponential backoff
//! (`retry_backoff_ms * 2^attempt`) is applied to failed calls and to replies
//! that contain no parseable invoice: with 500 ms base and 3 retries the wait
//! sequence is 500 ms → 1 s → 2 s.

use crate::config::StructuringConfig;
use crate::error::ExtractError;
use crate::pipeline::postprocess::extract_json_object;
use crate::prompts::{invoice_user_prompt, INVOICE_SYSTEM_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

// ── Record types ─────────────────────────────────────────────────────────

/// A structured invoice. Every scalar is kept as the text the model returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(default, deserialize_with = "lenient_string")]
    pub invoice_number: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub invoice_date: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub due_date: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub total_amount: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vat_amount: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub client: Party,
    #[serde(default, deserialize_with = "null_as_default")]
    pub supplier: Party,
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<LineItem>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub payment_details: PaymentDetails,
}

/// Client or supplier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vat_number: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: Address,
    #[serde(default, deserialize_with = "lenient_string")]
    pub phone: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, deserialize_with = "lenient_string")]
    pub street: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub city: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub postcode: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub country: String,
}

/// One invoice line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub quantity: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub unit_price: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub total: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vat_rate: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    #[serde(default, deserialize_with = "lenient_string")]
    pub bank_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub iban: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub swift_code: String,
}

impl Invoice {
    /// True when the model found nothing at all.
    pub fn is_empty(&self) -> bool {
        self == &Invoice::default()
    }
}

/// Accept a string, number, bool or null where a string is expected.
fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Null => String::new(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    })
}

fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// Parse a model reply into an [`Invoice`].
pub fn parse_invoice_reply(reply: &str) -> Result<Invoice, ExtractError> {
    let json = extract_json_object(reply).ok_or_else(|| ExtractError::StructuringFailed {
        detail: "reply contains no JSON object".to_string(),
    })?;
    serde_json::from_str(json).map_err(|e| ExtractError::StructuringFailed {
        detail: format!("reply is not a valid invoice: {e}"),
    })
}

// ── Extractor ────────────────────────────────────────────────────────────

/// Sends extracted text to an LLM provider and parses the invoice it returns.
pub struct InvoiceExtractor {
    provider: Arc<dyn LLMProvider>,
    config: StructuringConfig,
}

impl InvoiceExtractor {
    pub fn new(provider: Arc<dyn LLMProvider>, config: StructuringConfig) -> Self {
        Self { provider, config }
    }

    /// Resolve the provider described by `config` (see [`resolve_provider`]).
    pub fn from_config(config: StructuringConfig) -> Result<Self, ExtractError> {
        let provider = resolve_provider(&config)?;
        info!(
            "Invoice structuring via {} ({})",
            config.provider_name.as_deref().unwrap_or("auto"),
            config.model.as_deref().unwrap_or(DEFAULT_MODEL)
        );
        Ok(Self::new(provider, config))
    }

    /// Structure `text` into an [`Invoice`].
    pub async fn structure(&self, text: &str) -> Result<Invoice, ExtractError> {
        if text.trim().is_empty() {
            return Err(ExtractError::StructuringFailed {
                detail: "document contains no text".to_string(),
            });
        }

        let start = Instant::now();
        let system_prompt = self
            .config
            .system_prompt
            .as_deref()
            .unwrap_or(INVOICE_SYSTEM_PROMPT);
        let messages = vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(invoice_user_prompt(text)),
        ];
        let options = build_options(&self.config);

        let mut last_err: Option<String> = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff = retry_backoff_ms(self.config.retry_backoff_ms, attempt);
                warn!(
                    "Invoice: retry {}/{} after {}ms",
                    attempt, self.config.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(&messages, Some(&options)).await {
                Ok(response) => {
                    debug!(
                        "Invoice: {} input tokens, {} output tokens, {:?}",
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    match parse_invoice_reply(&response.content) {
                        Ok(invoice) => return Ok(invoice),
                        Err(e) => {
                            warn!("Invoice: attempt {} unparseable: {}", attempt + 1, e);
                            last_err = Some(e.to_string());
                        }
                    }
                }
                Err(e) => {
                    warn!("Invoice: attempt {} failed: {}", attempt + 1, e);
                    last_err = Some(e.to_string());
                }
            }
        }

        Err(ExtractError::StructuringFailed {
            detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

/// Upper bound for a single retry sleep.
const MAX_BACKOFF_MS: u64 = 60_000;

/// `base_ms * 2^(attempt-1)`, capped at [`MAX_BACKOFF_MS`].
fn retry_backoff_ms(base_ms: u64, attempt: u32) -> u64 {
    let factor = 2u64.checked_pow(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    base_ms.saturating_mul(factor).min(MAX_BACKOFF_MS)
}

fn build_options(config: &StructuringConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

const DEFAULT_MODEL: &str = "gpt-4.1-nano";

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ExtractError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`), API key read from
///    the environment by the factory.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &StructuringConfig) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ExtractError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
