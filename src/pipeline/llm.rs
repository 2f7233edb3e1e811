//! LLM extraction: page text → items via a chat completion.
//!
//! The page is reduced to its visible text, cut to
//! [`ScanConfig::max_llm_input_chars`] and sent with the fixed prompt from
//! [`crate::prompts`]. The reply is untrusted: fences are stripped, the JSON
//! shape is checked, and every entry goes through [`ReceiptItem::new`].
//!
//! Nothing here is fatal. A missing provider, a failed or slow call and an
//! unreadable reply all end in an [`LlmError`] or an empty list, and the
//! orchestrator moves on to the layout heuristics.

use crate::config::ScanConfig;
use crate::error::LlmError;
use crate::output::{Category, ReceiptItem};
use crate::pipeline::category::classify;
use crate::pipeline::clean::{
    collapse_whitespace, is_summary_row, strip_code_fences, truncate_chars, visible_text,
};
use crate::pipeline::currency::to_amount;
use crate::prompts::{receipt_user_message, RECEIPT_EXTRACTION_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use scraper::Html;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// A stateless text-in, text-out completion.
///
/// [`ProviderGenerator`] is the production implementation; tests substitute
/// canned replies.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, LlmError>;
}

/// [`TextGenerator`] over an `edgequake-llm` provider.
pub struct ProviderGenerator {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
}

impl ProviderGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ScanConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl TextGenerator for ProviderGenerator {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(prompt)];
        let options = self.options();
        let start = Instant::now();

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        debug!(
            "LLM reply: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, LlmError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| LlmError::Unavailable {
        provider: provider_name.to_string(),
        hint: e.to_string(),
    })
}

/// Resolve the LLM provider, from most to least specific:
///
/// 1. `config.provider`, used as-is
/// 2. `config.provider_name` with `config.model` (or [`DEFAULT_MODEL`])
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set
/// 4. `OPENAI_API_KEY` present → OpenAI
/// 5. `ProviderFactory::from_env()` auto-detection
pub fn resolve_provider(config: &ScanConfig) -> Result<Arc<dyn LLMProvider>, LlmError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_provider("openai", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| LlmError::Unavailable {
            provider: "auto".to_string(),
            hint: format!(
                "no provider detected from environment (set OPENAI_API_KEY, \
                 ANTHROPIC_API_KEY, or EDGEQUAKE_LLM_PROVIDER): {e}"
            ),
        })?;
    Ok(llm_provider)
}

/// Ask the LLM for the items on a receipt page.
///
/// `Ok(vec![])` means the model answered but nothing usable came back.
pub async fn extract_via_llm(
    generator: &dyn TextGenerator,
    html: &str,
    config: &ScanConfig,
) -> Result<Vec<ReceiptItem>, LlmError> {
    let text = {
        let document = Html::parse_document(html);
        visible_text(&document)
    };
    if text.is_empty() {
        return Err(LlmError::NoText);
    }

    let page_text = truncate_chars(&text, config.max_llm_input_chars);
    if page_text.len() < text.len() {
        debug!(
            "Page text cut from {} to {} chars for the LLM",
            text.chars().count(),
            config.max_llm_input_chars
        );
    }

    let system = config
        .system_prompt
        .as_deref()
        .unwrap_or(RECEIPT_EXTRACTION_PROMPT);
    let prompt = receipt_user_message(page_text);

    let secs = config.llm_timeout_secs;
    let raw = tokio::time::timeout(Duration::from_secs(secs), generator.generate(system, &prompt))
        .await
        .map_err(|_| LlmError::Timeout { secs })??;

    let items = parse_items(&raw);
    info!("LLM returned {} usable items", items.len());
    Ok(items)
}

/// Turn a model reply into items.
///
/// Accepts a bare array or an object holding an `items`/`itens` array.
/// Anything else, including invalid JSON, yields an empty list.
pub fn parse_items(raw: &str) -> Vec<ReceiptItem> {
    let body = strip_code_fences(raw);
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            warn!("LLM reply is not valid JSON: {}", e);
            return Vec::new();
        }
    };

    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(mut obj) => match obj.remove("items").or_else(|| obj.remove("itens")) {
            Some(Value::Array(entries)) => entries,
            _ => {
                warn!("LLM reply object has no items array");
                return Vec::new();
            }
        },
        other => {
            warn!("LLM reply has unexpected JSON type: {}", json_type(&other));
            return Vec::new();
        }
    };

    let total = entries.len();
    let items: Vec<ReceiptItem> = entries.iter().filter_map(parse_entry).collect();
    if items.len() < total {
        debug!("Dropped {} of {} LLM entries", total - items.len(), total);
    }
    items
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// First present key among `keys`.
fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

fn parse_entry(entry: &Value) -> Option<ReceiptItem> {
    let obj = entry.as_object()?;

    let name = collapse_whitespace(field(obj, &["name", "nome"])?.as_str()?);
    if is_summary_row(&name) {
        return None;
    }

    let price = field(obj, &["price", "preco", "preço", "valor"])
        .map(coerce_price)
        .unwrap_or(0.0);

    let category = match field(obj, &["category", "categoria"]).and_then(Value::as_str) {
        Some(label) => Category::from_label(label).unwrap_or_else(|| classify(&name)),
        None => Category::Mercado,
    };

    ReceiptItem::new(&name, price, category)
}

/// Numbers pass through; strings are parsed as plain or Brazilian notation.
fn coerce_price(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or_else(|_| to_amount(s)),
        _ => 0.0,
    }
}
