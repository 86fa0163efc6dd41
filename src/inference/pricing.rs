//! Token pricing, the known-model catalog and API call metrics.
//!
//! Prices in [`ModelInfo`] are USD per million tokens.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::providers::ApiProvider;
use super::types::{ModelInfo, TokenUsage};

const TOKENS_PER_PRICE_UNIT: f64 = 1_000_000.0;

// ─── Cost ────────────────────────────────────────────────────────────────────

/// Converts a usage report into a dollar amount.
pub trait Pricing: Send + Sync {
    fn cost(&self, usage: &TokenUsage, info: &ModelInfo) -> f64;
}

/// Prices usage from the per-million rates in [`ModelInfo`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardPricing;

impl Pricing for StandardPricing {
    fn cost(&self, usage: &TokenUsage, info: &ModelInfo) -> f64 {
        calculate_cost(usage, info)
    }
}

/// Cost of one request. Missing prices count as zero.
///
/// Cached tokens are included in `input_tokens` by providers, so they are
/// subtracted from the regular input before pricing it.
pub fn calculate_cost(usage: &TokenUsage, info: &ModelInfo) -> f64 {
    let cache_read = usage.cache_read_tokens.unwrap_or(0);
    let cache_write = usage.cache_write_tokens.unwrap_or(0);
    let regular_input = usage.input_tokens.saturating_sub(cache_read + cache_write);

    let per_token = |price: Option<f64>| price.unwrap_or(0.0) / TOKENS_PER_PRICE_UNIT;

    regular_input as f64 * per_token(info.input_price)
        + usage.output_tokens as f64 * per_token(info.output_price)
        + cache_read as f64 * per_token(info.cache_reads_price)
        + cache_write as f64 * per_token(info.cache_writes_price)
}

// ─── Model Catalog ───────────────────────────────────────────────────────────

/// Known models per provider, extensible at runtime.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: HashMap<ApiProvider, HashMap<String, ModelInfo>>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        let mut catalog = Self {
            models: HashMap::new(),
        };
        catalog.register_models(ApiProvider::Anthropic, anthropic_models());
        catalog.register_models(ApiProvider::OpenAi, openai_models());
        catalog.register_models(ApiProvider::OpenAiNative, openai_models());
        catalog.register_models(ApiProvider::Gemini, gemini_models());
        catalog.register_models(ApiProvider::DeepSeek, deepseek_models());
        catalog
    }
}

impl ModelCatalog {
    /// A catalog with no models.
    pub fn empty() -> Self {
        Self {
            models: HashMap::new(),
        }
    }

    pub fn get(&self, provider: ApiProvider, model_id: &str) -> Option<&ModelInfo> {
        self.models.get(&provider)?.get(model_id)
    }

    /// Add models for `provider`, replacing entries with the same id.
    pub fn register_models<I>(&mut self, provider: ApiProvider, models: I)
    where
        I: IntoIterator<Item = (String, ModelInfo)>,
    {
        self.models.entry(provider).or_default().extend(models);
    }

    pub fn model_ids(&self, provider: ApiProvider) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .models
            .get(&provider)
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }
}

/// Look up a built-in model.
pub fn get_model_info(provider: ApiProvider, model_id: &str) -> Option<ModelInfo> {
    ModelCatalog::default().get(provider, model_id).cloned()
}

/// The model used when a config names none.
pub fn default_model_id(provider: ApiProvider) -> Option<&'static str> {
    match provider {
        ApiProvider::Anthropic => Some("claude-sonnet-4-20250514"),
        ApiProvider::OpenAi | ApiProvider::OpenAiNative => Some("gpt-4o"),
        ApiProvider::Gemini => Some("gemini-2.5-pro-preview-06-05"),
        ApiProvider::DeepSeek => Some("deepseek-chat"),
        ApiProvider::Mistral => Some("mistral-large-latest"),
        ApiProvider::Groq => Some("llama-3.3-70b-versatile"),
        ApiProvider::Ollama => Some("llama3.1"),
        _ => None,
    }
}

fn priced(max_tokens: u32, context_window: u32, input: f64, output: f64) -> ModelInfo {
    ModelInfo {
        input_price: Some(input),
        output_price: Some(output),
        ..ModelInfo::with_limits(context_window, max_tokens)
    }
}

fn with_cache(info: ModelInfo, writes: Option<f64>, reads: f64) -> ModelInfo {
    ModelInfo {
        supports_prompt_cache: writes.is_some(),
        cache_writes_price: writes,
        cache_reads_price: Some(reads),
        ..info
    }
}

fn anthropic_models() -> Vec<(String, ModelInfo)> {
    let claude = |max, input, output, writes, reads, thinking| ModelInfo {
        supports_images: true,
        thinking,
        ..with_cache(priced(max, 200_000, input, output), Some(writes), reads)
    };
    vec![
        ("claude-sonnet-4-20250514".into(), claude(16_384, 3.0, 15.0, 3.75, 0.3, true)),
        ("claude-opus-4-20250514".into(), claude(32_768, 15.0, 75.0, 18.75, 1.5, true)),
        ("claude-3-7-sonnet-20250219".into(), claude(8192, 3.0, 15.0, 3.75, 0.3, true)),
        (
            "claude-3-5-sonnet-20241022".into(),
            ModelInfo {
                supports_computer_use: true,
                ..claude(8192, 3.0, 15.0, 3.75, 0.3, false)
            },
        ),
        ("claude-3-5-haiku-20241022".into(), claude(8192, 0.8, 4.0, 1.0, 0.08, false)),
        ("claude-3-haiku-20240307".into(), claude(4096, 0.25, 1.25, 0.3, 0.03, false)),
    ]
}

fn openai_models() -> Vec<(String, ModelInfo)> {
    let images = |info: ModelInfo| ModelInfo {
        supports_images: true,
        ..info
    };
    let thinking = |info: ModelInfo| ModelInfo {
        thinking: true,
        ..info
    };
    vec![
        ("gpt-4o".into(), images(priced(16_384, 128_000, 2.5, 10.0))),
        ("gpt-4o-mini".into(), images(priced(16_384, 128_000, 0.15, 0.6))),
        ("o1".into(), thinking(images(priced(100_000, 200_000, 15.0, 60.0)))),
        ("o1-mini".into(), thinking(priced(65_536, 128_000, 1.1, 4.4))),
        ("o3-mini".into(), thinking(priced(100_000, 200_000, 1.1, 4.4))),
    ]
}

fn gemini_models() -> Vec<(String, ModelInfo)> {
    let gemini = |max, input, output, thinking| ModelInfo {
        supports_images: true,
        thinking,
        ..priced(max, 1_048_576, input, output)
    };
    vec![
        ("gemini-2.5-pro-preview-06-05".into(), gemini(65_536, 1.25, 10.0, true)),
        ("gemini-2.5-flash-preview-05-20".into(), gemini(65_536, 0.15, 0.6, true)),
        ("gemini-2.0-flash".into(), gemini(8192, 0.1, 0.4, false)),
    ]
}

fn deepseek_models() -> Vec<(String, ModelInfo)> {
    vec![
        (
            "deepseek-chat".into(),
            with_cache(priced(8192, 64_000, 0.14, 0.28), None, 0.014),
        ),
        (
            "deepseek-reasoner".into(),
            ModelInfo {
                thinking: true,
                ..with_cache(priced(8192, 64_000, 0.55, 2.19), None, 0.055)
            },
        ),
    ]
}

// ─── Metrics ─────────────────────────────────────────────────────────────────

/// One completed API request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCallRecord {
    pub timestamp: DateTime<Utc>,
    pub provider: String,
    pub model_id: String,
    pub usage: TokenUsage,
    pub cost: f64,
    pub duration_ms: u64,
}

/// Aggregate view over a set of [`ApiCallRecord`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMetrics {
    pub total_cost: f64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cache_read_tokens: u64,
    pub total_cache_write_tokens: u64,
    pub total_requests: usize,
    pub average_duration_ms: f64,
    pub cost_by_provider: HashMap<String, f64>,
    pub cost_by_model: HashMap<String, f64>,
}

pub fn get_api_metrics(records: &[ApiCallRecord]) -> ApiMetrics {
    let mut metrics = ApiMetrics {
        total_requests: records.len(),
        ..ApiMetrics::default()
    };
    let mut total_duration_ms = 0u64;

    for record in records {
        metrics.total_cost += record.cost;
        metrics.total_input_tokens += record.usage.input_tokens;
        metrics.total_output_tokens += record.usage.output_tokens;
        metrics.total_cache_read_tokens += record.usage.cache_read_tokens.unwrap_or(0);
        metrics.total_cache_write_tokens += record.usage.cache_write_tokens.unwrap_or(0);
        total_duration_ms += record.duration_ms;

        *metrics
            .cost_by_provider
            .entry(record.provider.clone())
            .or_default() += record.cost;
        *metrics
            .cost_by_model
            .entry(record.model_id.clone())
            .or_default() += record.cost;
    }

    if !records.is_empty() {
        metrics.average_duration_ms = total_duration_ms as f64 / records.len() as f64;
    }

    metrics
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_cost_without_cache() {
        let info = priced(8192, 200_000, 3.0, 15.0);
        let cost = calculate_cost(&TokenUsage::new(1_000_000, 100_000), &info);
        assert!(approx(cost, 3.0 + 1.5));
    }

    #[test]
    fn test_cost_subtracts_cached_input() {
        let info = get_model_info(ApiProvider::Anthropic, "claude-sonnet-4-20250514").unwrap();
        let usage = TokenUsage {
            input_tokens: 1_000_000,
            output_tokens: 0,
            cache_read_tokens: Some(400_000),
            cache_write_tokens: Some(100_000),
        };
        // 500k regular at 3.0, 400k reads at 0.3, 100k writes at 3.75
        let expected = 1.5 + 0.12 + 0.375;
        assert!(approx(calculate_cost(&usage, &info), expected));
    }

    #[test]
    fn test_cost_clamps_regular_input_at_zero() {
        let info = priced(8192, 64_000, 1.0, 0.0);
        let usage = TokenUsage {
            input_tokens: 10,
            output_tokens: 0,
            cache_read_tokens: Some(50),
            cache_write_tokens: None,
        };
        assert!(approx(calculate_cost(&usage, &info), 0.0));
    }

    #[test]
    fn test_missing_prices_are_free() {
        let info = ModelInfo::with_limits(8192, 1024);
        assert_eq!(StandardPricing.cost(&TokenUsage::new(5000, 5000), &info), 0.0);
    }

    #[test]
    fn test_catalog_lookup_and_register() {
        assert!(get_model_info(ApiProvider::OpenAiNative, "gpt-4o").is_some());
        assert!(get_model_info(ApiProvider::Groq, "gpt-4o").is_none());

        let mut catalog = ModelCatalog::empty();
        catalog.register_models(
            ApiProvider::Groq,
            vec![("llama-3.3-70b-versatile".to_string(), priced(32_768, 128_000, 0.59, 0.79))],
        );
        assert_eq!(catalog.model_ids(ApiProvider::Groq), vec!["llama-3.3-70b-versatile"]);
    }

    #[test]
    fn test_default_model_ids() {
        assert_eq!(default_model_id(ApiProvider::Anthropic), Some("claude-sonnet-4-20250514"));
        assert_eq!(default_model_id(ApiProvider::Unbound), None);
    }

    #[test]
    fn test_api_metrics_aggregation() {
        let record = |provider: &str, model: &str, cost: f64, duration_ms: u64| ApiCallRecord {
            timestamp: Utc::now(),
            provider: provider.into(),
            model_id: model.into(),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 10,
                cache_read_tokens: Some(5),
                cache_write_tokens: None,
            },
            cost,
            duration_ms,
        };
        let metrics = get_api_metrics(&[
            record("anthropic", "claude-sonnet-4-20250514", 0.5, 100),
            record("anthropic", "claude-3-5-haiku-20241022", 0.25, 300),
        ]);
        assert_eq!(metrics.total_requests, 2);
        assert_eq!(metrics.total_input_tokens, 200);
        assert_eq!(metrics.total_cache_read_tokens, 10);
        assert!(approx(metrics.average_duration_ms, 200.0));
        assert!(approx(metrics.cost_by_provider["anthropic"], 0.75));
        assert!(approx(metrics.cost_by_model["claude-3-5-haiku-20241022"], 0.25));
    }

    #[test]
    fn test_api_metrics_empty() {
        let metrics = get_api_metrics(&[]);
        assert_eq!(metrics.total_requests, 0);
        assert_eq!(metrics.average_duration_ms, 0.0);
    }
}
