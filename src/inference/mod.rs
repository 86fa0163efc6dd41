//! Inference: the provider-neutral side of talking to a language model.
//!
//! This module covers everything between the agent loop and a concrete
//! provider adapter:
//! - The streaming `ModelClient` capability and its chunk types
//! - Provider tags, their client families and the constructor registry
//! - Pricing, the known-model catalog and API call metrics
//! - Runner configuration loading from `.codeloop/config.yaml`
//!
//! Adapters for specific providers implement [`ModelClient`] and are plugged
//! in through [`ProviderRegistry`]. Switching provider is a config change,
//! not a code change.

pub mod client;
pub mod config;
pub mod errors;
pub mod pricing;
pub mod providers;
pub mod types;

// Re-exports for convenience
pub use client::{chunk_stream, collect_text, ChunkStream, ModelClient};
pub use config::{find_config_path, load_runner_config, RunnerConfig};
pub use errors::InferenceError;
pub use pricing::{
    calculate_cost, default_model_id, get_api_metrics, get_model_info, ApiCallRecord, ApiMetrics,
    ModelCatalog, Pricing, StandardPricing,
};
pub use providers::{ApiConfig, ApiProvider, ProviderFamily, ProviderRegistry};
pub use types::{ModelInfo, ModelSpec, StreamChunk, TokenUsage};
