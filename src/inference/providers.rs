//! Provider selection: a closed set of provider tags mapped onto client families.
//!
//! Many providers speak the same wire protocol, so construction is keyed by
//! [`ProviderFamily`], not by provider. Hosts register one constructor per
//! family in a [`ProviderRegistry`] and build clients from an [`ApiConfig`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::client::ModelClient;
use super::errors::InferenceError;
use super::pricing::default_model_id;

// ─── Provider Tags ───────────────────────────────────────────────────────────

/// Every supported API provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "String")]
pub enum ApiProvider {
    #[default]
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "openai-native")]
    OpenAiNative,
    #[serde(rename = "openrouter")]
    OpenRouter,
    Bedrock,
    Vertex,
    Gemini,
    #[serde(rename = "deepseek")]
    DeepSeek,
    Mistral,
    Ollama,
    #[serde(rename = "lmstudio")]
    LmStudio,
    VscodeLm,
    #[serde(rename = "litellm")]
    LiteLlm,
    Requesty,
    Together,
    Fireworks,
    Groq,
    Chutes,
    Xai,
    #[serde(rename = "sambanova")]
    SambaNova,
    Cerebras,
    Azure,
    Glama,
    Unbound,
}

impl ApiProvider {
    pub const ALL: [ApiProvider; 24] = [
        ApiProvider::Anthropic,
        ApiProvider::OpenAi,
        ApiProvider::OpenAiNative,
        ApiProvider::OpenRouter,
        ApiProvider::Bedrock,
        ApiProvider::Vertex,
        ApiProvider::Gemini,
        ApiProvider::DeepSeek,
        ApiProvider::Mistral,
        ApiProvider::Ollama,
        ApiProvider::LmStudio,
        ApiProvider::VscodeLm,
        ApiProvider::LiteLlm,
        ApiProvider::Requesty,
        ApiProvider::Together,
        ApiProvider::Fireworks,
        ApiProvider::Groq,
        ApiProvider::Chutes,
        ApiProvider::Xai,
        ApiProvider::SambaNova,
        ApiProvider::Cerebras,
        ApiProvider::Azure,
        ApiProvider::Glama,
        ApiProvider::Unbound,
    ];

    /// The wire tag, e.g. `openai-native`.
    pub fn as_str(self) -> &'static str {
        match self {
            ApiProvider::Anthropic => "anthropic",
            ApiProvider::OpenAi => "openai",
            ApiProvider::OpenAiNative => "openai-native",
            ApiProvider::OpenRouter => "openrouter",
            ApiProvider::Bedrock => "bedrock",
            ApiProvider::Vertex => "vertex",
            ApiProvider::Gemini => "gemini",
            ApiProvider::DeepSeek => "deepseek",
            ApiProvider::Mistral => "mistral",
            ApiProvider::Ollama => "ollama",
            ApiProvider::LmStudio => "lmstudio",
            ApiProvider::VscodeLm => "vscode-lm",
            ApiProvider::LiteLlm => "litellm",
            ApiProvider::Requesty => "requesty",
            ApiProvider::Together => "together",
            ApiProvider::Fireworks => "fireworks",
            ApiProvider::Groq => "groq",
            ApiProvider::Chutes => "chutes",
            ApiProvider::Xai => "xai",
            ApiProvider::SambaNova => "sambanova",
            ApiProvider::Cerebras => "cerebras",
            ApiProvider::Azure => "azure",
            ApiProvider::Glama => "glama",
            ApiProvider::Unbound => "unbound",
        }
    }

    /// The client family that serves this provider.
    ///
    /// Exhaustive on purpose: adding a provider without choosing its family
    /// does not compile.
    pub fn family(self) -> ProviderFamily {
        match self {
            ApiProvider::Anthropic => ProviderFamily::Anthropic,
            ApiProvider::OpenRouter => ProviderFamily::OpenRouter,
            ApiProvider::Ollama | ApiProvider::LmStudio => ProviderFamily::Ollama,
            ApiProvider::Gemini | ApiProvider::Vertex => ProviderFamily::Gemini,
            ApiProvider::OpenAi
            | ApiProvider::OpenAiNative
            | ApiProvider::Azure
            | ApiProvider::Bedrock
            | ApiProvider::VscodeLm
            | ApiProvider::DeepSeek
            | ApiProvider::Mistral
            | ApiProvider::Groq
            | ApiProvider::Together
            | ApiProvider::Fireworks
            | ApiProvider::Xai
            | ApiProvider::SambaNova
            | ApiProvider::Cerebras
            | ApiProvider::Chutes
            | ApiProvider::LiteLlm
            | ApiProvider::Requesty
            | ApiProvider::Glama
            | ApiProvider::Unbound => ProviderFamily::OpenAiCompatible,
        }
    }
}

impl fmt::Display for ApiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiProvider {
    type Err = InferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ApiProvider::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| InferenceError::UnknownProvider {
                name: s.to_string(),
            })
    }
}

impl TryFrom<String> for ApiProvider {
    type Error = InferenceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Wire protocol family shared by a group of providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFamily {
    Anthropic,
    OpenAiCompatible,
    OpenRouter,
    Ollama,
    Gemini,
}

impl ProviderFamily {
    /// Local runtimes need no API key.
    pub fn requires_api_key(self) -> bool {
        !matches!(self, ProviderFamily::Ollama)
    }
}

// ─── Config ──────────────────────────────────────────────────────────────────

/// Connection settings for one provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub provider: ApiProvider,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
}

impl ApiConfig {
    /// The configured model, falling back to the provider's default.
    pub fn resolved_model_id(&self) -> Option<String> {
        self.model_id
            .clone()
            .or_else(|| default_model_id(self.provider).map(String::from))
    }

    fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// Builds a client for one provider family.
pub type ClientConstructor =
    Arc<dyn Fn(&ApiConfig) -> Result<Arc<dyn ModelClient>, InferenceError> + Send + Sync>;

/// Maps provider families to client constructors.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    constructors: HashMap<ProviderFamily, ClientConstructor>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the constructor for `family`.
    pub fn register<F>(&mut self, family: ProviderFamily, constructor: F)
    where
        F: Fn(&ApiConfig) -> Result<Arc<dyn ModelClient>, InferenceError> + Send + Sync + 'static,
    {
        self.constructors.insert(family, Arc::new(constructor));
    }

    pub fn is_registered(&self, family: ProviderFamily) -> bool {
        self.constructors.contains_key(&family)
    }

    /// Validate `config` and construct a client for it.
    pub fn build(&self, config: &ApiConfig) -> Result<Arc<dyn ModelClient>, InferenceError> {
        let family = config.provider.family();

        if family.requires_api_key() && !config.has_api_key() {
            return Err(InferenceError::MissingCredential {
                provider: config.provider.to_string(),
                field: "api_key".into(),
            });
        }

        let constructor =
            self.constructors
                .get(&family)
                .ok_or_else(|| InferenceError::ConfigError {
                    reason: format!(
                        "no client registered for provider '{}' ({family:?} family)",
                        config.provider
                    ),
                })?;

        let client = constructor(config)?;
        tracing::info!(
            provider = %config.provider,
            family = ?family,
            model = %client.model().id,
            "model client constructed"
        );
        Ok(client)
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("families", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_core::types::Message;
    use crate::inference::client::{chunk_stream, ChunkStream};
    use crate::inference::types::{ModelInfo, ModelSpec};
    use async_trait::async_trait;

    struct NamedClient(String);

    #[async_trait]
    impl ModelClient for NamedClient {
        fn model(&self) -> ModelSpec {
            ModelSpec {
                id: self.0.clone(),
                info: ModelInfo::with_limits(8192, 1024),
            }
        }

        async fn create_message(
            &self,
            _system_prompt: &str,
            _messages: &[Message],
        ) -> Result<ChunkStream, InferenceError> {
            Ok(chunk_stream(vec![]))
        }
    }

    fn registry_with(family: ProviderFamily) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry.register(family, |config: &ApiConfig| {
            let id = config.resolved_model_id().unwrap_or_else(|| "unknown".into());
            Ok(Arc::new(NamedClient(id)) as Arc<dyn ModelClient>)
        });
        registry
    }

    #[test]
    fn test_provider_tags_round_trip() {
        for provider in ApiProvider::ALL {
            assert_eq!(provider.as_str().parse::<ApiProvider>().unwrap(), provider);
            let json = serde_json::to_string(&provider).unwrap();
            assert_eq!(json, format!("\"{}\"", provider.as_str()));
        }
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = "skynet".parse::<ApiProvider>().unwrap_err();
        assert!(matches!(err, InferenceError::UnknownProvider { name } if name == "skynet"));

        let parsed: Result<ApiConfig, _> = serde_json::from_str(r#"{"provider":"skynet"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_family_mapping() {
        assert_eq!(ApiProvider::LmStudio.family(), ProviderFamily::Ollama);
        assert_eq!(ApiProvider::Vertex.family(), ProviderFamily::Gemini);
        assert_eq!(ApiProvider::Groq.family(), ProviderFamily::OpenAiCompatible);
        assert_eq!(ApiProvider::OpenRouter.family(), ProviderFamily::OpenRouter);
    }

    #[test]
    fn test_build_requires_api_key() {
        let registry = registry_with(ProviderFamily::Anthropic);
        let config = ApiConfig::default();
        let err = registry.build(&config).err().unwrap();
        assert!(matches!(err, InferenceError::MissingCredential { .. }));
    }

    #[test]
    fn test_build_local_provider_without_key() {
        let registry = registry_with(ProviderFamily::Ollama);
        let config = ApiConfig {
            provider: ApiProvider::Ollama,
            ..ApiConfig::default()
        };
        let client = registry.build(&config).unwrap();
        assert_eq!(client.model().id, "llama3.1");
    }

    #[test]
    fn test_build_missing_constructor() {
        let registry = registry_with(ProviderFamily::Ollama);
        let config = ApiConfig {
            provider: ApiProvider::Gemini,
            api_key: Some("key".into()),
            ..ApiConfig::default()
        };
        let err = registry.build(&config).err().unwrap();
        assert!(matches!(err, InferenceError::ConfigError { .. }));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_build_uses_configured_model() {
        let registry = registry_with(ProviderFamily::OpenAiCompatible);
        let config = ApiConfig {
            provider: ApiProvider::DeepSeek,
            api_key: Some("sk-test".into()),
            model_id: Some("deepseek-reasoner".into()),
            ..ApiConfig::default()
        };
        assert_eq!(registry.build(&config).unwrap().model().id, "deepseek-reasoner");
    }
}
