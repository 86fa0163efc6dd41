//! Runner configuration loading.
//!
//! Reads a YAML file (by default `.codeloop/config.yaml`) and resolves
//! environment variables before parsing, so credentials can stay out of the
//! file:
//!
//! ```yaml
//! mode: code
//! max_requests: 50
//! api:
//!   provider: anthropic
//!   api_key: ${ANTHROPIC_API_KEY}
//! ```

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use super::errors::InferenceError;
use super::providers::ApiConfig;

/// Environment variable that points directly at a config file.
pub const CONFIG_ENV_VAR: &str = "CODELOOP_CONFIG";

/// Config file location relative to a project root.
const CONFIG_RELATIVE_PATH: &str = ".codeloop/config.yaml";

const DEFAULT_MODE: &str = "code";
const DEFAULT_MAX_REQUESTS: u32 = 50;

// ─── Public Types ────────────────────────────────────────────────────────────

/// Everything an agent runner needs besides its collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default)]
    pub api: ApiConfig,
    /// Initial mode slug.
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Safety limit on model requests per runner.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_cwd")]
    pub cwd: PathBuf,
    #[serde(default)]
    pub custom_instructions: Option<String>,
    #[serde(default)]
    pub project_rules: Vec<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            mode: default_mode(),
            max_requests: default_max_requests(),
            cwd: default_cwd(),
            custom_instructions: None,
            project_rules: Vec::new(),
        }
    }
}

fn default_mode() -> String {
    DEFAULT_MODE.to_string()
}

fn default_max_requests() -> u32 {
    DEFAULT_MAX_REQUESTS
}

fn default_cwd() -> PathBuf {
    PathBuf::from(".")
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Locate the config file.
///
/// `CODELOOP_CONFIG` wins when it names an existing file. Otherwise `start`
/// and each of its ancestors is checked for `.codeloop/config.yaml`, nearest
/// first.
pub fn find_config_path(start: &Path) -> Result<PathBuf, InferenceError> {
    if let Ok(configured) = std::env::var(CONFIG_ENV_VAR) {
        let path = PathBuf::from(expand_home(&configured));
        if path.is_file() {
            return Ok(path);
        }
        tracing::warn!(path = %path.display(), "{CONFIG_ENV_VAR} names a missing file, searching upward");
    }

    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_RELATIVE_PATH))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| InferenceError::ConfigError {
            reason: format!(
                "no {CONFIG_RELATIVE_PATH} in {} or any parent directory",
                start.display()
            ),
        })
}

/// Load and parse a runner config file.
///
/// Performs environment-variable interpolation on `${VAR_NAME}` and
/// `${VAR_NAME:-default}` before parsing.
pub fn load_runner_config(path: &Path) -> Result<RunnerConfig, InferenceError> {
    let raw = std::fs::read_to_string(path).map_err(|e| InferenceError::ConfigError {
        reason: format!("cannot read runner config {}: {e}", path.display()),
    })?;

    let config = parse_runner_config(&raw)?;
    tracing::info!(
        path = %path.display(),
        provider = %config.api.provider,
        mode = %config.mode,
        max_requests = config.max_requests,
        "runner config loaded"
    );
    Ok(config)
}

/// Parse config YAML whose `${...}` references are still unexpanded.
pub fn parse_runner_config(raw: &str) -> Result<RunnerConfig, InferenceError> {
    let expanded = expand_env_refs(raw);

    serde_yaml::from_str(&expanded).map_err(|e| InferenceError::ConfigError {
        reason: format!("failed to parse config: {e}"),
    })
}

// ─── Environment References ──────────────────────────────────────────────────

static ENV_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}]*)\}").expect("env reference pattern is valid")
});

/// Expand `${NAME}` and `${NAME:-fallback}` from the process environment.
/// An unset `NAME` without a fallback expands to nothing.
fn expand_env_refs(input: &str) -> String {
    ENV_REF
        .replace_all(input, |caps: &Captures<'_>| lookup_env_ref(&caps[1]))
        .into_owned()
}

fn lookup_env_ref(reference: &str) -> String {
    let (name, fallback) = match reference.split_once(":-") {
        Some((name, fallback)) => (name, Some(fallback)),
        None => (reference, None),
    };
    match std::env::var(name) {
        Ok(value) => value,
        Err(_) => fallback.map(expand_home).unwrap_or_default(),
    }
}

/// Replace a leading `~` with the home directory, when there is one.
fn expand_home(path: &str) -> String {
    match (path.strip_prefix('~'), dirs::home_dir()) {
        (Some(rest), Some(home)) => format!("{}{rest}", home.display()),
        _ => path.to_string(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
