use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// Default per-model token budget for non-large-context families.
pub const DEFAULT_TOKEN_LIMIT: u32 = 4_000;
/// Budget used for model names in the "large-context" family (begins with `gpt-4`).
pub const LARGE_CONTEXT_TOKEN_LIMIT: u32 = 8_000;
/// Default idle-chunk timeout for a participant stream.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30;
/// Default summarizer trigger context limit.
pub const DEFAULT_SUMMARY_CONTEXT_LIMIT: u32 = 3_000;

/// Top-level config (collab.toml + COLLAB_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollabConfig {
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub persona_file: Option<String>,
}

impl Default for CollabConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig {
                port: DEFAULT_PORT,
                bind: DEFAULT_BIND.to_string(),
                auth_token: Some("change-me".to_string()),
            },
            database: DatabaseConfig::default(),
            providers: ProvidersConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            persona_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Bearer token every `/api/*` route requires. `None` disables auth —
    /// only sensible for local development.
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Optional Redis URL, probed once at startup. Absent or unreachable ⇒
    /// the sqlite tier alone backs the store for the process lifetime.
    pub redis_url: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            redis_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    pub anthropic: Option<AnthropicConfig>,
    pub openai: Option<OpenAiProviderConfig>,
    pub ollama: Option<OllamaConfig>,
    pub google: Option<GoogleConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    pub api_key: String,
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiProviderConfig {
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    pub api_key: String,
    #[serde(default = "default_google_base_url")]
    pub base_url: String,
}

/// Runtime tunables for C3/C5, overridable via config or env.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_summary_limit")]
    pub summary_context_limit: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            summary_context_limit: DEFAULT_SUMMARY_CONTEXT_LIMIT,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_google_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_idle_timeout() -> u64 {
    DEFAULT_IDLE_TIMEOUT_SECS
}
fn default_summary_limit() -> u32 {
    DEFAULT_SUMMARY_CONTEXT_LIMIT
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.collab-orchestrator/state.db", home)
}

impl CollabConfig {
    /// Load config from a TOML file with `COLLAB_*` env var overrides.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: CollabConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("COLLAB_").split("_"))
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.collab-orchestrator/config.toml", home)
}
