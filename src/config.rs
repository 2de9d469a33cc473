use std::path::PathBuf;

use serde::Serialize;

/// Application-level constants
pub const APP_NAME: &str = "TrialScope";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default model for every analysis stage.
pub const DEFAULT_MODEL: &str = "gpt-4.1";

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default local Ollama endpoint.
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "trialscope=info"
}

/// Get the application data directory.
/// Falls back to the working directory when the platform reports none.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("trialscope")
}

/// Default location of the trial database.
pub fn default_database_path() -> PathBuf {
    app_data_dir().join("trials.db")
}

// ──────────────────────────────────────────────
// Runtime configuration
// ──────────────────────────────────────────────

/// Which LLM backend the pipeline talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI-compatible `/chat/completions`.
    OpenAi,
    /// Local Ollama `/api/chat`.
    Ollama,
}

impl LlmProvider {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "open-ai" => Some(Self::OpenAi),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => DEFAULT_OPENAI_BASE_URL,
            Self::Ollama => DEFAULT_OLLAMA_BASE_URL,
        }
    }
}

/// Maximum output tokens requested from each analysis stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageBudgets {
    pub mechanism: u32,
    pub biomarkers: u32,
    pub draft: u32,
    pub validation: u32,
    pub correction: u32,
}

impl Default for StageBudgets {
    fn default() -> Self {
        Self {
            mechanism: 1000,
            biomarkers: 500,
            draft: 3000,
            validation: 2000,
            correction: 3000,
        }
    }
}

/// Settings shared by every LLM call of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSettings {
    pub model: String,
    pub temperature: f32,
    pub budgets: StageBudgets,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            budgets: StageBudgets::default(),
        }
    }
}

/// Full runtime configuration, resolved from the environment.
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    pub provider: LlmProvider,
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub analysis: AnalysisSettings,
    /// `None` leaves requests without a client-side timeout.
    pub request_timeout_secs: Option<u64>,
    pub database_path: PathBuf,
    /// `None` disables the diagnostic dump.
    pub dump_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            api_key: None,
            analysis: AnalysisSettings::default(),
            request_timeout_secs: None,
            database_path: default_database_path(),
            dump_dir: None,
        }
    }
}

impl AppConfig {
    /// Resolve configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary key lookup.
    ///
    /// Unparseable values fall back to their defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(raw) = get("TRIALSCOPE_LLM_PROVIDER") {
            match LlmProvider::parse(&raw) {
                Some(provider) => config.provider = provider,
                None => tracing::warn!(value = %raw, "Unknown LLM provider, using openai"),
            }
        }

        config.base_url = get("TRIALSCOPE_LLM_BASE_URL")
            .unwrap_or_else(|| config.provider.default_base_url().to_string());
        config.api_key = get("TRIALSCOPE_API_KEY").or_else(|| get("OPENAI_API_KEY"));

        if let Some(model) = get("TRIALSCOPE_MODEL") {
            config.analysis.model = model;
        }
        if let Some(raw) = get("TRIALSCOPE_TEMPERATURE") {
            match raw.trim().parse::<f32>() {
                Ok(t) if (0.0..=2.0).contains(&t) => config.analysis.temperature = t,
                _ => tracing::warn!(value = %raw, "Invalid temperature, using 0.0"),
            }
        }
        if let Some(raw) = get("TRIALSCOPE_REQUEST_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.request_timeout_secs = Some(secs),
                _ => tracing::warn!(value = %raw, "Invalid request timeout, leaving unset"),
            }
        }
        if let Some(path) = get("TRIALSCOPE_DB") {
            config.database_path = PathBuf::from(path);
        }
        config.dump_dir = get("TRIALSCOPE_DUMP_DIR").map(PathBuf::from);

        config
    }
}
