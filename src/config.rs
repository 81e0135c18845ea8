use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_GROQ_MODEL: &str = "mixtral-8x7b-32768";
const DEFAULT_OLLAMA_MODEL: &str = "llama3.1";
const DEFAULT_CHUNK_SIZE: usize = 5000;
const DEFAULT_CHUNK_OVERLAP: usize = 100;
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_CONTEXT_WINDOW: usize = 32_768;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;
const DEFAULT_SESSION_IDLE_TIMEOUT_SECS: u64 = 60 * 60;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the docqa server and CLI.
#[derive(Debug, Clone)]
pub struct Config {
    /// LLM backend used for summaries and answers.
    pub llm_provider: LlmProvider,
    /// Model identifier passed to the provider.
    pub llm_model: String,
    /// API credential for Groq; required when `llm_provider` is Groq.
    pub groq_api_key: Option<String>,
    /// Optional override for the Groq OpenAI-compatible base URL.
    pub groq_url: Option<String>,
    /// Optional override for the Ollama base URL.
    pub ollama_url: Option<String>,
    /// Sampling temperature forwarded with every completion.
    pub llm_temperature: f32,
    /// HTTP timeout applied to each LLM request.
    pub llm_timeout_secs: u64,
    /// Token budget used to flag oversized prompts.
    pub llm_context_window: usize,
    /// Maximum chunk length in characters.
    pub text_splitter_chunk_size: usize,
    /// Characters repeated between consecutive chunks.
    pub text_splitter_chunk_overlap: usize,
    /// Directory receiving one temp file per upload.
    pub upload_temp_dir: PathBuf,
    /// Request body cap for the upload endpoint.
    pub max_upload_bytes: usize,
    /// Seconds a session may sit unused before it is evicted.
    pub session_idle_timeout_secs: u64,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported LLM backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LlmProvider {
    /// Hosted Groq API (OpenAI-compatible chat completions).
    Groq,
    /// Local Ollama runtime.
    Ollama,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Blank values are treated as absent so that `.env` templates with empty assignments fall
    /// back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let llm_provider = match get("LLM_PROVIDER") {
            Some(value) => value
                .parse()
                .map_err(|()| ConfigError::InvalidValue("LLM_PROVIDER".into()))?,
            None => LlmProvider::Groq,
        };

        let groq_api_key = get("GROQ_API_KEY");
        if llm_provider == LlmProvider::Groq && groq_api_key.is_none() {
            return Err(ConfigError::MissingVariable("GROQ_API_KEY".into()));
        }

        let llm_model = get("LLM_MODEL").unwrap_or_else(|| match llm_provider {
            LlmProvider::Groq => DEFAULT_GROQ_MODEL.to_string(),
            LlmProvider::Ollama => DEFAULT_OLLAMA_MODEL.to_string(),
        });

        let text_splitter_chunk_size = parse_or(
            get("TEXT_SPLITTER_CHUNK_SIZE"),
            "TEXT_SPLITTER_CHUNK_SIZE",
            DEFAULT_CHUNK_SIZE,
        )?;
        if text_splitter_chunk_size == 0 {
            return Err(ConfigError::InvalidValue("TEXT_SPLITTER_CHUNK_SIZE".into()));
        }
        let text_splitter_chunk_overlap = parse_or(
            get("TEXT_SPLITTER_CHUNK_OVERLAP"),
            "TEXT_SPLITTER_CHUNK_OVERLAP",
            DEFAULT_CHUNK_OVERLAP,
        )?;
        if text_splitter_chunk_overlap >= text_splitter_chunk_size {
            return Err(ConfigError::InvalidValue(
                "TEXT_SPLITTER_CHUNK_OVERLAP".into(),
            ));
        }

        Ok(Self {
            llm_provider,
            llm_model,
            groq_api_key,
            groq_url: get("GROQ_URL"),
            ollama_url: get("OLLAMA_URL"),
            llm_temperature: parse_or(
                get("LLM_TEMPERATURE"),
                "LLM_TEMPERATURE",
                DEFAULT_TEMPERATURE,
            )?,
            llm_timeout_secs: parse_or(
                get("LLM_TIMEOUT_SECS"),
                "LLM_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )?,
            llm_context_window: parse_or(
                get("LLM_CONTEXT_WINDOW"),
                "LLM_CONTEXT_WINDOW",
                DEFAULT_CONTEXT_WINDOW,
            )?,
            text_splitter_chunk_size,
            text_splitter_chunk_overlap,
            upload_temp_dir: get("UPLOAD_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("temp")),
            max_upload_bytes: parse_or(
                get("MAX_UPLOAD_BYTES"),
                "MAX_UPLOAD_BYTES",
                DEFAULT_MAX_UPLOAD_BYTES,
            )?,
            session_idle_timeout_secs: parse_or(
                get("SESSION_IDLE_TIMEOUT_SECS"),
                "SESSION_IDLE_TIMEOUT_SECS",
                DEFAULT_SESSION_IDLE_TIMEOUT_SECS,
            )?,
            server_port: get("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load `.env`, read configuration from the environment, and install it in the global cache.
///
/// Subsequent calls return the already-installed configuration.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    if let Some(existing) = CONFIG.get() {
        return Ok(existing);
    }
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        provider = ?config.llm_provider,
        model = %config.llm_model,
        chunk_size = config.text_splitter_chunk_size,
        chunk_overlap = config.text_splitter_chunk_overlap,
        temp_dir = %config.upload_temp_dir.display(),
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_groq_setup() {
        let config = Config::from_lookup(lookup(&[("GROQ_API_KEY", "gsk-test")])).unwrap();
        assert_eq!(config.llm_provider, LlmProvider::Groq);
        assert_eq!(config.llm_model, "mixtral-8x7b-32768");
        assert_eq!(config.text_splitter_chunk_size, 5000);
        assert_eq!(config.text_splitter_chunk_overlap, 100);
        assert_eq!(config.upload_temp_dir, PathBuf::from("temp"));
        assert_eq!(config.session_idle_timeout_secs, 3600);
        assert_eq!(config.server_port, None);
    }

    #[test]
    fn groq_requires_api_key() {
        let error = Config::from_lookup(lookup(&[("GROQ_API_KEY", "  ")])).unwrap_err();
        assert!(matches!(error, ConfigError::MissingVariable(key) if key == "GROQ_API_KEY"));
    }

    #[test]
    fn ollama_needs_no_credential() {
        let config = Config::from_lookup(lookup(&[("LLM_PROVIDER", "Ollama")])).unwrap();
        assert_eq!(config.llm_provider, LlmProvider::Ollama);
        assert_eq!(config.llm_model, "llama3.1");
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk_size() {
        let error = Config::from_lookup(lookup(&[
            ("LLM_PROVIDER", "ollama"),
            ("TEXT_SPLITTER_CHUNK_SIZE", "100"),
            ("TEXT_SPLITTER_CHUNK_OVERLAP", "100"),
        ]))
        .unwrap_err();
        assert!(
            matches!(error, ConfigError::InvalidValue(key) if key == "TEXT_SPLITTER_CHUNK_OVERLAP")
        );
    }

    #[test]
    fn rejects_unknown_provider_and_bad_port() {
        let provider = Config::from_lookup(lookup(&[("LLM_PROVIDER", "openai")])).unwrap_err();
        assert!(matches!(provider, ConfigError::InvalidValue(_)));

        let port = Config::from_lookup(lookup(&[
            ("LLM_PROVIDER", "ollama"),
            ("SERVER_PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(port, ConfigError::InvalidValue(key) if key == "SERVER_PORT"));
    }
}
