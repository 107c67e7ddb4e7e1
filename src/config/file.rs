//! TOML configuration file loading
//!
//! Supports `~/.config/parley/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ParleyConfigFile {
    /// Speech recognition configuration
    #[serde(default)]
    pub stt: SttFileConfig,

    /// Reply generation configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Speech synthesis configuration
    #[serde(default)]
    pub tts: TtsFileConfig,

    /// Conversation memory configuration
    #[serde(default)]
    pub session: SessionFileConfig,

    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// Speech recognition configuration
#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    /// Default recognizer ("local-model" or "remote-api")
    pub engine: Option<String>,

    /// Whisper-compatible transcription endpoint
    pub whisper_url: Option<String>,

    /// Whisper model name (e.g. "base")
    pub whisper_model: Option<String>,

    /// Google Speech API key
    pub google_api_key: Option<String>,

    /// Recognition language (BCP-47, e.g. "en-US")
    pub language: Option<String>,
}

/// Reply generation configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Backend ("local-chat-service" or "local-pipeline")
    pub backend: Option<String>,

    /// Chat service endpoint (e.g. "http://localhost:11434/api/chat")
    pub chat_url: Option<String>,

    /// Chat service model (e.g. "llama3")
    pub chat_model: Option<String>,

    /// Text-generation pipeline endpoint
    pub pipeline_url: Option<String>,

    /// Pipeline model identifier
    pub pipeline_model: Option<String>,
}

/// Speech synthesis configuration
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    /// Synthesizer variant key
    pub engine: Option<String>,

    /// Speaking rate in words per minute
    pub rate: Option<u32>,

    /// Voice name substring
    pub voice: Option<String>,
}

/// Conversation memory configuration
#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    /// Exchanges kept in memory
    pub max_turns: Option<usize>,

    /// Assistant behaviour directive
    pub system_prompt: Option<String>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// HTTP port
    pub port: Option<u16>,

    /// Per-invocation engine timeout in seconds
    pub engine_timeout_secs: Option<u64>,

    /// Directory served at `/` (demo page)
    pub static_dir: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ParleyConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ParleyConfigFile {
    config_file_path().map_or_else(ParleyConfigFile::default, |path| load_from(&path))
}

/// Load a TOML config file from an explicit path, with the same fallbacks
pub fn load_from(path: &Path) -> ParleyConfigFile {
    if !path.exists() {
        return ParleyConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ParleyConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ParleyConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/parley/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("parley").join("config.toml"))
}
