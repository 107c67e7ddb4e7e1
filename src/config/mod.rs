//! Configuration management for Parley
//!
//! Values are process-wide and read once at startup with precedence
//! env > TOML file > default.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::session::{DEFAULT_MAX_TURNS, DEFAULT_SYSTEM_PROMPT};
use crate::{Error, Result};
use file::ParleyConfigFile;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 18800;

/// Default speaking rate (words per minute)
pub const DEFAULT_VOICE_RATE: u32 = 170;

/// Default per-invocation engine timeout
pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(60);

const DEFAULT_WHISPER_URL: &str = "http://localhost:8000/v1/audio/transcriptions";
const DEFAULT_CHAT_URL: &str = "http://localhost:11434/api/chat";
const DEFAULT_PIPELINE_URL: &str = "http://localhost:8080/generate";
const DEFAULT_PIPELINE_MODEL: &str = "TinyLlama/TinyLlama-1.1B-Chat-v1.0";

/// Parley configuration
#[derive(Debug)]
pub struct Config {
    /// Speech recognition configuration
    pub stt: SttConfig,

    /// Reply generation configuration
    pub llm: LlmConfig,

    /// Speech synthesis configuration
    pub tts: TtsConfig,

    /// Conversation memory configuration
    pub session: SessionConfig,

    /// HTTP server configuration
    pub server: ServerConfig,
}

/// Speech recognition configuration
#[derive(Debug)]
pub struct SttConfig {
    /// Default recognizer variant key
    pub engine: String,

    /// Whisper-compatible transcription endpoint
    pub whisper_url: String,

    /// Whisper model name
    pub whisper_model: String,

    /// Google Speech API key (required only by the remote variant)
    pub google_api_key: Option<SecretString>,

    /// Recognition language for the remote variant
    pub language: String,
}

/// Reply generation configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Generator variant key
    pub backend: String,

    /// Chat service endpoint
    pub chat_url: String,

    /// Chat service model identifier
    pub chat_model: String,

    /// Text-generation pipeline endpoint
    pub pipeline_url: String,

    /// Pipeline model identifier
    pub pipeline_model: String,
}

/// Speech synthesis configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    /// Synthesizer variant key
    pub engine: String,

    /// Speaking rate in words per minute
    pub rate: u32,

    /// Optional voice name substring
    pub voice: Option<String>,
}

/// Conversation memory configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Exchanges kept in memory (N); stored messages are bounded by 2N
    pub max_turns: usize,

    /// Assistant behaviour directive
    pub system_prompt: String,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Timeout applied to every engine invocation
    pub engine_timeout: Duration,

    /// Path to static files directory (demo page)
    pub static_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the environment and the standard TOML file
    ///
    /// # Errors
    ///
    /// Returns error if a configured URL is malformed
    pub fn load() -> Result<Self> {
        Self::from_sources(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a configured URL is malformed
    pub fn from_sources(
        fc: ParleyConfigFile,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let env = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        // STT (env > toml > default)
        let stt = SttConfig {
            engine: env("PARLEY_STT_ENGINE")
                .or(fc.stt.engine)
                .unwrap_or_else(|| "local-model".to_string()),
            whisper_url: validate_url(
                "whisper_url",
                env("PARLEY_WHISPER_URL")
                    .or(fc.stt.whisper_url)
                    .unwrap_or_else(|| DEFAULT_WHISPER_URL.to_string()),
            )?,
            whisper_model: env("PARLEY_WHISPER_MODEL")
                .or(fc.stt.whisper_model)
                .unwrap_or_else(|| "base".to_string()),
            google_api_key: env("GOOGLE_SPEECH_API_KEY")
                .or(fc.stt.google_api_key)
                .map(SecretString::from),
            language: env("PARLEY_STT_LANGUAGE")
                .or(fc.stt.language)
                .unwrap_or_else(|| "en-US".to_string()),
        };

        // LLM (env > toml > default)
        let llm = LlmConfig {
            backend: env("PARLEY_LLM_BACKEND")
                .or_else(|| env("LLM_BACKEND"))
                .or(fc.llm.backend)
                .unwrap_or_else(|| "local-pipeline".to_string()),
            chat_url: validate_url(
                "chat_url",
                env("OLLAMA_URL")
                    .or(fc.llm.chat_url)
                    .unwrap_or_else(|| DEFAULT_CHAT_URL.to_string()),
            )?,
            chat_model: env("PARLEY_LLM_MODEL")
                .or_else(|| env("LLM_MODEL"))
                .or(fc.llm.chat_model)
                .unwrap_or_else(|| "llama3".to_string()),
            pipeline_url: validate_url(
                "pipeline_url",
                env("PARLEY_PIPELINE_URL")
                    .or(fc.llm.pipeline_url)
                    .unwrap_or_else(|| DEFAULT_PIPELINE_URL.to_string()),
            )?,
            pipeline_model: env("PARLEY_HF_MODEL")
                .or_else(|| env("HF_MODEL"))
                .or(fc.llm.pipeline_model)
                .unwrap_or_else(|| DEFAULT_PIPELINE_MODEL.to_string()),
        };

        // TTS (env > toml > default)
        let tts = TtsConfig {
            engine: env("PARLEY_TTS_ENGINE")
                .or(fc.tts.engine)
                .unwrap_or_else(|| "system".to_string()),
            rate: positive(
                "voice rate",
                env("PARLEY_VOICE_RATE")
                    .or_else(|| env("VOICE_RATE"))
                    .as_deref(),
                fc.tts.rate,
                DEFAULT_VOICE_RATE,
            ),
            voice: env("PARLEY_VOICE_NAME")
                .or_else(|| env("VOICE_NAME"))
                .or(fc.tts.voice),
        };

        // Session (env > toml > default)
        let session = SessionConfig {
            max_turns: positive(
                "max turns",
                env("PARLEY_MAX_TURNS")
                    .or_else(|| env("MAX_TURNS"))
                    .as_deref(),
                fc.session.max_turns,
                DEFAULT_MAX_TURNS,
            ),
            system_prompt: env("PARLEY_SYSTEM_PROMPT")
                .or(fc.session.system_prompt)
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        };

        // Server (env > toml > default)
        let server = ServerConfig {
            port: env("PARLEY_PORT")
                .and_then(|s| s.parse().ok())
                .or(fc.server.port)
                .unwrap_or(DEFAULT_PORT),
            engine_timeout: Duration::from_secs(positive(
                "engine timeout",
                env("PARLEY_ENGINE_TIMEOUT").as_deref(),
                fc.server.engine_timeout_secs,
                DEFAULT_ENGINE_TIMEOUT.as_secs(),
            )),
            static_dir: env("PARLEY_STATIC_DIR")
                .or(fc.server.static_dir)
                .map(PathBuf::from),
        };

        Ok(Self {
            stt,
            llm,
            tts,
            session,
            server,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stt: SttConfig {
                engine: "local-model".to_string(),
                whisper_url: DEFAULT_WHISPER_URL.to_string(),
                whisper_model: "base".to_string(),
                google_api_key: None,
                language: "en-US".to_string(),
            },
            llm: LlmConfig {
                backend: "local-pipeline".to_string(),
                chat_url: DEFAULT_CHAT_URL.to_string(),
                chat_model: "llama3".to_string(),
                pipeline_url: DEFAULT_PIPELINE_URL.to_string(),
                pipeline_model: DEFAULT_PIPELINE_MODEL.to_string(),
            },
            tts: TtsConfig {
                engine: "system".to_string(),
                rate: DEFAULT_VOICE_RATE,
                voice: None,
            },
            session: SessionConfig {
                max_turns: DEFAULT_MAX_TURNS,
                system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            },
            server: ServerConfig {
                port: DEFAULT_PORT,
                engine_timeout: DEFAULT_ENGINE_TIMEOUT,
                static_dir: None,
            },
        }
    }
}

fn validate_url(field: &str, value: String) -> Result<String> {
    url::Url::parse(&value)
        .map_err(|e| Error::Config(format!("invalid {field} '{value}': {e}")))?;
    Ok(value)
}

/// Pick the first positive value from env then file, else the default
///
/// Zero or unparsable values are ignored with a warning.
fn positive<T>(name: &str, env: Option<&str>, file: Option<T>, default: T) -> T
where
    T: std::str::FromStr + PartialOrd + Default + Copy + std::fmt::Display,
{
    let from_env = env.and_then(|raw| match raw.parse::<T>() {
        Ok(v) if v > T::default() => Some(v),
        _ => {
            tracing::warn!(setting = name, value = raw, %default, "ignoring invalid value");
            None
        }
    });

    from_env
        .or_else(|| {
            file.filter(|v| {
                let ok = *v > T::default();
                if !ok {
                    tracing::warn!(setting = name, value = %v, %default, "ignoring invalid value");
                }
                ok
            })
        })
        .unwrap_or(default)
}
