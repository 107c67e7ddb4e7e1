//! Speech-to-text (STT) variants

use async_trait::async_trait;
use base64::Engine as _;
use secrecy::{ExposeSecret, SecretString};

use super::{decode_wav, rms_energy};
use crate::config::SttConfig;
use crate::engine::{Capability, Transcriber, Transcription};
use crate::{Error, Result};

/// RMS energy below which audio is treated as silence
const SILENCE_RMS: f32 = 0.005;

/// `no_speech_prob` assumed when the recognizer reports no segments
const DEFAULT_NO_SPEECH_PROB: f32 = 0.2;

/// Confidence reported when the remote API omits one
const REMOTE_DEFAULT_CONFIDENCE: f32 = 0.8;

/// Whether decodable WAV input carries no audible signal
///
/// Undecodable input is passed through to the recognizer.
fn is_silent(audio: &[u8]) -> bool {
    decode_wav(audio).is_ok_and(|decoded| rms_energy(&decoded.samples) < SILENCE_RMS)
}

/// Verbose response from a Whisper-compatible transcription server
#[derive(serde::Deserialize)]
struct WhisperResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(serde::Deserialize)]
struct WhisperSegment {
    #[serde(default)]
    no_speech_prob: Option<f32>,
}

impl WhisperResponse {
    /// Confidence proxy: the inverse of the first segment's no-speech probability
    fn confidence(&self) -> f32 {
        let no_speech = self
            .segments
            .first()
            .and_then(|s| s.no_speech_prob)
            .unwrap_or(DEFAULT_NO_SPEECH_PROB);
        1.0 - no_speech
    }
}

/// Local Whisper model served over an OpenAI-compatible HTTP endpoint
pub struct LocalWhisper {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl LocalWhisper {
    const VARIANT: &'static str = "local-model";

    #[must_use]
    pub fn new(url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            model,
        }
    }

    #[must_use]
    pub fn from_config(config: &SttConfig) -> Self {
        Self::new(config.whisper_url.clone(), config.whisper_model.clone())
    }
}

#[async_trait]
impl Transcriber for LocalWhisper {
    async fn transcribe(&self, audio: &[u8]) -> Result<Transcription> {
        if audio.is_empty() || is_silent(audio) {
            tracing::debug!(audio_bytes = audio.len(), "silent input, skipping recognizer");
            return Ok(Transcription::no_speech());
        }

        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Audio(e.to_string()))?,
            )
            .text("model", self.model.clone())
            .text("response_format", "verbose_json");

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                Error::unreachable(Capability::Transcription, Self::VARIANT, e)
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper server error");
            return Err(Error::unreachable(
                Capability::Transcription,
                Self::VARIANT,
                format!("status {status}: {body}"),
            ));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse Whisper response");
            Error::unreachable(Capability::Transcription, Self::VARIANT, e)
        })?;

        let transcription = Transcription::new(result.text.as_str(), result.confidence());
        tracing::info!(
            transcript = %transcription.text,
            confidence = transcription.confidence,
            "transcription complete"
        );
        Ok(transcription)
    }
}

/// Response from the Google Speech recognize endpoint
#[derive(Default, serde::Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    results: Vec<GoogleResult>,
}

#[derive(serde::Deserialize)]
struct GoogleResult {
    #[serde(default)]
    alternatives: Vec<GoogleAlternative>,
}

#[derive(serde::Deserialize)]
struct GoogleAlternative {
    #[serde(default)]
    transcript: String,
    confidence: Option<f32>,
}

impl GoogleResponse {
    fn into_transcription(self) -> Transcription {
        let mut confidence = None;
        let mut parts = Vec::new();

        for alternative in self.results.into_iter().filter_map(|r| r.alternatives.into_iter().next()) {
            if confidence.is_none() {
                confidence = alternative.confidence;
            }
            let text = alternative.transcript.trim().to_string();
            if !text.is_empty() {
                parts.push(text);
            }
        }

        Transcription::new(
            parts.join(" "),
            confidence.unwrap_or(REMOTE_DEFAULT_CONFIDENCE),
        )
    }
}

/// Google Speech REST recognizer
pub struct GoogleSpeech {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    language: String,
    endpoint: String,
}

impl GoogleSpeech {
    const VARIANT: &'static str = "remote-api";
    const ENDPOINT: &'static str = "https://speech.googleapis.com/v1/speech:recognize";

    /// Create a recognizer; a missing key only fails at invocation time
    #[must_use]
    pub fn new(api_key: Option<SecretString>, language: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            language,
            endpoint: Self::ENDPOINT.to_string(),
        }
    }

    #[must_use]
    pub fn from_config(config: &SttConfig) -> Self {
        let api_key = config
            .google_api_key
            .as_ref()
            .map(|k| SecretString::from(k.expose_secret().to_owned()));
        Self::new(api_key, config.language.clone())
    }

    /// Point at a different recognize endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Transcriber for GoogleSpeech {
    async fn transcribe(&self, audio: &[u8]) -> Result<Transcription> {
        #[derive(serde::Serialize)]
        #[serde(rename_all = "camelCase")]
        struct RecognitionConfig<'a> {
            language_code: &'a str,
        }

        #[derive(serde::Serialize)]
        struct RecognitionAudio {
            content: String,
        }

        #[derive(serde::Serialize)]
        struct RecognizeRequest<'a> {
            config: RecognitionConfig<'a>,
            audio: RecognitionAudio,
        }

        let api_key = self.api_key.as_ref().ok_or_else(|| {
            Error::unreachable(
                Capability::Transcription,
                Self::VARIANT,
                "GOOGLE_SPEECH_API_KEY not configured",
            )
        })?;

        if audio.is_empty() {
            return Ok(Transcription::no_speech());
        }

        tracing::debug!(audio_bytes = audio.len(), "starting Google transcription");

        // Encoding and sample rate are read from the WAV header by the API
        let request = RecognizeRequest {
            config: RecognitionConfig {
                language_code: &self.language,
            },
            audio: RecognitionAudio {
                content: base64::engine::general_purpose::STANDARD.encode(audio),
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", api_key.expose_secret())])
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Google request failed");
                Error::unreachable(Capability::Transcription, Self::VARIANT, e.without_url())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Google ASR request error");
            return Err(Error::unreachable(
                Capability::Transcription,
                Self::VARIANT,
                format!("status {status}: {body}"),
            ));
        }

        let result: GoogleResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse Google response");
            Error::unreachable(Capability::Transcription, Self::VARIANT, e.without_url())
        })?;

        let transcription = result.into_transcription();
        tracing::info!(
            transcript = %transcription.text,
            confidence = transcription.confidence,
            "transcription complete"
        );
        Ok(transcription)
    }
}
