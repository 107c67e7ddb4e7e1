//! Turn coordination
//!
//! A turn runs transcription, then generation, then synthesis. Each engine
//! call is spawned onto the runtime and awaited against the invocation
//! timeout and the caller's cancellation token, so one slow backend never
//! blocks other requests. Session mutations happen only between engine calls.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, DEFAULT_ENGINE_TIMEOUT};
use crate::engine::{
    Capability, EngineRegistry, GeneratorKind, SynthesizedAudio, SynthesizerKind, Transcription,
    TranscriberKind, Variant,
};
use crate::session::SessionStore;
use crate::{Error, Result};

/// Per-call invocation controls
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    /// Overrides the coordinator's engine timeout
    pub timeout: Option<Duration>,

    /// Cancels the in-flight engine call when triggered
    pub cancel: CancellationToken,
}

impl InvokeOptions {
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Outcome of a full audio-in, audio-out turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnResult {
    pub transcript: String,
    pub confidence: f32,
    pub reply: String,
    /// Canonical WAV; empty when nothing was heard
    #[serde(skip)]
    pub audio: Vec<u8>,
}

impl TurnResult {
    fn unheard() -> Self {
        Self {
            transcript: String::new(),
            confidence: 0.0,
            reply: String::new(),
            audio: Vec::new(),
        }
    }
}

/// Aborts the engine task if the awaiting turn is dropped
struct EngineTask<T>(JoinHandle<T>);

impl<T> Drop for EngineTask<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Orchestrates turns against one shared session
pub struct TurnCoordinator {
    session: Arc<SessionStore>,
    registry: Arc<EngineRegistry>,
    transcriber: TranscriberKind,
    generator: GeneratorKind,
    synthesizer: SynthesizerKind,
    timeout: Duration,
}

impl TurnCoordinator {
    /// Create a coordinator using the default variant of each capability
    pub fn new(session: Arc<SessionStore>, registry: Arc<EngineRegistry>) -> Self {
        Self {
            session,
            registry,
            transcriber: TranscriberKind::DEFAULT,
            generator: GeneratorKind::DEFAULT,
            synthesizer: SynthesizerKind::DEFAULT,
            timeout: DEFAULT_ENGINE_TIMEOUT,
        }
    }

    /// Build the session, the registry and the configured variant choices
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let session = Arc::new(SessionStore::new(
            config.session.max_turns,
            config.session.system_prompt.clone(),
        ));
        let registry = Arc::new(EngineRegistry::from_config(config));

        Self::new(session, registry)
            .with_transcriber(TranscriberKind::select(Some(&config.stt.engine)))
            .with_generator(GeneratorKind::select(Some(&config.llm.backend)))
            .with_synthesizer(SynthesizerKind::select(Some(&config.tts.engine)))
            .with_timeout(config.server.engine_timeout)
    }

    #[must_use]
    pub const fn with_transcriber(mut self, kind: TranscriberKind) -> Self {
        self.transcriber = kind;
        self
    }

    #[must_use]
    pub const fn with_generator(mut self, kind: GeneratorKind) -> Self {
        self.generator = kind;
        self
    }

    #[must_use]
    pub const fn with_synthesizer(mut self, kind: SynthesizerKind) -> Self {
        self.synthesizer = kind;
        self
    }

    /// Default timeout for every engine invocation
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    #[must_use]
    pub const fn registry(&self) -> &Arc<EngineRegistry> {
        &self.registry
    }

    /// Configured recognizer variant
    #[must_use]
    pub const fn transcriber(&self) -> TranscriberKind {
        self.transcriber
    }

    /// Configured generator variant
    #[must_use]
    pub const fn generator(&self) -> GeneratorKind {
        self.generator
    }

    /// Configured synthesizer variant
    #[must_use]
    pub const fn synthesizer(&self) -> SynthesizerKind {
        self.synthesizer
    }

    /// Forget the conversation; the directive survives
    pub fn reset(&self) {
        self.session.reset();
        tracing::info!("conversation reset");
    }

    /// Transcribe audio without touching the session
    ///
    /// `engine` picks a recognizer for this call only; unknown keys fall
    /// back to the default recognizer.
    ///
    /// # Errors
    ///
    /// Returns error if the recognizer is unreachable, times out, or the
    /// call is cancelled
    pub async fn transcribe(
        &self,
        audio: Vec<u8>,
        engine: Option<&str>,
        opts: &InvokeOptions,
    ) -> Result<Transcription> {
        let kind = engine.map_or(self.transcriber, |key| TranscriberKind::select(Some(key)));
        let resolved = self.registry.transcriber(kind);
        let variant = resolved.variant();
        let transcriber = resolved.engine;

        tracing::debug!(variant, bytes = audio.len(), "transcribing");
        let transcription = self
            .invoke(Capability::Transcription, variant, opts, async move {
                transcriber.transcribe(&audio).await
            })
            .await?;

        tracing::info!(
            variant,
            chars = transcription.text.len(),
            confidence = transcription.confidence,
            "transcribed"
        );
        Ok(transcription)
    }

    /// Record a user turn and generate the assistant's reply
    ///
    /// Blank text is skipped: nothing is stored, no generator runs, and
    /// `Ok(None)` is returned. On generation failure, including a reply with
    /// no content, the user turn stays in memory and no assistant turn is
    /// added.
    ///
    /// # Errors
    ///
    /// Returns error if the generator fails, times out, or the call is
    /// cancelled
    pub async fn reply(&self, text: &str, opts: &InvokeOptions) -> Result<Option<String>> {
        if text.trim().is_empty() {
            tracing::debug!("empty user turn, skipping generation");
            return Ok(None);
        }

        let snapshot = self.session.append_user_and_snapshot(text);
        let resolved = self.registry.generator(self.generator);
        let variant = resolved.variant();
        let generator = resolved.engine;

        tracing::debug!(variant, messages = snapshot.len(), "generating reply");
        let reply = self
            .invoke(Capability::Generation, variant, opts, async move {
                generator.generate(&snapshot).await
            })
            .await
            .inspect_err(|e| tracing::warn!(variant, error = %e, "generation failed"))?;

        if reply.trim().is_empty() {
            tracing::warn!(variant, "generator returned no content");
            return Err(Error::Generation(format!("{variant} returned an empty reply")));
        }

        self.session.append_assistant(reply.clone());
        tracing::info!(variant, chars = reply.len(), "reply generated");
        Ok(Some(reply))
    }

    /// Synthesize speech for `text`
    ///
    /// # Errors
    ///
    /// Returns error if the synthesizer fails, times out, or the call is
    /// cancelled
    pub async fn speak(&self, text: &str, opts: &InvokeOptions) -> Result<SynthesizedAudio> {
        let resolved = self.registry.synthesizer(self.synthesizer);
        let variant = resolved.variant();
        let synthesizer = resolved.engine;
        let text = text.to_string();

        self.invoke(Capability::Synthesis, variant, opts, async move {
            synthesizer.synthesize(&text).await
        })
        .await
    }

    /// Run a complete turn from captured audio to spoken reply
    ///
    /// An empty transcript ends the turn early with an empty reply and no
    /// audio; the session is left untouched.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure; memory keeps whatever turns were
    /// recorded before it
    pub async fn run_turn(
        &self,
        audio: Vec<u8>,
        engine: Option<&str>,
        opts: &InvokeOptions,
    ) -> Result<TurnResult> {
        let turn_id = uuid::Uuid::new_v4();
        tracing::info!(%turn_id, bytes = audio.len(), "turn started");

        let transcription = self.transcribe(audio, engine, opts).await?;
        if transcription.is_empty() {
            tracing::info!(%turn_id, "nothing heard, turn ended");
            return Ok(TurnResult::unheard());
        }

        let Some(reply) = self.reply(&transcription.text, opts).await? else {
            return Ok(TurnResult::unheard());
        };

        let audio = self.speak(&reply, opts).await?;
        tracing::info!(%turn_id, reply_chars = reply.len(), wav_bytes = audio.wav.len(), "turn complete");

        Ok(TurnResult {
            transcript: transcription.text,
            confidence: transcription.confidence,
            reply,
            audio: audio.wav,
        })
    }

    /// Run one engine call on its own task, bounded by timeout and cancellation
    async fn invoke<T, F>(
        &self,
        capability: Capability,
        variant: &'static str,
        opts: &InvokeOptions,
        call: F,
    ) -> Result<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        if opts.cancel.is_cancelled() {
            return Err(Error::Cancelled { capability });
        }

        let timeout = opts.timeout.unwrap_or(self.timeout);
        let mut task = EngineTask(tokio::spawn(call));

        tokio::select! {
            joined = &mut task.0 => joined.unwrap_or_else(|e| {
                Err(Error::unreachable(capability, variant, format!("engine task failed: {e}")))
            }),
            () = tokio::time::sleep(timeout) => {
                tracing::warn!(%capability, variant, timeout_secs = timeout.as_secs_f32(), "engine timed out");
                Err(Error::Timeout { capability, variant })
            }
            () = opts.cancel.cancelled() => {
                tracing::debug!(%capability, variant, "engine call cancelled");
                Err(Error::Cancelled { capability })
            }
        }
    }
}
