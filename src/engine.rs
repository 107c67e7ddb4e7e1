//! Capability interfaces and engine selection
//!
//! Each pipeline stage (transcription, generation, synthesis) is a narrow
//! async trait. Concrete variants are a closed enum per capability; a
//! configured key resolves to a variant by case-insensitive match and falls
//! back to the capability default when nothing matches.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::Config;
use crate::session::Message;
use crate::voice::{GoogleSpeech, LocalWhisper, SystemVoice};
use crate::{Result, llm};

/// Pipeline stage an engine implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Transcription,
    Generation,
    Synthesis,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Transcription => "transcription",
            Self::Generation => "generation",
            Self::Synthesis => "synthesis",
        })
    }
}

/// Recognized speech with a best-effort confidence in `[0, 1]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcription {
    pub text: String,
    pub confidence: f32,
}

impl Transcription {
    /// Build a transcription, clamping confidence into `[0, 1]`
    ///
    /// An empty (or whitespace-only) transcript always carries zero confidence.
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return Self::no_speech();
        }
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self { text, confidence }
    }

    /// No intelligible speech was found
    #[must_use]
    pub const fn no_speech() -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Synthesized speech as canonical mono 16-bit WAV
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub wav: Vec<u8>,
    pub sample_rate: u32,
}

/// Speech-to-text capability
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe mono PCM audio (WAV container, any sample rate)
    ///
    /// Returns [`Transcription::no_speech`] when nothing intelligible is heard.
    ///
    /// # Errors
    ///
    /// Returns error if the backing recognizer cannot be reached
    async fn transcribe(&self, audio: &[u8]) -> Result<Transcription>;
}

/// Reply generation capability
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce the next assistant reply for an ordered snapshot
    /// (system directive first)
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails or returns no content
    async fn generate(&self, messages: &[Message]) -> Result<String>;
}

/// Text-to-speech capability
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Speak `text`; empty text must not fail
    ///
    /// # Errors
    ///
    /// Returns error if the speech engine is missing or fails
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio>;
}

/// A closed set of interchangeable variants for one capability
pub trait Variant: Copy + Eq + Hash + std::fmt::Debug + Send + Sync + 'static {
    const CAPABILITY: Capability;
    const DEFAULT: Self;
    const ALL: &'static [Self];

    /// Canonical configuration key
    fn key(self) -> &'static str;

    /// Additional accepted keys
    fn aliases(self) -> &'static [&'static str] {
        &[]
    }

    /// Exact, case-insensitive lookup
    fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| {
            v.key().eq_ignore_ascii_case(key)
                || v.aliases().iter().any(|a| a.eq_ignore_ascii_case(key))
        })
    }

    /// Resolve a configured key, falling back to [`Variant::DEFAULT`]
    fn select(key: Option<&str>) -> Self {
        let Some(key) = key else {
            return Self::DEFAULT;
        };
        Self::from_key(key).unwrap_or_else(|| {
            tracing::warn!(
                capability = %Self::CAPABILITY,
                requested = key,
                fallback = Self::DEFAULT.key(),
                "unknown engine variant, using default"
            );
            Self::DEFAULT
        })
    }
}

/// Speech recognizers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TranscriberKind {
    /// Local Whisper-compatible server
    LocalModel,
    /// Google Speech REST API
    RemoteApi,
}

impl Variant for TranscriberKind {
    const CAPABILITY: Capability = Capability::Transcription;
    const DEFAULT: Self = Self::LocalModel;
    const ALL: &'static [Self] = &[Self::LocalModel, Self::RemoteApi];

    fn key(self) -> &'static str {
        match self {
            Self::LocalModel => "local-model",
            Self::RemoteApi => "remote-api",
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::LocalModel => &["whisper", "local"],
            Self::RemoteApi => &["google"],
        }
    }
}

/// Reply generators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratorKind {
    /// Chat-completion service (Ollama `/api/chat`)
    LocalChatService,
    /// Local text-generation pipeline fed a rendered dialogue prompt
    LocalPipeline,
}

impl Variant for GeneratorKind {
    const CAPABILITY: Capability = Capability::Generation;
    const DEFAULT: Self = Self::LocalPipeline;
    const ALL: &'static [Self] = &[Self::LocalChatService, Self::LocalPipeline];

    fn key(self) -> &'static str {
        match self {
            Self::LocalChatService => "local-chat-service",
            Self::LocalPipeline => "local-pipeline",
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::LocalChatService => &["ollama"],
            Self::LocalPipeline => &["hf"],
        }
    }
}

/// Speech synthesizers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SynthesizerKind {
    /// System speech engine (`espeak-ng` / `espeak`)
    System,
}

impl Variant for SynthesizerKind {
    const CAPABILITY: Capability = Capability::Synthesis;
    const DEFAULT: Self = Self::System;
    const ALL: &'static [Self] = &[Self::System];

    fn key(self) -> &'static str {
        match self {
            Self::System => "system",
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::System => &["local", "espeak"],
        }
    }
}

/// An engine chosen by the registry, tagged with the variant actually used
pub struct Resolved<K, E: ?Sized> {
    pub kind: K,
    pub engine: Arc<E>,
}

impl<K: Variant, E: ?Sized> Resolved<K, E> {
    /// Configuration key of the chosen variant
    #[must_use]
    pub fn variant(&self) -> &'static str {
        self.kind.key()
    }
}

impl<K: Copy, E: ?Sized> Clone for Resolved<K, E> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            engine: Arc::clone(&self.engine),
        }
    }
}

/// Result of [`EngineRegistry::resolve`]
pub enum Engine {
    Transcriber(Resolved<TranscriberKind, dyn Transcriber>),
    Generator(Resolved<GeneratorKind, dyn Generator>),
    Synthesizer(Resolved<SynthesizerKind, dyn Synthesizer>),
}

impl Engine {
    /// Configuration key of the chosen variant
    #[must_use]
    pub fn variant(&self) -> &'static str {
        match self {
            Self::Transcriber(r) => r.variant(),
            Self::Generator(r) => r.variant(),
            Self::Synthesizer(r) => r.variant(),
        }
    }
}

/// Registered engines for one capability; the default is always present
struct Slot<K, E: ?Sized> {
    default: Arc<E>,
    variants: HashMap<K, Arc<E>>,
}

impl<K: Variant, E: ?Sized> Slot<K, E> {
    fn new(default: Arc<E>) -> Self {
        Self {
            default,
            variants: HashMap::new(),
        }
    }

    fn insert(&mut self, kind: K, engine: Arc<E>) {
        if kind == K::DEFAULT {
            self.default = engine;
        } else {
            self.variants.insert(kind, engine);
        }
    }

    fn get(&self, kind: K) -> Resolved<K, E> {
        if kind != K::DEFAULT {
            if let Some(engine) = self.variants.get(&kind) {
                return Resolved {
                    kind,
                    engine: Arc::clone(engine),
                };
            }
            tracing::warn!(
                capability = %K::CAPABILITY,
                requested = kind.key(),
                fallback = K::DEFAULT.key(),
                "engine variant not registered, using default"
            );
        }
        Resolved {
            kind: K::DEFAULT,
            engine: Arc::clone(&self.default),
        }
    }
}

/// Binds configured variant keys to concrete engines
pub struct EngineRegistry {
    transcribers: Slot<TranscriberKind, dyn Transcriber>,
    generators: Slot<GeneratorKind, dyn Generator>,
    synthesizers: Slot<SynthesizerKind, dyn Synthesizer>,
}

impl EngineRegistry {
    /// Create a registry holding only the default engine of each capability
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        generator: Arc<dyn Generator>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> Self {
        Self {
            transcribers: Slot::new(transcriber),
            generators: Slot::new(generator),
            synthesizers: Slot::new(synthesizer),
        }
    }

    /// Build every known variant from configuration
    ///
    /// Construction never contacts a backend; unreachable services surface
    /// when the engine is invoked.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new(
            build_transcriber(TranscriberKind::DEFAULT, config),
            build_generator(GeneratorKind::DEFAULT, config),
            build_synthesizer(SynthesizerKind::DEFAULT, config),
        );
        for &kind in non_default(TranscriberKind::ALL) {
            registry.register_transcriber(kind, build_transcriber(kind, config));
        }
        for &kind in non_default(GeneratorKind::ALL) {
            registry.register_generator(kind, build_generator(kind, config));
        }
        for &kind in non_default(SynthesizerKind::ALL) {
            registry.register_synthesizer(kind, build_synthesizer(kind, config));
        }
        registry
    }

    /// Register (or replace) a transcriber variant
    pub fn register_transcriber(&mut self, kind: TranscriberKind, engine: Arc<dyn Transcriber>) {
        self.transcribers.insert(kind, engine);
    }

    /// Register (or replace) a generator variant
    pub fn register_generator(&mut self, kind: GeneratorKind, engine: Arc<dyn Generator>) {
        self.generators.insert(kind, engine);
    }

    /// Register (or replace) a synthesizer variant
    pub fn register_synthesizer(&mut self, kind: SynthesizerKind, engine: Arc<dyn Synthesizer>) {
        self.synthesizers.insert(kind, engine);
    }

    #[must_use]
    pub fn transcriber(&self, kind: TranscriberKind) -> Resolved<TranscriberKind, dyn Transcriber> {
        self.transcribers.get(kind)
    }

    #[must_use]
    pub fn generator(&self, kind: GeneratorKind) -> Resolved<GeneratorKind, dyn Generator> {
        self.generators.get(kind)
    }

    #[must_use]
    pub fn synthesizer(&self, kind: SynthesizerKind) -> Resolved<SynthesizerKind, dyn Synthesizer> {
        self.synthesizers.get(kind)
    }

    /// Resolve a capability by configured key; unknown keys yield the default
    #[must_use]
    pub fn resolve(&self, capability: Capability, key: &str) -> Engine {
        match capability {
            Capability::Transcription => {
                Engine::Transcriber(self.transcriber(TranscriberKind::select(Some(key))))
            }
            Capability::Generation => {
                Engine::Generator(self.generator(GeneratorKind::select(Some(key))))
            }
            Capability::Synthesis => {
                Engine::Synthesizer(self.synthesizer(SynthesizerKind::select(Some(key))))
            }
        }
    }
}

fn non_default<K: Variant>(all: &'static [K]) -> impl Iterator<Item = &'static K> {
    all.iter().filter(|k| **k != K::DEFAULT)
}

fn build_transcriber(kind: TranscriberKind, config: &Config) -> Arc<dyn Transcriber> {
    match kind {
        TranscriberKind::LocalModel => Arc::new(LocalWhisper::from_config(&config.stt)),
        TranscriberKind::RemoteApi => Arc::new(GoogleSpeech::from_config(&config.stt)),
    }
}

fn build_generator(kind: GeneratorKind, config: &Config) -> Arc<dyn Generator> {
    match kind {
        GeneratorKind::LocalChatService => Arc::new(llm::ChatService::from_config(&config.llm)),
        GeneratorKind::LocalPipeline => Arc::new(llm::LocalPipeline::from_config(&config.llm)),
    }
}

fn build_synthesizer(kind: SynthesizerKind, config: &Config) -> Arc<dyn Synthesizer> {
    match kind {
        SynthesizerKind::System => Arc::new(SystemVoice::from_config(&config.tts)),
    }
}
