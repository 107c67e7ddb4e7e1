//! Shared test utilities: scripted in-memory engines

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use parley::voice::samples_to_wav;
use parley::{
    EngineRegistry, Error, Generator, Message, Result, SessionStore, SynthesizedAudio,
    Synthesizer, Transcriber, Transcription, TurnCoordinator,
};

pub const SAMPLE_RATE: u32 = 16_000;

/// Transcriber that always hears the same text
pub struct ScriptedTranscriber {
    text: &'static str,
    confidence: f32,
    calls: AtomicUsize,
}

impl ScriptedTranscriber {
    pub fn hearing(text: &'static str) -> Arc<Self> {
        Arc::new(Self {
            text,
            confidence: 0.9,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn silent() -> Arc<Self> {
        Self::hearing("")
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, _audio: &[u8]) -> Result<Transcription> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Transcription::new(self.text, self.confidence))
    }
}

enum Behaviour {
    Echo,
    Blank,
    Fail,
    Stall,
}

/// Generator that records every snapshot it receives
pub struct RecordingGenerator {
    behaviour: Behaviour,
    delay: Duration,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl RecordingGenerator {
    fn with(behaviour: Behaviour, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            delay,
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Replies `re: <last message>`
    pub fn echo() -> Arc<Self> {
        Self::with(Behaviour::Echo, Duration::ZERO)
    }

    /// Echoes after sleeping, so concurrent exchanges overlap
    pub fn slow_echo(delay: Duration) -> Arc<Self> {
        Self::with(Behaviour::Echo, delay)
    }

    /// Succeeds with whitespace only
    pub fn blank() -> Arc<Self> {
        Self::with(Behaviour::Blank, Duration::ZERO)
    }

    pub fn failing() -> Arc<Self> {
        Self::with(Behaviour::Fail, Duration::ZERO)
    }

    /// Never answers within any reasonable timeout
    pub fn stalled() -> Arc<Self> {
        Self::with(Behaviour::Stall, Duration::ZERO)
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn snapshots(&self) -> Vec<Vec<Message>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn generate(&self, messages: &[Message]) -> Result<String> {
        self.seen.lock().unwrap().push(messages.to_vec());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.behaviour {
            Behaviour::Echo => {
                let last = messages.last().map(Message::content).unwrap_or_default();
                Ok(format!("re: {last}"))
            }
            Behaviour::Blank => Ok("   ".to_string()),
            Behaviour::Fail => Err(Error::Generation("scripted failure".to_string())),
            Behaviour::Stall => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(String::new())
            }
        }
    }
}

/// Synthesizer producing a short tone, or failing on demand
pub struct ToneSynthesizer {
    fail: bool,
    calls: AtomicUsize,
}

impl ToneSynthesizer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Synthesizer for ToneSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Synthesis("scripted failure".to_string()));
        }
        let samples = sine(440.0, 0.01 * text.len().max(1) as f32, 0.5);
        Ok(SynthesizedAudio {
            wav: samples_to_wav(&samples, SAMPLE_RATE)?,
            sample_rate: SAMPLE_RATE,
        })
    }
}

/// Generate sine wave audio samples
pub fn sine(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// A short spoken-sounding WAV clip
pub fn speech_wav() -> Vec<u8> {
    samples_to_wav(&sine(220.0, 0.25, 0.6), SAMPLE_RATE).unwrap()
}

/// Build a coordinator over the given fakes with a fresh session
pub fn coordinator(
    max_turns: usize,
    transcriber: Arc<ScriptedTranscriber>,
    generator: Arc<RecordingGenerator>,
    synthesizer: Arc<ToneSynthesizer>,
) -> TurnCoordinator {
    let registry = EngineRegistry::new(transcriber, generator, synthesizer);
    TurnCoordinator::new(
        Arc::new(SessionStore::new(max_turns, "You are helpful.")),
        Arc::new(registry),
    )
}
