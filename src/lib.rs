//! Parley - Spoken multi-turn conversation gateway
//!
//! This library provides the core of a voice assistant turn loop:
//! - Speech recognition through interchangeable recognizers
//! - Reply generation over a bounded conversation memory
//! - Speech synthesis back to canonical WAV
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Interfaces                        │
//! │          HTTP API (axum)   │   CLI (clap)            │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Turn Coordinator                     │
//! │   transcribe  →  reply  →  speak   (timeout/cancel) │
//! └──────────┬─────────────────────────────┬────────────┘
//!            │                             │
//! ┌──────────▼──────────┐   ┌──────────────▼────────────┐
//! │   Session Store     │   │     Engine Registry       │
//! │ directive + 2N msgs │   │  STT  │  LLM  │  TTS      │
//! └─────────────────────┘   └───────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod llm;
pub mod session;
pub mod turn;
pub mod voice;

pub use config::Config;
pub use engine::{
    Capability, EngineRegistry, Generator, GeneratorKind, SynthesizedAudio, Synthesizer,
    SynthesizerKind, Transcriber, TranscriberKind, Transcription, Variant,
};
pub use error::{Error, Result};
pub use session::{Message, Role, SessionStore};
pub use turn::{InvokeOptions, TurnCoordinator, TurnResult};
