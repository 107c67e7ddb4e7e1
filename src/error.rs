//! Error types for Parley

use thiserror::Error;

use crate::engine::Capability;

/// Result type alias for Parley operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a conversational turn
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The selected variant's backing service or local resource cannot be invoked
    #[error("{capability} engine '{variant}' unreachable: {reason}")]
    EngineUnreachable {
        capability: Capability,
        variant: &'static str,
        reason: String,
    },

    /// The generator failed or produced no content
    #[error("generation failed: {0}")]
    Generation(String),

    /// The synthesizer failed to produce audio
    #[error("synthesis failed: {0}")]
    Synthesis(String),

    /// An engine call exceeded its invocation timeout
    #[error("{capability} engine '{variant}' timed out")]
    Timeout {
        capability: Capability,
        variant: &'static str,
    },

    /// An engine call was cancelled by the caller
    #[error("{capability} invocation cancelled")]
    Cancelled { capability: Capability },

    /// Audio decoding or encoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build an [`Error::EngineUnreachable`] from any displayable cause
    pub fn unreachable(
        capability: Capability,
        variant: &'static str,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::EngineUnreachable {
            capability,
            variant,
            reason: reason.to_string(),
        }
    }

    /// Capability this failure belongs to, if any
    #[must_use]
    pub const fn capability(&self) -> Option<Capability> {
        match self {
            Self::EngineUnreachable { capability, .. }
            | Self::Timeout { capability, .. }
            | Self::Cancelled { capability } => Some(*capability),
            Self::Generation(_) => Some(Capability::Generation),
            Self::Synthesis(_) => Some(Capability::Synthesis),
            _ => None,
        }
    }
}
