//! Text-to-speech (TTS) via the system speech engine

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::OnceCell;

use super::{decode_wav, samples_to_wav, silence_wav};
use crate::config::TtsConfig;
use crate::engine::{Capability, SynthesizedAudio, Synthesizer};
use crate::{Error, Result};

/// Speech engine binaries, in order of preference
const ENGINE_BINARIES: &[&str] = &["espeak-ng", "espeak"];

/// Sample rate used for the silent clip returned for empty text
const SILENCE_SAMPLE_RATE: u32 = 22_050;

/// Length of the silent clip returned for empty text
const SILENCE_MILLIS: u32 = 100;

/// Synthesizes speech with `espeak-ng` (or `espeak`)
pub struct SystemVoice {
    rate: u32,
    voice: Option<String>,
    binary: Option<PathBuf>,
    /// Voice identifier matched from `voice`, resolved on first use
    resolved_voice: OnceCell<Option<String>>,
}

impl SystemVoice {
    const VARIANT: &'static str = "system";

    /// Create a synthesizer speaking at `rate` words per minute
    #[must_use]
    pub fn new(rate: u32, voice: Option<String>) -> Self {
        Self {
            rate,
            voice,
            binary: None,
            resolved_voice: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn from_config(config: &TtsConfig) -> Self {
        Self::new(config.rate, config.voice.clone())
    }

    /// Use an explicit engine binary instead of searching `PATH`
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    fn locate_binary(&self) -> Result<PathBuf> {
        if let Some(binary) = &self.binary {
            return Ok(binary.clone());
        }
        ENGINE_BINARIES
            .iter()
            .find_map(|name| which::which(name).ok())
            .ok_or_else(|| {
                Error::unreachable(
                    Capability::Synthesis,
                    Self::VARIANT,
                    "no espeak-ng or espeak binary on PATH",
                )
            })
    }

    /// Find the first installed voice whose name contains the configured selector
    async fn voice_id(&self, binary: &Path) -> Option<String> {
        let selector = self.voice.as_deref()?;
        self.resolved_voice
            .get_or_init(|| async {
                let output = match Command::new(binary).arg("--voices").output().await {
                    Ok(output) => output,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to list voices");
                        return None;
                    }
                };
                let listing = String::from_utf8_lossy(&output.stdout);
                let matched = match_voice(&listing, selector);
                if matched.is_none() {
                    tracing::warn!(selector, "no installed voice matches, using engine default");
                }
                matched
            })
            .await
            .clone()
    }
}

/// Match `selector` case-insensitively against the voice name column of
/// `espeak --voices` output, returning the voice identifier to pass to `-v`
fn match_voice(listing: &str, selector: &str) -> Option<String> {
    let selector = selector.to_lowercase();
    listing
        .lines()
        .skip(1)
        .filter_map(|line| {
            // Pty Language Age/Gender VoiceName File Other
            let mut columns = line.split_whitespace();
            let name = columns.nth(3)?;
            Some(name.to_string())
        })
        .find(|name| name.to_lowercase().contains(&selector))
}

#[async_trait]
impl Synthesizer for SystemVoice {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio> {
        if text.trim().is_empty() {
            return Ok(SynthesizedAudio {
                wav: silence_wav(SILENCE_SAMPLE_RATE, SILENCE_MILLIS)?,
                sample_rate: SILENCE_SAMPLE_RATE,
            });
        }

        let binary = self.locate_binary()?;
        let voice = self.voice_id(&binary).await;

        tracing::debug!(
            binary = %binary.display(),
            rate = self.rate,
            voice = ?voice,
            chars = text.len(),
            "starting synthesis"
        );

        let mut command = Command::new(&binary);
        command
            .arg("-s")
            .arg(self.rate.to_string())
            .arg("--stdout");
        if let Some(voice) = &voice {
            command.arg("-v").arg(voice);
        }

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::unreachable(Capability::Synthesis, Self::VARIANT, e))?;

        // Text goes through stdin so it is never parsed as options. Feed it
        // while draining stdout, or a long reply fills the pipe and stalls.
        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(text.as_bytes()).await?;
                stdin.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output.map_err(|e| Error::Synthesis(format!("speech engine failed: {e}")))?;
        // An engine that exits early also breaks the stdin pipe; report the exit first
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(status = %output.status, stderr = %stderr, "speech engine failed");
            return Err(Error::Synthesis(format!(
                "speech engine exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        fed.map_err(|e| Error::Synthesis(format!("failed to feed speech engine: {e}")))?;

        let decoded = decode_wav(&output.stdout)
            .map_err(|e| Error::Synthesis(format!("unreadable engine output: {e}")))?;
        let wav = samples_to_wav(&decoded.samples, decoded.sample_rate)?;

        tracing::info!(
            bytes = wav.len(),
            sample_rate = decoded.sample_rate,
            "synthesis complete"
        );

        Ok(SynthesizedAudio {
            wav,
            sample_rate: decoded.sample_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::WAV_HEADER_LEN;

    const LISTING: &str = "\
Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  af              --/M      Afrikaans          gmw/af
 5  en-gb           --/M      English_(Great_Britain) gmw/en
 2  en-us           --/M      English_(America)  gmw/en-US            (en 3)
";

    #[test]
    fn voice_matches_by_substring() {
        assert_eq!(
            match_voice(LISTING, "america"),
            Some("English_(America)".to_string())
        );
        assert_eq!(
            match_voice(LISTING, "ENGLISH"),
            Some("English_(Great_Britain)".to_string())
        );
        assert_eq!(match_voice(LISTING, "klingon"), None);
    }

    #[test]
    fn header_line_is_ignored() {
        assert_eq!(match_voice(LISTING, "VoiceName"), None);
    }

    #[tokio::test]
    async fn empty_text_yields_silent_canonical_wav() {
        let voice = SystemVoice::new(170, None).with_binary("/nonexistent/espeak");
        let audio = voice.synthesize("  ").await.unwrap();

        assert_eq!(audio.sample_rate, SILENCE_SAMPLE_RATE);
        assert_eq!(&audio.wav[0..4], b"RIFF");
        assert_eq!(audio.wav.len(), WAV_HEADER_LEN + 2 * 2205);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn engine_exiting_early_is_a_synthesis_failure() {
        // Exits without reading stdin, so a long text hits a closed pipe
        let text = "hello ".repeat(50_000);
        for binary in ["false", "true"] {
            let voice = SystemVoice::new(170, None).with_binary(binary);
            let err = voice.synthesize(&text).await.unwrap_err();
            assert!(matches!(err, Error::Synthesis(_)), "{binary}: {err:?}");
        }
    }

    #[tokio::test]
    async fn missing_binary_is_unreachable() {
        let voice = SystemVoice::new(170, None).with_binary("/nonexistent/espeak");
        let err = voice.synthesize("hello").await.unwrap_err();
        assert!(matches!(
            err,
            Error::EngineUnreachable {
                capability: Capability::Synthesis,
                ..
            }
        ));
    }
}
