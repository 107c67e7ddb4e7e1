//! WAV encoding and decoding helpers

use std::io::Cursor;

use crate::{Error, Result};

/// Size of the canonical RIFF/WAVE header for 16-bit PCM
pub const WAV_HEADER_LEN: usize = 44;

/// PCM audio decoded from a WAV container
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Samples normalized to [-1.0, 1.0], mixed down to mono
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Channel count of the source container
    pub channels: u16,
}

impl DecodedAudio {
    /// Duration in seconds
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Convert f32 samples to mono 16-bit WAV bytes
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    #[allow(clippy::cast_possible_truncation)]
    let pcm: Vec<i16> = samples
        .iter()
        .map(|&s| (s * 32767.0).clamp(-32768.0, 32767.0) as i16)
        .collect();
    pcm16_to_wav(&pcm, sample_rate)
}

/// Wrap 16-bit mono samples in a canonical WAV container
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn pcm16_to_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(WAV_HEADER_LEN + samples.len() * 2));
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// Silent canonical WAV of the given length
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn silence_wav(sample_rate: u32, millis: u32) -> Result<Vec<u8>> {
    let len = u64::from(sample_rate) * u64::from(millis) / 1000;
    let len = usize::try_from(len).map_err(|e| Error::Audio(e.to_string()))?;
    pcm16_to_wav(&vec![0; len], sample_rate)
}

/// Decode WAV bytes to mono f32 samples
///
/// Streamed WAV output often carries a placeholder data length; decoding
/// stops quietly at the real end of data.
///
/// # Errors
///
/// Returns error if the bytes are not a readable WAV container
#[allow(clippy::cast_precision_loss)]
pub fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio> {
    let mut reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| Error::Audio(e.to_string()))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => collect_samples(reader.samples::<f32>())?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            collect_samples(reader.samples::<i32>())?
                .into_iter()
                .map(|s| s as f32 / scale)
                .collect()
        }
    };

    let channels = usize::from(spec.channels.max(1));
    let samples = if channels == 1 {
        interleaved
    } else {
        let divisor = channels as f32;
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / divisor)
            .collect()
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

fn collect_samples<S>(iter: impl Iterator<Item = hound::Result<S>>) -> Result<Vec<S>> {
    let mut out = Vec::new();
    for sample in iter {
        match sample {
            Ok(s) => out.push(s),
            // Reads come from an in-memory cursor, so IO errors only mean end of data
            Err(hound::Error::IoError(_)) => break,
            Err(e) => return Err(Error::Audio(e.to_string())),
        }
    }
    Ok(out)
}

/// Re-encode any readable WAV as canonical mono 16-bit PCM at its own rate
///
/// # Errors
///
/// Returns error if the input cannot be decoded
pub fn canonicalize_wav(bytes: &[u8]) -> Result<Vec<u8>> {
    let decoded = decode_wav(bytes)?;
    samples_to_wav(&decoded.samples, decoded.sample_rate)
}

/// Root-mean-square energy of the samples
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}
