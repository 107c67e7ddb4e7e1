//! Voice processing module
//!
//! Speech recognition and synthesis variants plus the WAV helpers for the
//! audio boundary formats. Transcribers receive caller-supplied mono PCM
//! as-is (no resampling); synthesizers hand back canonical 16-bit mono WAV.

mod stt;
mod tts;
mod wav;

pub use stt::{GoogleSpeech, LocalWhisper};
pub use tts::SystemVoice;
pub use wav::{
    DecodedAudio, WAV_HEADER_LEN, canonicalize_wav, decode_wav, pcm16_to_wav, rms_energy,
    samples_to_wav, silence_wav,
};
