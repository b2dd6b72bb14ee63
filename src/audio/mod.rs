//! Audio processing module
//!
//! Handles microphone capture and playback, plus the encoded-clip artifact
//! type exchanged with the STT/TTS services.

mod capture;
mod playback;

pub use capture::{CaptureController, CaptureState, CpalInput, InputBackend, SampleSink};
pub use playback::{AudioPlayback, PlaybackSink};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// A finalized audio artifact: encoded bytes tagged with a MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    /// Encoded audio payload (container format per `mime`)
    pub bytes: Vec<u8>,
    /// MIME type of the payload (e.g. "audio/wav", "audio/mpeg")
    pub mime: String,
}

impl AudioClip {
    /// Wrap WAV-encoded bytes
    #[must_use]
    pub fn wav(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime: "audio/wav".to_string(),
        }
    }

    /// Wrap MP3-encoded bytes
    #[must_use]
    pub fn mp3(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime: "audio/mpeg".to_string(),
        }
    }

    /// Encode as a base64 data URI (`data:<mime>;base64,<payload>`)
    #[must_use]
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, BASE64.encode(&self.bytes))
    }

    /// Decode a base64 data URI back into a clip
    ///
    /// # Errors
    ///
    /// Returns error if the URI is not of the form
    /// `data:<mime>;base64,<payload>` or the payload is not valid base64
    pub fn from_data_uri(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| Error::Audio("data URI missing 'data:' scheme".to_string()))?;

        let (mime, payload) = rest
            .split_once(";base64,")
            .ok_or_else(|| Error::Audio("data URI missing ';base64,' marker".to_string()))?;

        if mime.is_empty() {
            return Err(Error::Audio("data URI missing MIME type".to_string()));
        }

        let bytes = BASE64
            .decode(payload)
            .map_err(|e| Error::Audio(format!("invalid base64 payload: {e}")))?;

        Ok(Self {
            bytes,
            mime: mime.to_string(),
        })
    }
}

/// Convert f32 samples to WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            // Convert f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_round_trip() {
        let clip = AudioClip::wav(vec![1, 2, 3, 4]);
        let uri = clip.to_data_uri();
        assert!(uri.starts_with("data:audio/wav;base64,"));

        let decoded = AudioClip::from_data_uri(&uri).unwrap();
        assert_eq!(decoded, clip);
    }

    #[test]
    fn data_uri_rejects_malformed_input() {
        assert!(AudioClip::from_data_uri("audio/wav;base64,AAAA").is_err());
        assert!(AudioClip::from_data_uri("data:audio/wav,AAAA").is_err());
        assert!(AudioClip::from_data_uri("data:;base64,AAAA").is_err());
        assert!(AudioClip::from_data_uri("data:audio/wav;base64,!!!").is_err());
    }

    #[test]
    fn wav_encoding_produces_riff_header() {
        let samples = vec![0.0f32, 0.5, -0.5, 0.25];
        let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert!(wav.len() > 44);
    }
}
