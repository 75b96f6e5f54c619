use async_trait::async_trait;
use rodio::{Decoder, Source};
use std::io::Cursor;
use std::sync::Arc;

use crate::error::{StageError, StageResult};

/// Fully decoded track, interleaved `f32` samples.
#[derive(Debug, Clone)]
pub struct DecodedTrack {
    pub samples: Arc<[f32]>,
    pub channels: u16,
    pub sample_rate: u32,
    pub duration_seconds: f64,
}

impl DecodedTrack {
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// First channel only, the signal the analyser listens to.
    pub fn first_channel(&self) -> Arc<[f32]> {
        self.samples
            .iter()
            .step_by(self.channels.max(1) as usize)
            .copied()
            .collect()
    }
}

/// Turns raw file bytes into a sample buffer.
///
/// Implementations fail asynchronously on malformed input; callers report the
/// failure and do not retry.
#[async_trait]
pub trait AudioDecoder {
    async fn decode(&self, bytes: Vec<u8>) -> StageResult<DecodedTrack>;
}

/// Decodes anything rodio's decoders understand, off the async executor.
#[derive(Debug, Default, Clone, Copy)]
pub struct RodioDecoder;

impl RodioDecoder {
    fn decode_blocking(bytes: Vec<u8>) -> StageResult<DecodedTrack> {
        let source = Decoder::new(Cursor::new(bytes)).map_err(|e| StageError::Decode(e.to_string()))?;

        let channels = source.channels();
        let sample_rate = source.sample_rate();
        if channels == 0 || sample_rate == 0 {
            return Err(StageError::Decode(format!(
                "unsupported stream layout ({} channels at {}Hz)",
                channels, sample_rate
            )));
        }

        let samples: Vec<f32> = source.convert_samples::<f32>().collect();
        if samples.is_empty() {
            return Err(StageError::Decode("stream contains no audio frames".to_string()));
        }

        let frames = samples.len() / channels as usize;
        Ok(DecodedTrack {
            samples: samples.into(),
            channels,
            sample_rate,
            duration_seconds: frames as f64 / sample_rate as f64,
        })
    }
}

#[async_trait]
impl AudioDecoder for RodioDecoder {
    async fn decode(&self, bytes: Vec<u8>) -> StageResult<DecodedTrack> {
        tokio::task::spawn_blocking(move || Self::decode_blocking(bytes))
            .await
            .map_err(|e| StageError::Decode(format!("decoder task failed: {}", e)))?
    }
}
