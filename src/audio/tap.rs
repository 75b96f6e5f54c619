use crossbeam_channel::Sender;
use rodio::Source;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Frames buffered before a chunk is handed to the analyser.
const CHUNK_FRAMES: usize = 128;

/// Pass-through source that copies the first channel of whatever is being
/// played to the analyser and counts the frames that went out.
///
/// Setting the shared `disconnected` flag ends the source on its next sample,
/// which is how a pipeline detaches its audio before being torn down.
pub struct AnalysisTap<S> {
    inner: S,
    channels: u16,
    channel_cursor: u16,
    pending: Vec<f32>,
    sender: Sender<Vec<f32>>,
    frames: Arc<AtomicU64>,
    disconnected: Arc<AtomicBool>,
}

impl<S> AnalysisTap<S>
where
    S: Source<Item = f32>,
{
    pub fn new(
        inner: S,
        sender: Sender<Vec<f32>>,
        frames: Arc<AtomicU64>,
        disconnected: Arc<AtomicBool>,
    ) -> Self {
        let channels = inner.channels().max(1);
        Self {
            inner,
            channels,
            channel_cursor: 0,
            pending: Vec::with_capacity(CHUNK_FRAMES),
            sender,
            frames,
            disconnected,
        }
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let chunk = std::mem::replace(&mut self.pending, Vec::with_capacity(CHUNK_FRAMES));
        if self.sender.send(chunk).is_err() {
            // Analyser side is gone; nobody is listening any more
            self.disconnected.store(true, Ordering::Relaxed);
        }
    }
}

impl<S> Iterator for AnalysisTap<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.disconnected.load(Ordering::Relaxed) {
            return None;
        }

        let Some(sample) = self.inner.next() else {
            self.flush();
            return None;
        };

        if self.channel_cursor == 0 {
            self.pending.push(sample);
            self.frames.fetch_add(1, Ordering::Relaxed);
            if self.pending.len() >= CHUNK_FRAMES {
                self.flush();
            }
        }
        self.channel_cursor = (self.channel_cursor + 1) % self.channels;

        Some(sample)
    }
}

impl<S> Source for AnalysisTap<S>
where
    S: Source<Item = f32>,
{
    fn current_frame_len(&self) -> Option<usize> {
        self.inner.current_frame_len()
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }
}
