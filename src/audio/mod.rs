//! Audio assembly: silence padding and clip combination.
//!
//! The heavy lifting is done by ffmpeg; this module owns the scratch files and
//! the rules for how story clips are stitched into one reel.

mod ffmpeg;

pub use ffmpeg::FfmpegAudio;

use crate::error::Result;
use async_trait::async_trait;

/// External audio tool operations.
#[async_trait]
pub trait AudioProcessor: Send + Sync {
    /// Render a silent mono clip. `duration_seconds` must be positive.
    async fn silence(&self, duration_seconds: f64) -> Result<Vec<u8>>;

    /// Concatenate at least two clips into one loudness-normalized clip.
    async fn combine(&self, segments: &[Vec<u8>]) -> Result<Vec<u8>>;
}

/// Result of assembling the story clips of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioAssembly {
    /// No clips were produced.
    Empty,
    /// A single clip, used as is.
    PassThrough(Vec<u8>),
    /// Two or more clips combined by the audio tool.
    Combined(Vec<u8>),
}

impl AudioAssembly {
    /// The final audio bytes, if any.
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            AudioAssembly::Empty => None,
            AudioAssembly::PassThrough(bytes) | AudioAssembly::Combined(bytes) => Some(bytes),
        }
    }
}

/// Assemble ordered segments: combine two or more, pass a single one through.
pub async fn assemble(audio: &dyn AudioProcessor, mut segments: Vec<Vec<u8>>) -> Result<AudioAssembly> {
    match segments.len() {
        0 => Ok(AudioAssembly::Empty),
        1 => Ok(AudioAssembly::PassThrough(segments.remove(0))),
        _ => Ok(AudioAssembly::Combined(audio.combine(&segments).await?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingAudio {
        combines: AtomicUsize,
    }

    #[async_trait]
    impl AudioProcessor for CountingAudio {
        async fn silence(&self, _duration_seconds: f64) -> Result<Vec<u8>> {
            Ok(vec![0])
        }

        async fn combine(&self, segments: &[Vec<u8>]) -> Result<Vec<u8>> {
            self.combines.fetch_add(1, Ordering::SeqCst);
            Ok(segments.concat())
        }
    }

    #[tokio::test]
    async fn test_empty_and_single_skip_the_tool() {
        let audio = CountingAudio::default();

        assert_eq!(assemble(&audio, vec![]).await.unwrap(), AudioAssembly::Empty);
        assert_eq!(
            assemble(&audio, vec![vec![7, 7]]).await.unwrap(),
            AudioAssembly::PassThrough(vec![7, 7])
        );
        assert_eq!(audio.combines.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_two_or_more_are_combined_once() {
        let audio = CountingAudio::default();
        let result = assemble(&audio, vec![vec![1], vec![2], vec![3]]).await.unwrap();

        assert_eq!(result, AudioAssembly::Combined(vec![1, 2, 3]));
        assert_eq!(audio.combines.load(Ordering::SeqCst), 1);
        assert_eq!(result.into_bytes(), Some(vec![1, 2, 3]));
    }
}
