//! Speech synthesis for written stories.

mod cartesia;
mod pronunciation;

pub use cartesia::CartesiaSynthesizer;
pub use pronunciation::apply_pronunciation_hints;

use crate::error::Result;
use async_trait::async_trait;

/// Turns one transcript into one encoded audio clip.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize a transcript. Implementations apply pronunciation hints themselves.
    async fn synthesize(&self, transcript: &str) -> Result<Vec<u8>>;
}
