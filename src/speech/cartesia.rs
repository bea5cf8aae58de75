//! Cartesia text-to-speech client.

use super::{apply_pronunciation_hints, SpeechSynthesizer};
use crate::config::SpeechConfig;
use crate::error::{Result, StorylineError};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, instrument};

#[derive(Serialize)]
struct TtsRequest<'a> {
    model_id: &'a str,
    transcript: &'a str,
    voice: Voice<'a>,
    output_format: OutputFormat,
    speed: &'static str,
    generation_config: GenerationConfig<'a>,
}

#[derive(Serialize)]
struct Voice<'a> {
    mode: &'static str,
    id: &'a str,
}

#[derive(Serialize)]
struct OutputFormat {
    container: &'static str,
    encoding: &'static str,
    sample_rate: u32,
}

#[derive(Serialize)]
struct GenerationConfig<'a> {
    speed: f32,
    volume: f32,
    emotion: &'a str,
}

/// Synthesizes WAV (float PCM) clips through the `/tts/bytes` endpoint.
pub struct CartesiaSynthesizer {
    client: reqwest::Client,
    config: SpeechConfig,
}

impl CartesiaSynthesizer {
    pub fn new(config: SpeechConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl SpeechSynthesizer for CartesiaSynthesizer {
    #[instrument(skip_all, fields(chars = transcript.len()))]
    async fn synthesize(&self, transcript: &str) -> Result<Vec<u8>> {
        let volume = self.config.volume;
        if !(0.0..=1.0).contains(&volume) {
            return Err(StorylineError::InvalidArgument(format!(
                "volume must be between 0.0 and 1.0, got {}",
                volume
            )));
        }

        let prepared = apply_pronunciation_hints(transcript);
        if prepared.is_empty() {
            return Err(StorylineError::InvalidArgument(
                "transcript must not be empty".to_string(),
            ));
        }

        let body = TtsRequest {
            model_id: &self.config.model_id,
            transcript: &prepared,
            voice: Voice {
                mode: "id",
                id: &self.config.voice_id,
            },
            output_format: OutputFormat {
                container: "wav",
                encoding: "pcm_f32le",
                sample_rate: self.config.sample_rate,
            },
            speed: "normal",
            generation_config: GenerationConfig {
                speed: self.config.speed,
                volume,
                emotion: &self.config.emotion,
            },
        };

        let url = format!("{}/tts/bytes", self.config.base_url);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("Cartesia-Version", &self.config.api_version)
            .header("X-API-Key", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| StorylineError::UpstreamSynthesis(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StorylineError::UpstreamSynthesis(format!("{status}: {text}")));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| StorylineError::UpstreamSynthesis(format!("reading body failed: {e}")))?;

        debug!("Received {} bytes of audio", audio.len());
        Ok(audio.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;
    use std::time::Duration;

    fn config(url: &str) -> SpeechConfig {
        SpeechConfig {
            base_url: url.to_string(),
            api_key: "sk_cart".to_string(),
            api_version: "2025-04-16".to_string(),
            model_id: "sonic-3".to_string(),
            voice_id: "voice-1".to_string(),
            volume: 0.8,
            speed: 0.85,
            emotion: "excited".to_string(),
            sample_rate: 44_100,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_synthesize_sends_normalized_transcript() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/tts/bytes")
            .match_header("cartesia-version", "2025-04-16")
            .match_header("x-api-key", "sk_cart")
            .match_header("authorization", "Bearer sk_cart")
            .match_body(Matcher::PartialJson(json!({
                "model_id": "sonic-3",
                "transcript": "The F B I briefed NAY-toh.",
                "voice": { "mode": "id", "id": "voice-1" },
                "output_format": { "container": "wav", "encoding": "pcm_f32le", "sample_rate": 44100 },
                "speed": "normal",
                "generation_config": { "emotion": "excited" }
            })))
            .with_status(200)
            .with_body(b"RIFF....WAVE")
            .create_async()
            .await;

        let synth = CartesiaSynthesizer::new(config(&server.url())).unwrap();
        let audio = synth.synthesize("The FBI  briefed\nNATO.").await.unwrap();

        assert_eq!(audio, b"RIFF....WAVE");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_surfaces_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/tts/bytes")
            .with_status(401)
            .with_body("invalid api key")
            .create_async()
            .await;

        let synth = CartesiaSynthesizer::new(config(&server.url())).unwrap();
        let err = synth.synthesize("hello").await.unwrap_err();

        assert!(matches!(err, StorylineError::UpstreamSynthesis(_)));
        let message = err.to_string();
        assert!(message.contains("401"));
        assert!(message.contains("invalid api key"));
    }

    #[tokio::test]
    async fn test_volume_out_of_range_is_invalid_argument() {
        let mut cfg = config("http://127.0.0.1:9");
        cfg.volume = 1.2;
        let synth = CartesiaSynthesizer::new(cfg).unwrap();
        let err = synth.synthesize("hello").await.unwrap_err();
        assert!(matches!(err, StorylineError::InvalidArgument(_)));
    }
}
