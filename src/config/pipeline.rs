//! Validated configuration for a single pipeline run.
//!
//! Front-ends merge the config file, environment and their own inputs into
//! [`Settings`], then build a [`PipelineConfig`] from it. Missing credentials are
//! reported here, before any external call is made.

use super::{AudioSettings, Prompts, Settings};
use crate::error::{Result, StorylineError};
use std::path::PathBuf;
use std::time::Duration;

/// Language-model gateway configuration.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub gateway_url: String,
    pub model: String,
    pub provider: String,
    pub api_key: String,
    pub timeout: Duration,
}

/// Speech synthesis configuration.
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_version: String,
    pub model_id: String,
    pub voice_id: String,
    pub volume: f32,
    pub speed: f32,
    pub emotion: String,
    pub sample_rate: u32,
    pub timeout: Duration,
}

/// Object storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub region: String,
    pub zone: String,
    pub access_key: String,
    pub prefix: String,
    pub endpoint: Option<String>,
    pub timeout: Duration,
}

/// Everything the orchestrator needs, resolved up front.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub generation: GenerationConfig,
    /// Present only when audio was requested.
    pub speech: Option<SpeechConfig>,
    /// Present only when audio was requested.
    pub storage: Option<StorageConfig>,
    pub audio: AudioSettings,
    pub prompts: Prompts,
    pub output_dir: PathBuf,
    pub temp_dir: PathBuf,
}

impl PipelineConfig {
    /// Build a run configuration, failing with [`StorylineError::Configuration`] on
    /// any missing credential or setting.
    pub fn from_settings(settings: &Settings, with_audio: bool) -> Result<Self> {
        let api_key = non_empty(settings.llm.api_key.as_deref()).ok_or_else(|| {
            StorylineError::Configuration(
                "Missing API key. Set GATEWAY_API_KEY or pass --api-key.".to_string(),
            )
        })?;

        if settings.llm.model.trim().is_empty() {
            return Err(StorylineError::Configuration("Model must not be empty".to_string()));
        }

        let generation = GenerationConfig {
            gateway_url: settings.llm.gateway_url.trim_end_matches('/').to_string(),
            model: settings.llm.model.trim().to_string(),
            provider: settings.llm.provider.trim().to_string(),
            api_key,
            timeout: Duration::from_secs(settings.llm.timeout_seconds),
        };

        let (speech, storage) = if with_audio {
            (Some(speech_config(settings)?), Some(storage_config(settings)?))
        } else {
            (None, None)
        };

        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        Ok(Self {
            generation,
            speech,
            storage,
            audio: settings.audio.clone(),
            prompts,
            output_dir: settings.output_dir(),
            temp_dir: settings.temp_dir(),
        })
    }

    /// Whether the audio stages will run.
    pub fn with_audio(&self) -> bool {
        self.speech.is_some() && self.storage.is_some()
    }
}

fn speech_config(settings: &Settings) -> Result<SpeechConfig> {
    let api_key = non_empty(settings.speech.api_key.as_deref()).ok_or_else(|| {
        StorylineError::Configuration(
            "Audio requested, but CARTESIA_API_KEY is missing.".to_string(),
        )
    })?;

    if !(0.0..=1.0).contains(&settings.speech.volume) {
        return Err(StorylineError::Configuration(format!(
            "speech.volume must be between 0.0 and 1.0, got {}",
            settings.speech.volume
        )));
    }

    Ok(SpeechConfig {
        base_url: settings.speech.base_url.trim_end_matches('/').to_string(),
        api_key,
        api_version: settings.speech.api_version.clone(),
        model_id: settings.speech.model_id.clone(),
        voice_id: settings.speech.voice_id.clone(),
        volume: settings.speech.volume,
        speed: settings.speech.speed,
        emotion: settings.speech.emotion.clone(),
        sample_rate: settings.speech.sample_rate,
        timeout: Duration::from_secs(settings.speech.timeout_seconds),
    })
}

fn storage_config(settings: &Settings) -> Result<StorageConfig> {
    let storage = &settings.storage;
    let access_key = non_empty(storage.access_key.as_deref());

    match (
        non_empty(Some(&storage.region)),
        non_empty(Some(&storage.zone)),
        access_key,
    ) {
        (Some(region), Some(zone), Some(access_key)) => Ok(StorageConfig {
            region,
            zone,
            access_key,
            prefix: storage.prefix.trim_matches('/').to_string(),
            endpoint: storage.endpoint.clone(),
            timeout: Duration::from_secs(storage.timeout_seconds),
        }),
        _ => Err(StorylineError::Configuration(
            "Audio requested, but upload configuration is missing. \
             Set BUNNY_STORAGE_REGION, BUNNY_STORAGE_ZONE, and BUNNY_STORAGE_ACCESS_KEY."
                .to_string(),
        )),
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
