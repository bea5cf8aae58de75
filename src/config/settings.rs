//! Configuration settings for Storyline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub llm: LlmSettings,
    pub speech: SpeechSettings,
    pub audio: AudioSettings,
    pub storage: StorageSettings,
    pub remote: RemoteSettings,
    pub server: ServerSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Root directory that receives one sub-directory per run.
    pub output_dir: String,
    /// Directory for scratch files used by the audio tool.
    pub temp_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            output_dir: "output".to_string(),
            temp_dir: std::env::temp_dir()
                .join("storyline")
                .to_string_lossy()
                .into_owned(),
            log_level: "warn".to_string(),
        }
    }
}

/// Language-model gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Base URL of the OpenAI-compatible gateway. The provider is appended as a path segment.
    pub gateway_url: String,
    /// Model identifier. `gateway/{provider}:{model}` selects the provider inline.
    pub model: String,
    /// Upstream provider routed through the gateway.
    pub provider: String,
    /// Gateway credential. Usually supplied through `GATEWAY_API_KEY`.
    pub api_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            gateway_url: "https://gateway.pydantic.dev/proxy".to_string(),
            model: "gateway/openai:gpt-5.2".to_string(),
            provider: "openai".to_string(),
            api_key: None,
            timeout_seconds: 300,
        }
    }
}

/// Speech synthesis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_version: String,
    pub model_id: String,
    pub voice_id: String,
    /// Output volume, 0.0 to 1.0.
    pub volume: f32,
    pub speed: f32,
    pub emotion: String,
    pub sample_rate: u32,
    pub timeout_seconds: u64,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.cartesia.ai".to_string(),
            api_key: None,
            api_version: "2025-04-16".to_string(),
            model_id: "sonic-3".to_string(),
            voice_id: "79f8b5fb-2cc8-479a-80df-29f7a7cf1a3e".to_string(),
            volume: 0.8,
            speed: 0.85,
            emotion: "excited".to_string(),
            sample_rate: 44_100,
            timeout_seconds: 90,
        }
    }
}

/// Audio tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// ffmpeg executable name or path.
    pub ffmpeg_path: String,
    /// Silence inserted between consecutive story clips, in seconds.
    pub gap_seconds: f64,
    pub sample_rate: u32,
    /// Container of the combined reel.
    pub output_format: String,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            gap_seconds: 0.8,
            sample_rate: 44_100,
            output_format: "wav".to_string(),
        }
    }
}

/// Object storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Region code (`ny`, `la`, ...) or full storage host name.
    pub region: String,
    pub zone: String,
    pub access_key: Option<String>,
    /// Path prefix under the zone for uploaded reels.
    pub prefix: String,
    /// Overrides the computed `https://{host}` endpoint, e.g. for a local mirror.
    pub endpoint: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            region: String::new(),
            zone: String::new(),
            access_key: None,
            prefix: "audio".to_string(),
            endpoint: None,
            timeout_seconds: 120,
        }
    }
}

/// Remote sandbox execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    /// Launcher command and leading arguments.
    pub launcher: Vec<String>,
    /// Working directory for the launcher. Defaults to the current directory.
    pub working_dir: Option<String>,
    pub token: Option<String>,
    /// Stable sandbox name so repeated runs reuse one instance.
    pub name: String,
    pub git_repo: String,
    pub git_ref: Option<String>,
    /// Keep the sandbox alive after the run.
    pub keep: bool,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            launcher: vec!["node".to_string(), "scripts/run_in_sprite.mjs".to_string()],
            working_dir: None,
            token: None,
            name: "storyline-main".to_string(),
            git_repo: String::new(),
            git_ref: None,
            keep: true,
        }
    }
}

/// Web form server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        Ok(settings.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Overlay values from environment variables onto the loaded file settings.
    ///
    /// Blank values are ignored so an exported-but-empty variable does not wipe a
    /// value from the config file.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get("GATEWAY_API_KEY").or_else(|| get("PYDANTIC_AI_GATEWAY_API_KEY")) {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = get("GATEWAY_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = get("GATEWAY_PROVIDER") {
            self.llm.provider = v;
        }
        if let Some(v) = get("CARTESIA_API_KEY") {
            self.speech.api_key = Some(v);
        }
        if let Some(v) = get("BUNNY_STORAGE_REGION") {
            self.storage.region = v;
        }
        if let Some(v) = get("BUNNY_STORAGE_ZONE") {
            self.storage.zone = v;
        }
        if let Some(v) = get("BUNNY_STORAGE_ACCESS_KEY") {
            self.storage.access_key = Some(v);
        }
        if let Some(v) = get("BUNNY_STORAGE_PREFIX") {
            self.storage.prefix = v.trim_matches('/').to_string();
        }
        if let Some(v) = get("SPRITES_TOKEN").or_else(|| get("SPRITE_TOKEN")) {
            self.remote.token = Some(v);
        }
        if let Some(v) = get("SPRITE_NAME") {
            self.remote.name = v;
        }
        if let Some(v) = get("SPRITE_GIT_REPO") {
            self.remote.git_repo = v;
        }
        if let Some(v) = get("SPRITE_GIT_REF") {
            self.remote.git_ref = Some(v);
        }

        self
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::StorylineError::Configuration(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("storyline")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded output directory path.
    pub fn output_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.output_dir)
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }
}

/// Per-run values supplied by a front-end, applied on top of file and environment.
///
/// `None` and blank values leave the underlying setting untouched.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub model: Option<String>,
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub cartesia_api_key: Option<String>,
    pub output_dir: Option<String>,
}

impl RunOverrides {
    pub fn apply(self, mut settings: Settings) -> Settings {
        fn filled(value: Option<String>) -> Option<String> {
            value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        }

        if let Some(v) = filled(self.model) {
            settings.llm.model = v;
        }
        if let Some(v) = filled(self.provider) {
            settings.llm.provider = v;
        }
        if let Some(v) = filled(self.api_key) {
            settings.llm.api_key = Some(v);
        }
        if let Some(v) = filled(self.cartesia_api_key) {
            settings.speech.api_key = Some(v);
        }
        if let Some(v) = filled(self.output_dir) {
            settings.general.output_dir = v;
        }
        settings
    }
}
