//! Configuration module for Storyline.
//!
//! Handles loading application settings and prompt templates, and turning them
//! into the validated configuration a pipeline run is constructed with.

mod pipeline;
mod prompts;
mod settings;

pub use pipeline::{GenerationConfig, PipelineConfig, SpeechConfig, StorageConfig};
pub use prompts::{PlannerPrompts, Prompts, WriterPrompts};
pub use settings::{
    AudioSettings, GeneralSettings, LlmSettings, PromptSettings, RemoteSettings, RunOverrides,
    ServerSettings, Settings, SpeechSettings, StorageSettings,
};
