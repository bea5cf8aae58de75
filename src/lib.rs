//! Storyline - topic to stories to audio reel
//!
//! Turns a single topic into three short written news stories and, optionally,
//! one narrated and uploaded audio reel.
//!
//! # Overview
//!
//! A run goes through these stages:
//! - Plan three story ideas with a language model
//! - Write one story per idea, in plan order
//! - Save the plan and stories into a fresh run directory
//! - Optionally narrate each story, pad the clips with silence, combine them
//!   and upload the reel to object storage
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Settings, prompt templates and validated run configuration
//! - `story` - Story data types and the language-model generator
//! - `speech` - Pronunciation hints and speech synthesis
//! - `audio` - Silence rendering and clip combination
//! - `storage` - Object storage uploads
//! - `persist` - Run directories and artifact files
//! - `orchestrator` - Pipeline coordination and progress reporting
//! - `remote` - Running the pipeline through an external sandbox launcher
//!
//! # Example
//!
//! ```rust,no_run
//! use storyline::config::{PipelineConfig, Settings};
//! use storyline::orchestrator::{NoProgress, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let config = PipelineConfig::from_settings(&settings, false)?;
//!     let orchestrator = Orchestrator::new(config)?;
//!
//!     let outcome = orchestrator.run("coral reef bleaching", &NoProgress).await?;
//!     println!("Saved to {}", outcome.run_dir.display());
//!
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod openai;
pub mod orchestrator;
pub mod persist;
pub mod remote;
pub mod speech;
pub mod storage;
pub mod story;

pub use error::{Result, StorylineError};
