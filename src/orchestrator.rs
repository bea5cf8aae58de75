//! Pipeline orchestrator for Storyline.
//!
//! Coordinates the whole run: plan, write, persist and, when audio is
//! requested, synthesize, assemble, persist and upload the reel. Stages run one
//! after another; the first failure ends the run and is returned unchanged.

use crate::audio::{assemble, AudioProcessor, FfmpegAudio};
use crate::config::PipelineConfig;
use crate::error::{Result, StorylineError};
use crate::persist::{OutputPersister, AUDIO_FILE};
use crate::speech::{CartesiaSynthesizer, SpeechSynthesizer};
use crate::storage::{BunnyStorage, ObjectStore, DEFAULT_CONTENT_TYPE};
use crate::story::{GatewayStoryGenerator, StoryGenerator, StoryPlan, WrittenStories, STORY_COUNT};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Planning,
    Writing,
    Persisting,
    SynthesizingAudio,
    Uploading,
}

impl PipelineStage {
    /// Human-readable label shown by front-ends.
    pub fn label(&self) -> String {
        match self {
            PipelineStage::Planning => format!("Generating {} story ideas", STORY_COUNT),
            PipelineStage::Writing => format!("Writing {} stories", STORY_COUNT),
            PipelineStage::Persisting => "Saving output files".to_string(),
            PipelineStage::SynthesizingAudio => {
                format!("Synthesizing {} story clips", STORY_COUNT)
            }
            PipelineStage::Uploading => "Uploading combined audio".to_string(),
        }
    }
}

/// A stage transition reported to the front-end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    /// 1-based step number.
    pub step: usize,
    pub total: usize,
    pub stage: PipelineStage,
    pub label: String,
}

/// Receives progress notifications.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: &Progress);
}

impl<F> ProgressSink for F
where
    F: Fn(&Progress) + Send + Sync,
{
    fn report(&self, progress: &Progress) {
        self(progress)
    }
}

/// Sink that ignores progress.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: &Progress) {}
}

/// The saved and uploaded reel of a run.
#[derive(Debug, Clone, Serialize)]
pub struct AudioArtifact {
    pub path: PathBuf,
    pub url: String,
    /// Number of per-story clips in the reel.
    pub clips: usize,
}

/// Result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub plan: StoryPlan,
    pub written: WrittenStories,
    pub run_dir: PathBuf,
    pub audio: Option<AudioArtifact>,
}

/// Emits progress and enforces forward-only stage order.
struct StageTracker<'a> {
    sink: &'a dyn ProgressSink,
    total: usize,
    step: usize,
    current: Option<PipelineStage>,
}

impl<'a> StageTracker<'a> {
    fn new(sink: &'a dyn ProgressSink, total: usize) -> Self {
        Self {
            sink,
            total,
            step: 0,
            current: None,
        }
    }

    fn enter(&mut self, stage: PipelineStage) {
        debug_assert!(self.current.map_or(true, |c| c < stage));
        self.step += 1;
        self.current = Some(stage);
        let progress = Progress {
            step: self.step,
            total: self.total,
            stage,
            label: stage.label(),
        };
        info!("Step {}/{}: {}", progress.step, progress.total, progress.label);
        self.sink.report(&progress);
    }
}

/// The main orchestrator for the Storyline pipeline.
pub struct Orchestrator {
    config: PipelineConfig,
    generator: Arc<dyn StoryGenerator>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    audio: Arc<dyn AudioProcessor>,
    store: Option<Arc<dyn ObjectStore>>,
    persister: OutputPersister,
}

impl Orchestrator {
    /// Create an orchestrator wired to the real services.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let generator: Arc<dyn StoryGenerator> = Arc::new(
            GatewayStoryGenerator::new(&config.generation)?.with_prompts(config.prompts.clone()),
        );

        let speech: Option<Arc<dyn SpeechSynthesizer>> = match &config.speech {
            Some(speech) => Some(Arc::new(CartesiaSynthesizer::new(speech.clone())?)),
            None => None,
        };

        let store: Option<Arc<dyn ObjectStore>> = match &config.storage {
            Some(storage) => Some(Arc::new(BunnyStorage::new(storage)?)),
            None => None,
        };

        let audio: Arc<dyn AudioProcessor> =
            Arc::new(FfmpegAudio::new(&config.audio, &config.temp_dir));

        Ok(Self::with_components(config, generator, speech, audio, store))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        config: PipelineConfig,
        generator: Arc<dyn StoryGenerator>,
        speech: Option<Arc<dyn SpeechSynthesizer>>,
        audio: Arc<dyn AudioProcessor>,
        store: Option<Arc<dyn ObjectStore>>,
    ) -> Self {
        let persister = OutputPersister::new(config.output_dir.clone());
        Self {
            config,
            generator,
            speech,
            audio,
            store,
            persister,
        }
    }

    /// Whether this orchestrator will run the audio stages.
    pub fn with_audio(&self) -> bool {
        self.speech.is_some() && self.store.is_some()
    }

    /// Number of progress steps a run reports.
    pub fn total_steps(&self) -> usize {
        if self.with_audio() {
            5
        } else {
            3
        }
    }

    /// Run the full pipeline for one topic.
    #[instrument(skip(self, progress))]
    pub async fn run(&self, topic: &str, progress: &dyn ProgressSink) -> Result<PipelineOutcome> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(StorylineError::InvalidArgument("Enter a topic.".to_string()));
        }

        let mut tracker = StageTracker::new(progress, self.total_steps());
        let result = self.run_stages(topic, &mut tracker).await;

        match &result {
            Ok(outcome) => info!("Run finished: {}", outcome.run_dir.display()),
            Err(e) => error!(stage = ?tracker.current, "Run failed: {}", e),
        }

        result
    }

    async fn run_stages(&self, topic: &str, tracker: &mut StageTracker<'_>) -> Result<PipelineOutcome> {
        tracker.enter(PipelineStage::Planning);
        let plan = self.generator.plan(topic).await?;

        tracker.enter(PipelineStage::Writing);
        let written = self.generator.write(&plan).await?;

        tracker.enter(PipelineStage::Persisting);
        let run_dir = self.persister.save(&plan, &written)?;

        let audio = match (&self.speech, &self.store) {
            (Some(speech), Some(store)) => {
                self.produce_audio(speech.as_ref(), store.as_ref(), &written, &run_dir, tracker)
                    .await?
            }
            _ => None,
        };

        Ok(PipelineOutcome {
            plan,
            written,
            run_dir,
            audio,
        })
    }

    /// Synthesize every story in order, pad, assemble, save and upload.
    async fn produce_audio(
        &self,
        speech: &dyn SpeechSynthesizer,
        store: &dyn ObjectStore,
        written: &WrittenStories,
        run_dir: &std::path::Path,
        tracker: &mut StageTracker<'_>,
    ) -> Result<Option<AudioArtifact>> {
        tracker.enter(PipelineStage::SynthesizingAudio);

        let count = written.stories.len();
        let mut segments: Vec<Vec<u8>> = Vec::with_capacity(count * 2);
        let mut gap: Option<Vec<u8>> = None;

        for (idx, story) in written.stories.iter().enumerate() {
            info!("Synthesizing story {}/{}", idx + 1, count);
            segments.push(speech.synthesize(&story.transcript()).await?);

            if idx + 1 < count {
                if gap.is_none() {
                    gap = Some(self.audio.silence(self.config.audio.gap_seconds).await?);
                }
                if let Some(silence) = &gap {
                    segments.push(silence.clone());
                }
            }
        }

        let Some(reel) = assemble(self.audio.as_ref(), segments).await?.into_bytes() else {
            warn!("No audio was produced; skipping upload");
            return Ok(None);
        };

        let path = OutputPersister::write_audio(run_dir, &reel)?;

        tracker.enter(PipelineStage::Uploading);
        let run_name = run_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let prefix = self
            .config
            .storage
            .as_ref()
            .map(|s| s.prefix.as_str())
            .unwrap_or("");
        let object_path = format!("{}/{}/{}", prefix, run_name, AUDIO_FILE);

        let url = store.upload(reel, &object_path, DEFAULT_CONTENT_TYPE).await?;
        OutputPersister::write_audio_url(run_dir, &url)?;
        info!("Audio uploaded: {}", url);

        Ok(Some(AudioArtifact {
            path,
            url,
            clips: count,
        }))
    }
}
