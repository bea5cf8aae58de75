//! Generate command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::{PipelineConfig, RunOverrides, Settings};
use crate::orchestrator::{Orchestrator, PipelineOutcome, Progress};
use crate::remote::RemoteResult;
use anyhow::Result;

/// Options for one `generate` invocation.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub topic: String,
    pub with_audio: bool,
    pub emit_result: bool,
    pub overrides: RunOverrides,
}

/// Run the generate command.
pub async fn run_generate(options: GenerateOptions, settings: Settings) -> Result<()> {
    let settings = options.overrides.apply(settings);

    let operation = if options.with_audio {
        Operation::GenerateWithAudio
    } else {
        Operation::Generate
    };
    if let Err(e) = preflight::check(&settings, operation).await {
        Output::error(&format!("{}", e));
        Output::info("Run 'storyline doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let config = match PipelineConfig::from_settings(&settings, options.with_audio) {
        Ok(config) => config,
        Err(e) => {
            Output::error(&format!("{}", e));
            return Err(e.into());
        }
    };

    let orchestrator = Orchestrator::new(config)?;

    Output::info(&format!("Topic: {}", options.topic.trim()));
    let spinner = Output::spinner("Starting...");
    let progress_bar = spinner.clone();
    let on_progress = move |p: &Progress| {
        progress_bar.set_message(format!("[{}/{}] {}...", p.step, p.total, p.label));
    };

    let outcome = orchestrator.run(&options.topic, &on_progress).await;
    spinner.finish_and_clear();

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            Output::error(&format!("{}", e));
            return Err(e.into());
        }
    };

    if options.emit_result {
        let sprite_name = settings.remote.name.clone();
        println!("{}", RemoteResult::from_outcome(&outcome, sprite_name).to_marker_line()?);
        return Ok(());
    }

    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &PipelineOutcome) {
    Output::header(&format!("Stories: {}", outcome.written.topic));
    for story in &outcome.written.stories {
        Output::story(story.index, &story.headline, &story.story);
    }
    println!();

    Output::success(&format!("Saved to {}", outcome.run_dir.display()));
    if let Some(audio) = &outcome.audio {
        Output::kv("Audio file", &audio.path.display().to_string());
        Output::kv("Audio URL", &audio.url);
    }
}
