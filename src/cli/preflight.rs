//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools are available before starting a run that
//! would otherwise fail after paying for generation and synthesis.

use crate::config::Settings;
use crate::error::{Result, StorylineError};
use tokio::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Text-only generation needs nothing local.
    Generate,
    /// Audio needs the audio tool.
    GenerateWithAudio,
    /// Remote runs need the launcher program.
    Remote,
}

/// Run pre-flight checks for the given operation.
pub async fn check(settings: &Settings, operation: Operation) -> Result<()> {
    match operation {
        Operation::Generate => {}
        Operation::GenerateWithAudio => {
            check_tool(&settings.audio.ffmpeg_path, "-version", StorylineError::AudioTool).await?;
        }
        Operation::Remote => {
            let program = settings.remote.launcher.first().ok_or_else(|| {
                StorylineError::Configuration("Remote launcher command is empty".to_string())
            })?;
            check_tool(program, "--version", |msg| {
                StorylineError::Configuration(format!("Remote launcher unavailable: {}", msg))
            })
            .await?;
        }
    }
    Ok(())
}

/// Check if an external tool is available, wrapping failures with `to_error`.
async fn check_tool<E>(name: &str, version_arg: &str, to_error: E) -> Result<()>
where
    E: Fn(String) -> StorylineError,
{
    match Command::new(name).arg(version_arg).output().await {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(to_error(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(to_error(format!(
            "{} not found. Please install it and ensure it's in your PATH.",
            name
        ))),
        Err(e) => Err(to_error(format!("{}: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_text_only_has_no_requirements() {
        assert!(check(&Settings::default(), Operation::Generate).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_audio_tool_fails() {
        let mut settings = Settings::default();
        settings.audio.ffmpeg_path = "storyline-no-such-ffmpeg".to_string();

        let err = check(&settings, Operation::GenerateWithAudio).await.unwrap_err();
        assert!(matches!(err, StorylineError::AudioTool(_)));
    }

    #[tokio::test]
    async fn test_empty_launcher_is_configuration_error() {
        let mut settings = Settings::default();
        settings.remote.launcher.clear();

        let err = check(&settings, Operation::Remote).await.unwrap_err();
        assert!(matches!(err, StorylineError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_missing_launcher_is_configuration_error() {
        let mut settings = Settings::default();
        settings.remote.launcher = vec!["storyline-no-such-launcher".to_string()];

        let err = check(&settings, Operation::Remote).await.unwrap_err();
        assert!(matches!(err, StorylineError::Configuration(_)));
        assert!(err.to_string().contains("storyline-no-such-launcher not found"));
        assert!(!err.to_string().contains("Audio tool"));
    }
}
