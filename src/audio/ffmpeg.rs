//! ffmpeg-backed silence rendering and clip combination.

use super::AudioProcessor;
use crate::config::AudioSettings;
use crate::error::{Result, StorylineError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Loudness target applied after concatenation.
const LOUDNORM: &str = "loudnorm=I=-16:TP=-1.5:LRA=11";

/// Runs ffmpeg inside a per-call scratch directory.
///
/// Every call creates its own [`TempDir`] under `temp_root`; it is removed when
/// the call returns, whether ffmpeg succeeded or not.
pub struct FfmpegAudio {
    ffmpeg: String,
    sample_rate: u32,
    output_format: String,
    temp_root: PathBuf,
}

impl FfmpegAudio {
    pub fn new(settings: &AudioSettings, temp_root: &Path) -> Self {
        Self {
            ffmpeg: settings.ffmpeg_path.clone(),
            sample_rate: settings.sample_rate,
            output_format: settings.output_format.clone(),
            temp_root: temp_root.to_path_buf(),
        }
    }

    fn scratch_dir(&self) -> Result<TempDir> {
        std::fs::create_dir_all(&self.temp_root)?;
        Ok(tempfile::Builder::new()
            .prefix("storyline-")
            .tempdir_in(&self.temp_root)?)
    }

    /// Run ffmpeg with the given arguments, mapping every failure to `AudioTool`.
    async fn run(&self, args: &[String]) -> Result<()> {
        debug!("{} {}", self.ffmpeg, args.join(" "));

        let result = Command::new(&self.ffmpeg)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;

        match result {
            Ok(out) if out.status.success() => Ok(()),
            Ok(out) => {
                let err = String::from_utf8_lossy(&out.stderr);
                Err(StorylineError::AudioTool(format!(
                    "{} exited with {}: {}",
                    self.ffmpeg,
                    out.status,
                    err.trim()
                )))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorylineError::AudioTool(
                format!("{} not found. Please install it and ensure it's in your PATH.", self.ffmpeg),
            )),
            Err(e) => Err(StorylineError::AudioTool(format!("{} error: {e}", self.ffmpeg))),
        }
    }
}

/// Filter graph concatenating `n` audio inputs, then normalizing loudness.
fn concat_filter(n: usize) -> String {
    let inputs: String = (0..n).map(|i| format!("[{i}:a]")).collect();
    format!("{inputs}concat=n={n}:v=0:a=1,{LOUDNORM}")
}

#[async_trait]
impl AudioProcessor for FfmpegAudio {
    #[instrument(skip(self))]
    async fn silence(&self, duration_seconds: f64) -> Result<Vec<u8>> {
        if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
            return Err(StorylineError::InvalidArgument(format!(
                "silence duration must be greater than zero, got {}",
                duration_seconds
            )));
        }

        let scratch = self.scratch_dir()?;
        let output_path = scratch.path().join("silence.wav");
        let rate = self.sample_rate.to_string();

        let args = vec![
            "-y".to_string(),
            "-f".to_string(),
            "lavfi".to_string(),
            "-i".to_string(),
            format!("anullsrc=r={}:cl=mono", rate),
            "-t".to_string(),
            duration_seconds.to_string(),
            "-ar".to_string(),
            rate,
            "-ac".to_string(),
            "1".to_string(),
            output_path.to_string_lossy().into_owned(),
        ];

        self.run(&args).await?;
        let bytes = tokio::fs::read(&output_path).await?;
        Ok(bytes)
    }

    #[instrument(skip_all, fields(segments = segments.len()))]
    async fn combine(&self, segments: &[Vec<u8>]) -> Result<Vec<u8>> {
        if segments.len() < 2 {
            return Err(StorylineError::InvalidArgument(format!(
                "Need at least two audio segments to concatenate, got {}",
                segments.len()
            )));
        }

        let scratch = self.scratch_dir()?;
        let mut args = vec!["-y".to_string()];

        for (idx, segment) in segments.iter().enumerate() {
            let segment_path = scratch.path().join(format!("segment_{idx}.wav"));
            tokio::fs::write(&segment_path, segment).await?;
            args.push("-i".to_string());
            args.push(segment_path.to_string_lossy().into_owned());
        }

        let output_path = scratch
            .path()
            .join(format!("concatenated.{}", self.output_format));

        args.extend([
            "-filter_complex".to_string(),
            concat_filter(segments.len()),
            "-ar".to_string(),
            self.sample_rate.to_string(),
            "-ac".to_string(),
            "1".to_string(),
            output_path.to_string_lossy().into_owned(),
        ]);

        self.run(&args).await?;
        let bytes = tokio::fs::read(&output_path).await?;
        info!("Combined {} segments into {} bytes", segments.len(), bytes.len());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio_with_tool(tool: &str, temp_root: &Path) -> FfmpegAudio {
        let settings = AudioSettings {
            ffmpeg_path: tool.to_string(),
            ..AudioSettings::default()
        };
        FfmpegAudio::new(&settings, temp_root)
    }

    fn leftover_entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[test]
    fn test_concat_filter_expression() {
        assert_eq!(
            concat_filter(3),
            "[0:a][1:a][2:a]concat=n=3:v=0:a=1,loudnorm=I=-16:TP=-1.5:LRA=11"
        );
    }

    #[tokio::test]
    async fn test_silence_rejects_non_positive_duration() {
        let root = tempfile::tempdir().unwrap();
        let audio = audio_with_tool("ffmpeg", root.path());

        for duration in [0.0, -0.5, f64::NAN] {
            let err = audio.silence(duration).await.unwrap_err();
            assert!(matches!(err, StorylineError::InvalidArgument(_)));
        }
    }

    #[tokio::test]
    async fn test_combine_rejects_fewer_than_two_segments() {
        let root = tempfile::tempdir().unwrap();
        let audio = audio_with_tool("ffmpeg", root.path());

        let err = audio.combine(&[]).await.unwrap_err();
        assert!(matches!(err, StorylineError::InvalidArgument(_)));

        let err = audio.combine(&[vec![1, 2, 3]]).await.unwrap_err();
        assert!(matches!(err, StorylineError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_missing_tool_is_audio_tool_error() {
        let root = tempfile::tempdir().unwrap();
        let audio = audio_with_tool("storyline-no-such-ffmpeg", root.path());

        let err = audio.silence(0.8).await.unwrap_err();
        assert!(matches!(err, StorylineError::AudioTool(_)));
        assert_eq!(leftover_entries(root.path()), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_tool_cleans_up_scratch_files() {
        let root = tempfile::tempdir().unwrap();
        let audio = audio_with_tool("false", root.path());

        let err = audio.combine(&[vec![1], vec![2]]).await.unwrap_err();
        assert!(matches!(err, StorylineError::AudioTool(_)));
        assert_eq!(leftover_entries(root.path()), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_combine_passes_inputs_in_order() {
        use std::os::unix::fs::PermissionsExt;

        let bin = tempfile::tempdir().unwrap();
        let args_log = bin.path().join("args.txt");
        let script = bin.path().join("fake-ffmpeg");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\nprintf '%s\\n' \"$@\" > '{}'\nfor last; do :; done\nprintf 'MIXED' > \"$last\"\n",
                args_log.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let root = tempfile::tempdir().unwrap();
        let audio = audio_with_tool(script.to_str().unwrap(), root.path());

        let out = audio.combine(&[vec![1], vec![2], vec![3]]).await.unwrap();
        assert_eq!(out, b"MIXED");

        let logged = std::fs::read_to_string(&args_log).unwrap();
        let lines: Vec<&str> = logged.lines().collect();
        let inputs: Vec<&str> = lines
            .windows(2)
            .filter(|w| w[0] == "-i")
            .map(|w| w[1])
            .collect();
        assert_eq!(inputs.len(), 3);
        assert!(inputs[0].ends_with("segment_0.wav"));
        assert!(inputs[2].ends_with("segment_2.wav"));
        assert!(lines.contains(&"[0:a][1:a][2:a]concat=n=3:v=0:a=1,loudnorm=I=-16:TP=-1.5:LRA=11"));
        assert!(lines.last().unwrap().ends_with("concatenated.wav"));
        assert_eq!(leftover_entries(root.path()), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_silence_reads_back_tool_output() {
        use std::os::unix::fs::PermissionsExt;

        let bin = tempfile::tempdir().unwrap();
        let script = bin.path().join("fake-ffmpeg");
        std::fs::write(&script, "#!/bin/sh\nfor last; do :; done\nprintf 'QUIET' > \"$last\"\n")
            .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let root = tempfile::tempdir().unwrap();
        let audio = audio_with_tool(script.to_str().unwrap(), root.path());

        assert_eq!(audio.silence(0.8).await.unwrap(), b"QUIET");
        assert_eq!(leftover_entries(root.path()), 0);
    }
}
