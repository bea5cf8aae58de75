//! Run output persistence.
//!
//! Every pipeline run gets its own directory named after the topic and the UTC
//! start second. Directories are never reused, merged or deleted.

use crate::error::{Result, StorylineError};
use crate::story::{StoryPlan, WrittenStories};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const PLAN_FILE: &str = "story_plan.json";
pub const WRITTEN_JSON_FILE: &str = "written_stories.json";
pub const WRITTEN_TEXT_FILE: &str = "written_stories.txt";
pub const AUDIO_FILE: &str = "written_stories_audio.wav";
pub const AUDIO_URL_FILE: &str = "written_stories_audio_bunny_url.txt";

/// Every file name a run directory may contain.
pub const ARTIFACT_FILES: [&str; 5] = [
    PLAN_FILE,
    WRITTEN_JSON_FILE,
    WRITTEN_TEXT_FILE,
    AUDIO_FILE,
    AUDIO_URL_FILE,
];

const SLUG_MAX_CHARS: usize = 60;

/// Lowercase, hyphen-joined topic, at most 60 characters, `topic` when empty.
pub fn slugify(topic: &str) -> String {
    let slug: String = topic
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .take(SLUG_MAX_CHARS)
        .collect();

    if slug.is_empty() {
        "topic".to_string()
    } else {
        slug
    }
}

/// `{slug}_{YYYYMMDDTHHMMSSZ}`.
pub fn run_dir_name(topic: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}", slugify(topic), at.format("%Y%m%dT%H%M%SZ"))
}

/// Writes run artifacts beneath an output root.
#[derive(Debug, Clone)]
pub struct OutputPersister {
    root: PathBuf,
}

impl OutputPersister {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Save plan and stories into a fresh run directory stamped with the current time.
    pub fn save(&self, plan: &StoryPlan, written: &WrittenStories) -> Result<PathBuf> {
        self.save_at(plan, written, Utc::now())
    }

    /// Save plan and stories into a fresh run directory stamped with `at`.
    ///
    /// Fails if the directory already exists, which only happens for two runs of
    /// the same topic within one second.
    pub fn save_at(
        &self,
        plan: &StoryPlan,
        written: &WrittenStories,
        at: DateTime<Utc>,
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.root)?;

        let run_dir = self.root.join(run_dir_name(&plan.topic, at));
        match std::fs::create_dir(&run_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorylineError::InvalidArgument(format!(
                    "Run directory already exists: {}",
                    run_dir.display()
                )));
            }
            Err(e) => return Err(e.into()),
        }

        std::fs::write(run_dir.join(PLAN_FILE), to_ascii_json(plan)?)?;
        std::fs::write(run_dir.join(WRITTEN_JSON_FILE), to_ascii_json(written)?)?;
        std::fs::write(run_dir.join(WRITTEN_TEXT_FILE), written.render_text())?;

        info!("Saved outputs to {}", run_dir.display());
        Ok(run_dir)
    }

    /// Write the combined audio reel into a run directory.
    pub fn write_audio(run_dir: &Path, audio: &[u8]) -> Result<PathBuf> {
        let path = run_dir.join(AUDIO_FILE);
        std::fs::write(&path, audio)?;
        debug!("Wrote {} bytes of audio to {}", audio.len(), path.display());
        Ok(path)
    }

    /// Record the uploaded reel URL next to the reel.
    pub fn write_audio_url(run_dir: &Path, url: &str) -> Result<PathBuf> {
        let path = run_dir.join(AUDIO_URL_FILE);
        std::fs::write(&path, url)?;
        Ok(path)
    }
}

/// Two-space indented JSON with every non-ASCII character escaped as `\uXXXX`.
fn to_ascii_json<T: Serialize>(value: &T) -> Result<String> {
    let pretty = serde_json::to_string_pretty(value)?;
    let mut out = String::with_capacity(pretty.len());
    let mut units = [0u16; 2];
    for c in pretty.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::fixtures;
    use chrono::TimeZone;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Coral Reef   Bleaching"), "coral-reef-bleaching");
        assert_eq!(slugify("   "), "topic");
        assert_eq!(slugify(&"a".repeat(80)).len(), 60);
    }

    #[test]
    fn test_run_dir_name_format() {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            run_dir_name("coral reef bleaching", at),
            "coral-reef-bleaching_20250101T000000Z"
        );
    }

    #[test]
    fn test_save_writes_three_files() {
        let root = tempfile::tempdir().unwrap();
        let persister = OutputPersister::new(root.path().join("output"));
        let plan = fixtures::plan("coral reef bleaching");
        let written = fixtures::written(&plan);
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let run_dir = persister.save_at(&plan, &written, at).unwrap();

        assert!(run_dir.ends_with("coral-reef-bleaching_20250101T000000Z"));
        assert_eq!(std::fs::read_dir(&run_dir).unwrap().count(), 3);

        let text = std::fs::read_to_string(run_dir.join(WRITTEN_TEXT_FILE)).unwrap();
        assert!(text.starts_with("Topic: coral reef bleaching"));

        let plan_json = std::fs::read_to_string(run_dir.join(PLAN_FILE)).unwrap();
        assert!(plan_json.contains("\n  \"topic\""));
        let reloaded: StoryPlan = serde_json::from_str(&plan_json).unwrap();
        assert_eq!(reloaded, plan);
    }

    #[test]
    fn test_runs_a_second_apart_never_collide() {
        let root = tempfile::tempdir().unwrap();
        let persister = OutputPersister::new(root.path());
        let plan = fixtures::plan("tides");
        let written = fixtures::written(&plan);
        let first = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let second = first + chrono::Duration::seconds(1);

        let a = persister.save_at(&plan, &written, first).unwrap();
        let b = persister.save_at(&plan, &written, second).unwrap();

        assert_ne!(a, b);
        assert!(a.exists() && b.exists());
    }

    #[test]
    fn test_same_second_does_not_merge() {
        let root = tempfile::tempdir().unwrap();
        let persister = OutputPersister::new(root.path());
        let plan = fixtures::plan("tides");
        let written = fixtures::written(&plan);
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        persister.save_at(&plan, &written, at).unwrap();
        let err = persister.save_at(&plan, &written, at).unwrap_err();
        assert!(matches!(err, StorylineError::InvalidArgument(_)));
    }

    #[test]
    fn test_non_ascii_is_escaped() {
        let mut plan = fixtures::plan("café reefs");
        plan.stories[0].headline = "Récifs 🐠".to_string();

        let json = to_ascii_json(&plan).unwrap();
        assert!(json.is_ascii());
        assert!(json.contains("caf\\u00e9"));
        assert!(json.contains("\\ud83d\\udc20"));

        let reloaded: StoryPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded.stories[0].headline, "Récifs 🐠");
    }

    #[test]
    fn test_audio_artifacts() {
        let root = tempfile::tempdir().unwrap();
        let audio = OutputPersister::write_audio(root.path(), b"RIFF").unwrap();
        let url = OutputPersister::write_audio_url(root.path(), "https://x/y.wav").unwrap();

        assert!(audio.ends_with(AUDIO_FILE));
        assert_eq!(std::fs::read_to_string(url).unwrap(), "https://x/y.wav");
    }
}
