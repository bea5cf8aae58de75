//! Story plans and written stories.
//!
//! A [`StoryPlan`] is produced from a topic in one language-model call and a
//! [`WrittenStories`] is produced from that plan in a second call. Both shapes
//! are checked at the boundary so nothing downstream has to trust the model.

mod gateway;
mod schema;

pub use gateway::GatewayStoryGenerator;
pub use schema::{plan_schema, written_schema};

use crate::error::{Result, StorylineError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Number of ideas in every plan and stories in every written set.
pub const STORY_COUNT: usize = 3;

/// A single story idea.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryIdea {
    pub headline: String,
    /// One sentence on why the story is worth covering.
    pub angle: String,
}

/// Exactly [`STORY_COUNT`] ideas for one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryPlan {
    pub topic: String,
    pub stories: Vec<StoryIdea>,
}

impl StoryPlan {
    /// Check the plan shape: exact length, non-empty headline and angle.
    pub fn validate(&self) -> Result<()> {
        if self.stories.len() != STORY_COUNT {
            return Err(StorylineError::UpstreamGeneration(format!(
                "Expected {} story ideas, got {}",
                STORY_COUNT,
                self.stories.len()
            )));
        }

        for (i, idea) in self.stories.iter().enumerate() {
            if idea.headline.trim().is_empty() || idea.angle.trim().is_empty() {
                return Err(StorylineError::UpstreamGeneration(format!(
                    "Story idea {} has an empty headline or angle",
                    i + 1
                )));
            }
        }

        Ok(())
    }
}

/// One written story, matched to its idea by 1-based index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrittenStory {
    pub index: u32,
    pub headline: String,
    /// Plain text body, paragraphs separated by blank lines.
    pub story: String,
}

impl WrittenStory {
    /// Text handed to the speech synthesizer for this story.
    pub fn transcript(&self) -> String {
        format!("{}. {}", self.headline, self.story.trim())
    }
}

/// Exactly [`STORY_COUNT`] stories, in plan order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrittenStories {
    pub topic: String,
    pub stories: Vec<WrittenStory>,
}

impl WrittenStories {
    /// Check the stories against the plan they were written from.
    ///
    /// `stories[i].index == i + 1` and `stories[i].headline == plan.stories[i].headline`.
    pub fn validate_against(&self, plan: &StoryPlan) -> Result<()> {
        if self.stories.len() != STORY_COUNT {
            return Err(StorylineError::UpstreamGeneration(format!(
                "Expected {} stories, got {}",
                STORY_COUNT,
                self.stories.len()
            )));
        }

        for (i, (story, idea)) in self.stories.iter().zip(&plan.stories).enumerate() {
            let expected = i as u32 + 1;
            if story.index != expected {
                return Err(StorylineError::UpstreamGeneration(format!(
                    "Story at position {} has index {}, expected {}",
                    i + 1,
                    story.index,
                    expected
                )));
            }
            if story.headline != idea.headline {
                return Err(StorylineError::UpstreamGeneration(format!(
                    "Story {} headline {:?} does not match planned headline {:?}",
                    expected, story.headline, idea.headline
                )));
            }
            if story.story.trim().is_empty() {
                return Err(StorylineError::UpstreamGeneration(format!(
                    "Story {} has an empty body",
                    expected
                )));
            }
        }

        Ok(())
    }

    /// Human-readable rendering saved as `written_stories.txt`.
    pub fn render_text(&self) -> String {
        let mut lines = vec![
            format!("Topic: {}", self.topic),
            String::new(),
            "Generated stories:".to_string(),
            String::new(),
        ];
        for story in &self.stories {
            lines.push(format!("{}. {}", story.index, story.headline));
            lines.push(story.story.clone());
            lines.push(String::new());
        }
        lines.join("\n")
    }
}

/// Language-model boundary for planning and writing.
#[async_trait]
pub trait StoryGenerator: Send + Sync {
    /// Produce a validated plan for a topic.
    async fn plan(&self, topic: &str) -> Result<StoryPlan>;

    /// Expand a plan into validated stories.
    async fn write(&self, plan: &StoryPlan) -> Result<WrittenStories>;
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn plan(topic: &str) -> StoryPlan {
        StoryPlan {
            topic: topic.to_string(),
            stories: (1..=STORY_COUNT)
                .map(|i| StoryIdea {
                    headline: format!("Headline {}", i),
                    angle: format!("Angle {}", i),
                })
                .collect(),
        }
    }

    pub fn written(plan: &StoryPlan) -> WrittenStories {
        WrittenStories {
            topic: plan.topic.clone(),
            stories: plan
                .stories
                .iter()
                .enumerate()
                .map(|(i, idea)| WrittenStory {
                    index: i as u32 + 1,
                    headline: idea.headline.clone(),
                    story: format!("Body of story {}.\n\nSecond paragraph.", i + 1),
                })
                .collect(),
        }
    }
}
