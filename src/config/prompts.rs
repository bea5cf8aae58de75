//! Prompt templates for Storyline.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub planner: PlannerPrompts,
    pub writer: WriterPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Prompts for turning a topic into story ideas.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerPrompts {
    pub system: String,
    pub user: String,
}

impl Default for PlannerPrompts {
    fn default() -> Self {
        Self {
            system: "You are a newsroom assignment editor. \
Given one topic, generate exactly {{story_count}} distinct, high-quality story ideas."
                .to_string(),

            user: r#"Create exactly {{story_count}} story ideas for this topic.
Requirements:
1) Keep ideas unique and non-overlapping.
2) Headline must be specific, concrete, and newsroom-style.
3) Angle is one sentence describing what makes that story worth covering.
4) Keep all ideas tightly related to the topic.
5) Return structured output only.

Topic: {{topic}}"#
                .to_string(),
        }
    }
}

/// Prompts for expanding a plan into full stories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterPrompts {
    pub system: String,
    pub user: String,
}

impl Default for WriterPrompts {
    fn default() -> Self {
        Self {
            system: "You are a precise news writer. \
Write clear, factual-looking sample stories from provided story ideas."
                .to_string(),

            user: r#"Write exactly one short news story for each idea below.
Requirements:
1) Return exactly {{story_count}} stories in the same order as the input ideas.
2) Each story should be 3 short paragraphs, plain text only.
3) Keep tone neutral and informative.
4) Do not output markdown, bullet points, or labels inside story text.
5) Use the provided headline for each corresponding story.
6) Return structured output only.

Story plan JSON:
{{plan_json}}"#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let planner_path = custom_path.join("planner.toml");
            if planner_path.exists() {
                let content = std::fs::read_to_string(&planner_path)?;
                prompts.planner = toml::from_str(&content)?;
            }

            let writer_path = custom_path.join("writer.toml");
            if writer_path.exists() {
                let content = std::fs::read_to_string(&writer_path)?;
                prompts.writer = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}
