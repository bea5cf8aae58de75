//! Structured-output schemas and response parsing for the story calls.

use super::STORY_COUNT;
use crate::error::{Result, StorylineError};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

/// JSON schema for a [`super::StoryPlan`] response.
pub fn plan_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "topic": { "type": "string" },
            "stories": {
                "type": "array",
                "description": format!("Exactly {} story ideas.", STORY_COUNT),
                "items": {
                    "type": "object",
                    "properties": {
                        "headline": { "type": "string" },
                        "angle": { "type": "string" }
                    },
                    "required": ["headline", "angle"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["topic", "stories"],
        "additionalProperties": false
    })
}

/// JSON schema for a [`super::WrittenStories`] response.
pub fn written_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "topic": { "type": "string" },
            "stories": {
                "type": "array",
                "description": format!("Exactly {} stories in plan order.", STORY_COUNT),
                "items": {
                    "type": "object",
                    "properties": {
                        "index": { "type": "integer", "description": "1-based position in the plan." },
                        "headline": { "type": "string" },
                        "story": { "type": "string" }
                    },
                    "required": ["index", "headline", "story"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["topic", "stories"],
        "additionalProperties": false
    })
}

/// Parse a structured response, tolerating prose or code fences around the object.
pub(crate) fn parse_response<T: DeserializeOwned>(response: &str) -> Result<T> {
    let json_start = response.find('{');
    let json_end = response.rfind('}');

    let json_str = match (json_start, json_end) {
        (Some(start), Some(end)) if end > start => &response[start..=end],
        _ => response,
    };

    serde_json::from_str(json_str).map_err(|e| {
        let preview: String = response.chars().take(500).collect();
        StorylineError::UpstreamGeneration(format!(
            "Failed to parse structured response: {}. Response was: {}",
            e, preview
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::{StoryPlan, WrittenStories};

    #[test]
    fn test_parse_plain_object() {
        let plan: StoryPlan = parse_response(
            r#"{"topic": "tides", "stories": [{"headline": "H", "angle": "A"}]}"#,
        )
        .unwrap();
        assert_eq!(plan.topic, "tides");
        assert_eq!(plan.stories.len(), 1);
    }

    #[test]
    fn test_parse_fenced_object() {
        let response = "Here you go:\n```json\n{\"topic\": \"tides\", \"stories\": [{\"index\": 1, \"headline\": \"H\", \"story\": \"S\"}]}\n```";
        let written: WrittenStories = parse_response(response).unwrap();
        assert_eq!(written.stories[0].index, 1);
    }

    #[test]
    fn test_parse_failure_is_generation_error() {
        let err = parse_response::<StoryPlan>("no json here").unwrap_err();
        assert!(matches!(err, StorylineError::UpstreamGeneration(_)));
    }

    #[test]
    fn test_schemas_are_closed_objects() {
        for schema in [plan_schema(), written_schema()] {
            assert_eq!(schema["additionalProperties"], false);
            assert_eq!(schema["properties"]["stories"]["items"]["additionalProperties"], false);
        }
    }
}
