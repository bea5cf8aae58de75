//! Story planning and writing through an OpenAI-compatible gateway.

use super::schema::{parse_response, plan_schema, written_schema};
use super::{StoryGenerator, StoryPlan, WrittenStories, STORY_COUNT};
use crate::config::{GenerationConfig, Prompts};
use crate::error::{Result, StorylineError};
use crate::openai::{create_client, resolve_model};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat,
    ResponseFormatJsonSchema,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// Gateway-backed [`StoryGenerator`].
pub struct GatewayStoryGenerator {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    prompts: Prompts,
}

impl GatewayStoryGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let (_, model) = resolve_model(&config.model, &config.provider);
        Ok(Self {
            client: create_client(config)?,
            model: model.to_string(),
            prompts: Prompts::default(),
        })
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Send one structured-output request and return the raw message content.
    async fn complete(
        &self,
        system: String,
        user: String,
        schema_name: &str,
        schema: Value,
    ) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| StorylineError::UpstreamGeneration(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()
                .map_err(|e| StorylineError::UpstreamGeneration(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .response_format(ResponseFormat::JsonSchema {
                json_schema: ResponseFormatJsonSchema {
                    description: None,
                    name: schema_name.to_string(),
                    schema: Some(schema),
                    strict: Some(true),
                },
            })
            .build()
            .map_err(|e| StorylineError::UpstreamGeneration(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            StorylineError::UpstreamGeneration(format!("{} request failed: {}", self.model, e))
        })?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                StorylineError::UpstreamGeneration("Empty response from model".to_string())
            })?
            .clone();

        debug!("{} response: {}", schema_name, content.chars().take(500).collect::<String>());

        Ok(content)
    }

    fn vars(&self) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("story_count".to_string(), STORY_COUNT.to_string());
        vars
    }
}

#[async_trait]
impl StoryGenerator for GatewayStoryGenerator {
    #[instrument(skip(self))]
    async fn plan(&self, topic: &str) -> Result<StoryPlan> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(StorylineError::InvalidArgument("Topic must not be empty".to_string()));
        }

        info!("Planning {} stories with {}", STORY_COUNT, self.model);

        let mut vars = self.vars();
        vars.insert("topic".to_string(), topic.to_string());

        let system = self.prompts.render_with_custom(&self.prompts.planner.system, &vars);
        let user = self.prompts.render_with_custom(&self.prompts.planner.user, &vars);

        let content = self.complete(system, user, "story_plan", plan_schema()).await?;

        let mut plan: StoryPlan = parse_response(&content)?;
        plan.topic = topic.to_string();
        plan.validate()?;

        Ok(plan)
    }

    #[instrument(skip(self, plan), fields(topic = %plan.topic))]
    async fn write(&self, plan: &StoryPlan) -> Result<WrittenStories> {
        plan.validate()?;

        info!("Writing {} stories with {}", STORY_COUNT, self.model);

        let mut vars = self.vars();
        vars.insert("topic".to_string(), plan.topic.clone());
        vars.insert("plan_json".to_string(), serde_json::to_string(plan)?);

        let system = self.prompts.render_with_custom(&self.prompts.writer.system, &vars);
        let user = self.prompts.render_with_custom(&self.prompts.writer.user, &vars);

        let content = self
            .complete(system, user, "written_stories", written_schema())
            .await?;

        let mut written: WrittenStories = parse_response(&content)?;
        written.topic = plan.topic.clone();
        written.validate_against(plan)?;

        Ok(written)
    }
}
