//! Shared model-invocation wrapper: every agent sends text (+ optional
//! images) to its configured role model and gets back raw text plus
//! token usage (§4.6 `invoke()`).

use std::sync::Arc;

use sa_domain::config::RoleModelConfig;
use sa_domain::error::Result;
use sa_domain::stream::Usage;
use sa_domain::tool::{ContentPart, Message, MessageContent, Role};
use sa_providers::{ChatRequest, LlmProvider};

#[derive(Clone)]
pub struct AgentClient {
    pub provider: Arc<dyn LlmProvider>,
    pub config: RoleModelConfig,
}

pub struct AgentOutput {
    pub raw_text: String,
    pub usage: Option<Usage>,
}

impl AgentClient {
    pub fn new(provider: Arc<dyn LlmProvider>, config: RoleModelConfig) -> Self {
        Self { provider, config }
    }

    /// Build a single user message from text plus zero or more image
    /// data URLs, send it, and return the raw response text + usage.
    pub async fn invoke(&self, text: String, images: &[String]) -> Result<AgentOutput> {
        let mut parts = vec![ContentPart::Text { text }];
        for url in images {
            parts.push(ContentPart::Image {
                url: url.clone(),
                media_type: None,
            });
        }
        let message = Message {
            role: Role::User,
            content: MessageContent::Parts(parts),
        };

        let response = self
            .provider
            .chat(ChatRequest {
                messages: vec![message],
                tools: Vec::new(),
                temperature: Some(self.config.temperature),
                max_tokens: Some(self.config.max_tokens),
                json_mode: false,
                model: Some(self.config.model.clone()),
            })
            .await?;

        Ok(AgentOutput {
            raw_text: response.content,
            usage: response.usage,
        })
    }
}
