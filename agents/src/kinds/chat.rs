use std::sync::Arc;

use async_trait::async_trait;
use common::{
    error::AppError,
    utils::generation::{GenerationClient, GenerationParams},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    registry::{AgentDescriptor, AgentKind, GenerationDefaults},
    wrong_request, Agent, AgentRequest, AgentResponse, ChatMessage, ChatRole,
};

const HISTORY_WINDOW: usize = 10;

const PERSONA: &str = "\
You are a helpful study tutor. Answer the student's question using ONLY the \
provided document context. If the context does not contain the answer, say \
that the document does not cover the topic rather than guessing. Be concise, \
accurate, and encouraging.";

/// Phrases the model uses when the context did not cover the question. A
/// reply containing one of these is not counted as grounded in the sources.
const DECLINE_PHRASES: &[&str] = &[
    "does not cover",
    "doesn't cover",
    "not covered in",
    "no information about",
    "not mentioned in the document",
    "cannot find",
    "can't find",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatReply {
    pub response: String,
    pub sources_used: bool,
}

pub fn descriptor() -> AgentDescriptor {
    AgentDescriptor {
        name: "chat".to_owned(),
        description: "Answers questions grounded in retrieved document context".to_owned(),
        persona: PERSONA.to_owned(),
        kind: AgentKind::Chat,
        defaults: GenerationDefaults {
            temperature: 0.7,
            max_tokens: 2048,
        },
    }
}

pub struct ChatAgent {
    client: Arc<dyn GenerationClient>,
    persona: String,
    params: GenerationParams,
}

impl ChatAgent {
    pub(crate) fn new(
        client: Arc<dyn GenerationClient>,
        persona: String,
        params: GenerationParams,
    ) -> Self {
        Self {
            client,
            persona,
            params,
        }
    }
}

fn render_history(history: &[ChatMessage]) -> String {
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    history[start..]
        .iter()
        .map(|message| {
            let label = match message.role {
                ChatRole::User => "Student",
                ChatRole::Assistant => "Assistant",
            };
            format!("{label}: {}", message.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_decline(reply: &str) -> bool {
    let lowered = reply.to_lowercase();
    DECLINE_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

#[async_trait]
impl Agent for ChatAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Chat
    }

    #[instrument(skip_all, fields(agent = %self.kind()))]
    async fn generate(&self, request: AgentRequest) -> Result<AgentResponse, AppError> {
        let AgentRequest::Chat {
            context,
            message,
            history,
        } = request
        else {
            return Err(wrong_request(self.kind()));
        };

        let mut prompt = String::new();
        if !context.trim().is_empty() {
            prompt.push_str(&format!("## Document Context\n{context}\n\n"));
        }
        if !history.is_empty() {
            prompt.push_str(&format!(
                "## Conversation History\n{}\n\n",
                render_history(&history)
            ));
        }
        prompt.push_str(&format!("## Current Question\n{message}"));

        let text = self
            .client
            .complete(&self.persona, &prompt, &self.params)
            .await?;

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AppError::ValidationEmpty(
                "Model returned an empty chat reply".to_owned(),
            ));
        }

        let sources_used = !context.trim().is_empty() && !is_decline(trimmed);
        Ok(AgentResponse::Chat(ChatReply {
            response: trimmed.to_owned(),
            sources_used,
        }))
    }
}
