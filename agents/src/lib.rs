pub mod contract;
pub mod kinds;
pub mod registry;

use async_trait::async_trait;
use common::error::AppError;
use serde::{Deserialize, Serialize};

use crate::contract::{
    evaluation::EvaluationReport, flashcard::FlashcardSet, flowchart::FlowchartSet, quiz::QuizSet,
};
use crate::kinds::{
    chat::ChatReply,
    evaluation::Strictness,
    flowchart::DetailLevel,
    podcast::PodcastLevel,
    quiz::Difficulty,
    summary::SummaryStyle,
    text_artifact::TextArtifact,
};

pub use registry::{default_descriptors, AgentConfig, AgentDescriptor, AgentKind, AgentRegistry};

/// One prior turn of a chat session, as handed over by the chat collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// Kind-specific input to an agent's generation call.
#[derive(Debug, Clone)]
pub enum AgentRequest {
    Quiz {
        context: String,
        difficulty: Difficulty,
        question_count: usize,
    },
    Flashcards {
        context: String,
        card_count: usize,
    },
    Flowcharts {
        context: String,
        detail: DetailLevel,
    },
    Evaluation {
        image: Vec<u8>,
        mime_type: String,
        strictness: Strictness,
        reference: Option<String>,
    },
    Summary {
        context: String,
        style: SummaryStyle,
        focus_areas: Vec<String>,
    },
    Podcast {
        context: String,
        level: PodcastLevel,
    },
    Chat {
        context: String,
        message: String,
        history: Vec<ChatMessage>,
    },
}

/// Validated output of an agent run. Structured kinds have already been
/// through their output contract; free-text kinds carry the raw script.
#[derive(Debug, Clone)]
pub enum AgentResponse {
    Quiz(QuizSet),
    Flashcards(FlashcardSet),
    Flowcharts(FlowchartSet),
    Evaluation(EvaluationReport),
    Summary(TextArtifact),
    Podcast(TextArtifact),
    Chat(ChatReply),
}

/// A named pairing of a fixed persona with a generation capability and the
/// output contract for its artifact kind.
#[async_trait]
pub trait Agent: Send + Sync {
    fn kind(&self) -> AgentKind;

    async fn generate(&self, request: AgentRequest) -> Result<AgentResponse, AppError>;
}

pub(crate) fn wrong_request(kind: AgentKind) -> AppError {
    AppError::Validation(format!("{kind} agent received a request for another kind"))
}
