use std::{str::FromStr, sync::Arc};

use async_trait::async_trait;
use common::{
    error::AppError,
    utils::generation::{GenerationClient, GenerationParams},
};
use tracing::instrument;

use crate::{
    kinds::{compose_prompt, text_artifact::TextArtifact},
    registry::{AgentDescriptor, AgentKind, GenerationDefaults},
    wrong_request, Agent, AgentRequest, AgentResponse,
};

const PERSONA: &str = "\
You are an expert at distilling study material into clear, faithful summaries. \
Preserve the key facts, definitions, and relationships of the source text, \
never introduce information that is not in it, and write in plain prose \
suitable for revision.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryStyle {
    Brief,
    #[default]
    Detailed,
    Bullet,
}

impl SummaryStyle {
    fn instruction(self) -> &'static str {
        match self {
            Self::Brief => {
                "Write a brief summary of 2-3 paragraphs capturing only the most \
                 important points."
            }
            Self::Detailed => {
                "Write a detailed summary with section headings that covers every \
                 major topic in the material."
            }
            Self::Bullet => {
                "Write the summary as nested bullet points grouping related facts \
                 under short topic headings."
            }
        }
    }
}

impl FromStr for SummaryStyle {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "brief" => Ok(Self::Brief),
            "detailed" => Ok(Self::Detailed),
            "bullet" | "bullets" => Ok(Self::Bullet),
            other => Err(AppError::Validation(format!(
                "unknown summary style '{other}'. Expected 'brief', 'detailed', or 'bullet'."
            ))),
        }
    }
}

impl std::fmt::Display for SummaryStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Brief => write!(f, "brief"),
            Self::Detailed => write!(f, "detailed"),
            Self::Bullet => write!(f, "bullet"),
        }
    }
}

pub fn descriptor() -> AgentDescriptor {
    AgentDescriptor {
        name: "summary".to_owned(),
        description: "Summarizes document content in a chosen style".to_owned(),
        persona: PERSONA.to_owned(),
        kind: AgentKind::Summary,
        defaults: GenerationDefaults {
            temperature: 0.4,
            max_tokens: 4096,
        },
    }
}

pub struct SummaryAgent {
    client: Arc<dyn GenerationClient>,
    persona: String,
    params: GenerationParams,
}

impl SummaryAgent {
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

#[async_trait]
impl Agent for SummaryAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Summary
    }

    #[instrument(skip_all, fields(agent = %self.kind()))]
    async fn generate(&self, request: AgentRequest) -> Result<AgentResponse, AppError> {
        let AgentRequest::Summary {
            context,
            style,
            focus_areas,
        } = request
        else {
            return Err(wrong_request(self.kind()));
        };

        let mut instruction = style.instruction().to_owned();
        if !focus_areas.is_empty() {
            instruction.push_str(&format!(
                "\nPay particular attention to: {}.",
                focus_areas.join(", ")
            ));
        }

        let prompt = compose_prompt(&context, &instruction);
        let text = self
            .client
            .complete(&self.persona, &prompt, &self.params)
            .await?;

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AppError::ValidationEmpty(
                "Model returned an empty summary".to_owned(),
            ));
        }

        Ok(AgentResponse::Summary(TextArtifact::new(trimmed.to_owned())))
    }
}
