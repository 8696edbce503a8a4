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
You write engaging two-host educational podcast scripts. Host A (Alex) guides \
the conversation and asks clarifying questions; Host B (Blake) is the subject \
expert. Keep the dialogue natural and conversational, cover the source \
material faithfully, and avoid inventing facts. Format each line as \
'Alex:' or 'Blake:' followed by their dialogue.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PodcastLevel {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl PodcastLevel {
    fn instruction(self) -> &'static str {
        match self {
            Self::Beginner => {
                "Pitch the discussion at a complete beginner: define every term, use \
                 everyday analogies, and keep the pace gentle."
            }
            Self::Intermediate => {
                "Pitch the discussion at a student who knows the basics: explain new \
                 terms briefly and spend most of the time on the interesting details."
            }
            Self::Advanced => {
                "Pitch the discussion at an advanced student: assume the fundamentals, \
                 dig into nuances, edge cases, and connections between topics."
            }
        }
    }
}

impl FromStr for PodcastLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            other => Err(AppError::Validation(format!(
                "unknown podcast level '{other}'. Expected 'beginner', 'intermediate', or \
                 'advanced'."
            ))),
        }
    }
}

impl std::fmt::Display for PodcastLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Beginner => write!(f, "beginner"),
            Self::Intermediate => write!(f, "intermediate"),
            Self::Advanced => write!(f, "advanced"),
        }
    }
}

pub fn descriptor() -> AgentDescriptor {
    AgentDescriptor {
        name: "podcast".to_owned(),
        description: "Turns document content into a two-host podcast script".to_owned(),
        persona: PERSONA.to_owned(),
        kind: AgentKind::Podcast,
        defaults: GenerationDefaults {
            temperature: 0.8,
            max_tokens: 8192,
        },
    }
}

pub struct PodcastAgent {
    client: Arc<dyn GenerationClient>,
    persona: String,
    params: GenerationParams,
}

impl PodcastAgent {
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
impl Agent for PodcastAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Podcast
    }

    #[instrument(skip_all, fields(agent = %self.kind()))]
    async fn generate(&self, request: AgentRequest) -> Result<AgentResponse, AppError> {
        let AgentRequest::Podcast { context, level } = request else {
            return Err(wrong_request(self.kind()));
        };

        let instruction = format!(
            "Write a podcast episode script discussing the content below.\n\n{}\n\
             Open with a short introduction of the topic, work through the material \
             in a logical order, and close with a recap of the key takeaways.",
            level.instruction()
        );

        let prompt = compose_prompt(&context, &instruction);
        let text = self
            .client
            .complete(&self.persona, &prompt, &self.params)
            .await?;

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AppError::ValidationEmpty(
                "Model returned an empty podcast script".to_owned(),
            ));
        }

        Ok(AgentResponse::Podcast(TextArtifact::new(trimmed.to_owned())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::test_support::{test_params, RecordingClient};

    #[tokio::test]
    async fn produces_script_at_requested_level() {
        let client = Arc::new(RecordingClient::with_response(
            "Alex: Welcome back!\nBlake: Today we cover cells.",
        ));
        let agent = PodcastAgent::new(
            Arc::clone(&client) as Arc<dyn GenerationClient>,
            PERSONA.to_owned(),
            test_params(),
        );

        let result = agent
            .generate(AgentRequest::Podcast {
                context: "Cell biology notes".to_owned(),
                level: PodcastLevel::Beginner,
            })
            .await
            .expect("generate");

        let AgentResponse::Podcast(artifact) = result else {
            panic!("expected podcast");
        };
        assert!(artifact.text.contains("Alex:"));
        assert!(client.recorded_prompts()[0].contains("complete beginner"));
    }

    #[test]
    fn level_parsing() {
        assert_eq!(
            "ADVANCED".parse::<PodcastLevel>().ok(),
            Some(PodcastLevel::Advanced)
        );
        assert!("expert".parse::<PodcastLevel>().is_err());
    }
}
