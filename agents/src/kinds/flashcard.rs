use std::sync::Arc;

use async_trait::async_trait;
use common::{
    error::AppError,
    utils::generation::{GenerationClient, GenerationParams},
};
use tracing::instrument;

use crate::{
    contract::flashcard,
    kinds::compose_prompt,
    registry::{AgentDescriptor, AgentKind, GenerationDefaults},
    wrong_request, Agent, AgentRequest, AgentResponse,
};

const MIN_CARDS: usize = 5;
const MAX_CARDS: usize = 30;

const PERSONA: &str = "\
You are an expert at creating effective flashcards for learning and \
memorization. Extract the most important terms, definitions and \
relationships from the provided material only. Each card tests ONE concept: \
a concise front prompt and a complete but compact back.

Priorities run from 1 (critical core concept) to 5 (supplementary detail).

Return ONLY a valid JSON object shaped exactly like this:
{
    \"flashcards\": [
        {
            \"front\": \"What is [concept]?\",
            \"back\": \"Clear, concise explanation\",
            \"priority\": 1
        }
    ]
}";

pub fn descriptor() -> AgentDescriptor {
    AgentDescriptor {
        name: "flashcard".to_owned(),
        description: "Generates flashcards from document content".to_owned(),
        persona: PERSONA.to_owned(),
        kind: AgentKind::Flashcard,
        defaults: GenerationDefaults {
            temperature: 0.5,
            max_tokens: 8192,
        },
    }
}

// Fewer cards means the instruction narrows to the most critical material.
fn detail_instruction(card_count: usize) -> &'static str {
    match card_count {
        0..=5 => "Focus ONLY on the most critical and fundamental concepts.",
        6..=10 => "Focus on critical and very important concepts, covering the core thoroughly.",
        11..=15 => "Include critical, very important, and important concepts.",
        16..=20 => "Include all important concepts plus helpful supplementary information.",
        _ => "Create comprehensive coverage from critical concepts down to supplementary detail.",
    }
}

pub struct FlashcardAgent {
    client: Arc<dyn GenerationClient>,
    persona: String,
    params: GenerationParams,
}

impl FlashcardAgent {
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
impl Agent for FlashcardAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Flashcard
    }

    #[instrument(skip_all, fields(agent = %self.kind()))]
    async fn generate(&self, request: AgentRequest) -> Result<AgentResponse, AppError> {
        let AgentRequest::Flashcards {
            context,
            card_count,
        } = request
        else {
            return Err(wrong_request(self.kind()));
        };

        let card_count = card_count.clamp(MIN_CARDS, MAX_CARDS);
        let instruction = format!(
            "Generate exactly {card_count} flashcards based on the content below.\n\n\
             {}\n\nStart with the most important concepts (priority 1-2) and fill \
             the rest with progressively less critical content. Return ONLY a valid \
             JSON object with the flashcards array.",
            detail_instruction(card_count)
        );

        let prompt = compose_prompt(&context, &instruction);
        let raw = self
            .client
            .complete(&self.persona, &prompt, &self.params)
            .await?;

        Ok(AgentResponse::Flashcards(flashcard::validate(&raw)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::test_support::{test_params, RecordingClient};
    use serde_json::json;

    #[tokio::test]
    async fn generates_cards_sorted_by_priority() {
        let response = json!({"flashcards": [
            {"front": "late", "back": "low priority", "priority": 5},
            {"front": "early", "back": "high priority", "priority": 1},
        ]})
        .to_string();
        let client = Arc::new(RecordingClient::with_response(response));
        let agent = FlashcardAgent::new(
            Arc::clone(&client) as Arc<dyn GenerationClient>,
            PERSONA.to_owned(),
            test_params(),
        );

        let result = agent
            .generate(AgentRequest::Flashcards {
                context: "Cell biology outline".to_owned(),
                card_count: 8,
            })
            .await
            .expect("generate");

        let AgentResponse::Flashcards(set) = result else {
            panic!("expected flashcards");
        };
        assert_eq!(set.flashcards[0].front, "early");
        assert!(client.recorded_prompts()[0].contains("exactly 8 flashcards"));
    }

    #[tokio::test]
    async fn card_count_is_clamped_low() {
        let response = json!({"flashcards": [{"front": "f", "back": "b"}]}).to_string();
        let client = Arc::new(RecordingClient::with_response(response));
        let agent = FlashcardAgent::new(
            Arc::clone(&client) as Arc<dyn GenerationClient>,
            PERSONA.to_owned(),
            test_params(),
        );

        agent
            .generate(AgentRequest::Flashcards {
                context: String::new(),
                card_count: 1,
            })
            .await
            .expect("generate");

        assert!(client.recorded_prompts()[0].contains("exactly 5 flashcards"));
    }
}
