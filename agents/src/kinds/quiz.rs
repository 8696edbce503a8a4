use std::{str::FromStr, sync::Arc};

use async_trait::async_trait;
use common::{
    error::AppError,
    utils::generation::{GenerationClient, GenerationParams},
};
use tracing::instrument;

use crate::{
    contract::quiz,
    kinds::compose_prompt,
    registry::{AgentDescriptor, AgentKind, GenerationDefaults},
    wrong_request, Agent, AgentRequest, AgentResponse,
};

const MIN_QUESTIONS: usize = 5;
const MAX_QUESTIONS: usize = 20;

const PERSONA: &str = "\
You are an expert educational quiz creator. Create clear multiple choice \
questions that test genuine understanding of the provided material only - \
never add outside information.

Return ONLY a valid JSON object shaped exactly like this:
{
    \"questions\": [
        {
            \"question\": \"The question text?\",
            \"option_a\": \"First option\",
            \"option_b\": \"Second option\",
            \"option_c\": \"Third option\",
            \"option_d\": \"Fourth option\",
            \"correct_answer\": \"A\",
            \"explanation\": \"Why this is correct.\"
        }
    ]
}

The correct_answer field must be exactly one letter: A, B, C, or D. Keep all \
four options plausible and similar in length, avoid \"all of the above\", and \
distribute correct answers across the letters.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    fn instruction(self) -> &'static str {
        match self {
            Self::Easy => {
                "Create EASY questions that test basic recall and understanding. \
                 Focus on main concepts and definitions."
            }
            Self::Medium => {
                "Create MEDIUM difficulty questions that require understanding \
                 relationships between concepts and basic application."
            }
            Self::Hard => {
                "Create HARD questions that require analysis, synthesis, or \
                 evaluation, connecting multiple ideas."
            }
        }
    }
}

impl FromStr for Difficulty {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(AppError::Validation(format!(
                "unknown difficulty '{other}'. Expected 'easy', 'medium', or 'hard'."
            ))),
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Easy => write!(f, "easy"),
            Self::Medium => write!(f, "medium"),
            Self::Hard => write!(f, "hard"),
        }
    }
}

pub fn descriptor() -> AgentDescriptor {
    AgentDescriptor {
        name: "quiz".to_owned(),
        description: "Generates MCQ quizzes from document content".to_owned(),
        persona: PERSONA.to_owned(),
        kind: AgentKind::Quiz,
        defaults: GenerationDefaults {
            temperature: 0.6,
            max_tokens: 8192,
        },
    }
}

pub struct QuizAgent {
    client: Arc<dyn GenerationClient>,
    persona: String,
    params: GenerationParams,
}

impl QuizAgent {
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
impl Agent for QuizAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Quiz
    }

    #[instrument(skip_all, fields(agent = %self.kind()))]
    async fn generate(&self, request: AgentRequest) -> Result<AgentResponse, AppError> {
        let AgentRequest::Quiz {
            context,
            difficulty,
            question_count,
        } = request
        else {
            return Err(wrong_request(self.kind()));
        };

        let question_count = question_count.clamp(MIN_QUESTIONS, MAX_QUESTIONS);
        let instruction = format!(
            "Generate exactly {question_count} multiple choice questions based on \
             the content below.\n\nDifficulty Level: {}\n{}\n\nReturn ONLY a valid \
             JSON object with the questions array.",
            difficulty.to_string().to_uppercase(),
            difficulty.instruction()
        );

        let prompt = compose_prompt(&context, &instruction);
        let raw = self
            .client
            .complete(&self.persona, &prompt, &self.params)
            .await?;

        Ok(AgentResponse::Quiz(quiz::validate(&raw)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::test_support::{test_params, RecordingClient};
    use serde_json::json;

    fn quiz_response() -> String {
        json!({"questions": [{
            "question": "What is chlorophyll for?",
            "option_a": "Absorbing light",
            "option_b": "Storing water",
            "option_c": "Making proteins",
            "option_d": "Cell division",
            "correct_answer": "a",
            "explanation": "It captures light energy."
        }]})
        .to_string()
    }

    #[tokio::test]
    async fn generates_a_validated_quiz_set() {
        let client = Arc::new(RecordingClient::with_response(quiz_response()));
        let agent = QuizAgent::new(
            Arc::clone(&client) as Arc<dyn GenerationClient>,
            PERSONA.to_owned(),
            test_params(),
        );

        let response = agent
            .generate(AgentRequest::Quiz {
                context: "Photosynthesis notes".to_owned(),
                difficulty: Difficulty::Hard,
                question_count: 7,
            })
            .await
            .expect("generate");

        let AgentResponse::Quiz(set) = response else {
            panic!("expected quiz response");
        };
        assert_eq!(set.count, 1);
        assert_eq!(set.questions[0].correct_answer, "A");

        let prompts = client.recorded_prompts();
        assert!(prompts[0].contains("exactly 7 multiple choice questions"));
        assert!(prompts[0].contains("HARD"));
        assert!(prompts[0].contains("Photosynthesis notes"));
    }

    #[tokio::test]
    async fn question_count_is_clamped_into_range() {
        let client = Arc::new(RecordingClient::with_response(quiz_response()));
        let agent = QuizAgent::new(
            Arc::clone(&client) as Arc<dyn GenerationClient>,
            PERSONA.to_owned(),
            test_params(),
        );

        agent
            .generate(AgentRequest::Quiz {
                context: String::new(),
                difficulty: Difficulty::Medium,
                question_count: 100,
            })
            .await
            .expect("generate");

        assert!(client.recorded_prompts()[0].contains("exactly 20 multiple choice questions"));
    }

    #[tokio::test]
    async fn mismatched_request_kind_is_rejected() {
        let client = Arc::new(RecordingClient::with_response(quiz_response()));
        let agent = QuizAgent::new(client, PERSONA.to_owned(), test_params());

        let err = agent
            .generate(AgentRequest::Podcast {
                context: String::new(),
                level: crate::kinds::podcast::PodcastLevel::Beginner,
            })
            .await
            .err()
            .expect("must fail");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn difficulty_parses_case_insensitively() {
        assert_eq!("HARD".parse::<Difficulty>().ok(), Some(Difficulty::Hard));
        assert!("expert".parse::<Difficulty>().is_err());
    }
}
