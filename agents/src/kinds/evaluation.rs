use std::sync::Arc;

use async_trait::async_trait;
use common::{
    error::AppError,
    utils::generation::{GenerationClient, GenerationParams},
};
use tracing::instrument;

use crate::{
    contract::evaluation,
    registry::{AgentDescriptor, AgentKind, GenerationDefaults},
    wrong_request, Agent, AgentRequest, AgentResponse,
};

const MAX_REFERENCE_CHARS: usize = 6000;

const PERSONA: &str = "\
You are an experienced teacher grading a student's handwritten answer sheet. \
Read every question and answer from the image, evaluate each answer on its \
own merits, and score it as a percentage.

Return ONLY a valid JSON object in this exact format:
{
    \"questions\": [
        {
            \"question_text\": \"The question as written\",
            \"student_answer\": \"What the student wrote\",
            \"ideal_answer\": \"What a complete answer would say\",
            \"score_percentage\": 85.0,
            \"feedback\": \"Specific constructive feedback\",
            \"order\": 1
        }
    ],
    \"overall_score\": 85.0,
    \"general_feedback\": \"Overall assessment of the work\"
}";

/// Grading strictness on a 1 (lenient) to 10 (exacting) scale. Values
/// outside the range are clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strictness(u8);

impl Strictness {
    pub fn new(level: u8) -> Self {
        Self(level.clamp(1, 10))
    }

    pub fn level(self) -> u8 {
        self.0
    }

    fn grading_guide(self) -> &'static str {
        match self.0 {
            1..=3 => {
                "Grade leniently. Award generous partial credit for any relevant \
                 understanding, overlook minor omissions, and round scores up."
            }
            4..=7 => {
                "Grade fairly. Award partial credit proportional to the correctness \
                 and completeness of each answer."
            }
            _ => {
                "Grade strictly. Require precise, complete answers for full marks and \
                 deduct for vagueness, missing steps, and factual slips."
            }
        }
    }
}

impl Default for Strictness {
    fn default() -> Self {
        Self(5)
    }
}

impl std::fmt::Display for Strictness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn descriptor() -> AgentDescriptor {
    AgentDescriptor {
        name: "evaluation".to_owned(),
        description: "Grades answer-sheet images against optional reference material".to_owned(),
        persona: PERSONA.to_owned(),
        kind: AgentKind::Evaluation,
        defaults: GenerationDefaults {
            temperature: 0.3,
            max_tokens: 8192,
        },
    }
}

pub struct EvaluationAgent {
    client: Arc<dyn GenerationClient>,
    persona: String,
    params: GenerationParams,
}

impl EvaluationAgent {
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
impl Agent for EvaluationAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Evaluation
    }

    #[instrument(skip_all, fields(agent = %self.kind()))]
    async fn generate(&self, request: AgentRequest) -> Result<AgentResponse, AppError> {
        let AgentRequest::Evaluation {
            image,
            mime_type,
            strictness,
            reference,
        } = request
        else {
            return Err(wrong_request(self.kind()));
        };

        let mut prompt = format!(
            "Evaluate the answer sheet in the attached image.\n\nStrictness level: \
             {strictness}/10. {}\n",
            strictness.grading_guide()
        );
        if let Some(reference) = reference.as_deref().filter(|r| !r.trim().is_empty()) {
            let truncated: String = reference.chars().take(MAX_REFERENCE_CHARS).collect();
            prompt.push_str(&format!(
                "\n## Reference Material\nUse this material as the source of truth \
                 for ideal answers:\n{truncated}\n"
            ));
        }
        prompt.push_str(
            "\nTranscribe each question and answer from the image, then grade them. \
             Return the JSON object described in your instructions.",
        );

        let raw = self
            .client
            .complete_with_image(&self.persona, &prompt, &image, &mime_type, &self.params)
            .await?;

        Ok(AgentResponse::Evaluation(evaluation::validate(&raw)?))
    }
}
