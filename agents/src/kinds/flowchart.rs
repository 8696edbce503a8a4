use std::{str::FromStr, sync::Arc};

use async_trait::async_trait;
use common::{
    error::AppError,
    utils::generation::{GenerationClient, GenerationParams},
};
use tracing::instrument;

use crate::{
    contract::flowchart,
    kinds::compose_prompt,
    registry::{AgentDescriptor, AgentKind, GenerationDefaults},
    wrong_request, Agent, AgentRequest, AgentResponse,
};

const PERSONA: &str = "\
You are an expert at visualizing educational content as flowcharts and \
concept maps. Only create nodes from information present in the provided \
material, keep labels to 2-6 words, and keep every flowchart connected.

Node types: start, end, concept, action, decision.

Return ONLY a valid JSON object with a \"flowcharts\" key holding a LIST of \
flowchart objects:
{
    \"flowcharts\": [
        {
            \"title\": \"Flowchart title\",
            \"description\": \"What it shows\",
            \"nodes\": [{\"id\": \"1\", \"label\": \"Start\", \"type\": \"start\"}],
            \"edges\": [{\"from\": \"1\", \"to\": \"2\", \"label\": \"\"}]
        }
    ]
}

Node IDs must be unique strings within each flowchart.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetailLevel {
    Simple,
    #[default]
    Medium,
    Detailed,
}

impl DetailLevel {
    fn guidance(self) -> (&'static str, &'static str) {
        match self {
            Self::Simple => (
                "1",
                "Create 1 simple flowchart of 5-10 nodes covering the most fundamental concept.",
            ),
            Self::Medium => (
                "1-2",
                "Create 1-2 flowcharts of 10-15 nodes: one high-level overview and \
                 optionally one specific process.",
            ),
            Self::Detailed => (
                "2-3",
                "Create 2-3 flowcharts of 15-20 nodes covering the main process and \
                 detailed sub-processes or distinct sections.",
            ),
        }
    }
}

impl FromStr for DetailLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "medium" => Ok(Self::Medium),
            "detailed" => Ok(Self::Detailed),
            other => Err(AppError::Validation(format!(
                "unknown detail level '{other}'. Expected 'simple', 'medium', or 'detailed'."
            ))),
        }
    }
}

impl std::fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simple => write!(f, "simple"),
            Self::Medium => write!(f, "medium"),
            Self::Detailed => write!(f, "detailed"),
        }
    }
}

pub fn descriptor() -> AgentDescriptor {
    AgentDescriptor {
        name: "flowchart".to_owned(),
        description: "Generates concept flowcharts from document content".to_owned(),
        persona: PERSONA.to_owned(),
        kind: AgentKind::Flowchart,
        defaults: GenerationDefaults {
            temperature: 0.5,
            max_tokens: 8192,
        },
    }
}

pub struct FlowchartAgent {
    client: Arc<dyn GenerationClient>,
    persona: String,
    params: GenerationParams,
}

impl FlowchartAgent {
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
impl Agent for FlowchartAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Flowchart
    }

    #[instrument(skip_all, fields(agent = %self.kind()))]
    async fn generate(&self, request: AgentRequest) -> Result<AgentResponse, AppError> {
        let AgentRequest::Flowcharts { context, detail } = request else {
            return Err(wrong_request(self.kind()));
        };

        let (count, guidance) = detail.guidance();
        let instruction = format!(
            "Analyze the content below and create {count} flowchart(s) at the \
             '{detail}' detail level.\n\n{guidance}\nEach flowchart must focus on a \
             distinct coherent topic and use appropriate node types.\n\nReturn a \
             JSON object with a 'flowcharts' list containing the data."
        );

        let prompt = compose_prompt(&context, &instruction);
        let raw = self
            .client
            .complete(&self.persona, &prompt, &self.params)
            .await?;

        Ok(AgentResponse::Flowcharts(flowchart::validate(&raw)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::test_support::{test_params, RecordingClient};
    use serde_json::json;

    #[tokio::test]
    async fn generates_validated_flowcharts() {
        let response = json!({"flowcharts": [{
            "title": "Mitosis",
            "nodes": [
                {"id": "1", "label": "Prophase", "type": "start"},
                {"id": "2", "label": "Metaphase", "type": "concept"},
            ],
            "edges": [{"from": "1", "to": "2", "label": "then"}]
        }]})
        .to_string();
        let client = Arc::new(RecordingClient::with_response(response));
        let agent = FlowchartAgent::new(
            Arc::clone(&client) as Arc<dyn GenerationClient>,
            PERSONA.to_owned(),
            test_params(),
        );

        let result = agent
            .generate(AgentRequest::Flowcharts {
                context: "Mitosis phases".to_owned(),
                detail: DetailLevel::Detailed,
            })
            .await
            .expect("generate");

        let AgentResponse::Flowcharts(set) = result else {
            panic!("expected flowcharts");
        };
        assert_eq!(set.count, 1);
        assert_eq!(set.flowcharts[0].node_count, 2);
        assert!(client.recorded_prompts()[0].contains("'detailed' detail level"));
    }

    #[test]
    fn detail_level_parses_and_defaults() {
        assert_eq!(
            "simple".parse::<DetailLevel>().ok(),
            Some(DetailLevel::Simple)
        );
        assert_eq!(DetailLevel::default(), DetailLevel::Medium);
        assert!("extreme".parse::<DetailLevel>().is_err());
    }
}
