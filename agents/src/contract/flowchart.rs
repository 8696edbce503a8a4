use std::collections::HashSet;

use common::error::AppError;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{parse, required_field, string_field};

const VALID_NODE_TYPES: [&str; 5] = ["start", "end", "concept", "action", "decision"];
const DEFAULT_NODE_TYPE: &str = "concept";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FlowNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FlowEdge {
    pub from: String,
    pub to: String,
    pub label: String,
}

/// One validated concept graph. Counts are computed from the validated
/// node/edge lists, never trusted from the response.
#[derive(Debug, Clone, Serialize)]
pub struct Flowchart {
    pub title: String,
    pub description: String,
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
    pub node_count: usize,
    pub edge_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowchartSet {
    pub flowcharts: Vec<Flowchart>,
    pub count: usize,
}

/// Validates a raw flowchart response.
///
/// A response may carry several graphs under `flowcharts`; a bare single
/// graph with a `nodes` key is accepted too. Edges referencing ids outside
/// the graph's validated node set are silently dropped; graphs with zero
/// valid nodes disappear from the output. An output without any surviving
/// graph is a failure.
pub fn validate(raw: &str) -> Result<FlowchartSet, AppError> {
    let payload = parse::extract_payload(raw, &["flowcharts", "nodes"])?;

    let graphs: Vec<&Value> = match payload.get("flowcharts").and_then(Value::as_array) {
        Some(list) => list.iter().collect(),
        None if payload.get("nodes").is_some() => vec![&payload],
        None => {
            return Err(AppError::LLMParsing(
                "response holds neither a flowcharts list nor a bare graph".into(),
            ))
        }
    };

    let flowcharts: Vec<Flowchart> = graphs.into_iter().filter_map(validate_graph).collect();
    if flowcharts.is_empty() {
        return Err(AppError::ValidationEmpty(
            "No valid flowcharts generated".into(),
        ));
    }

    debug!(count = flowcharts.len(), "flowchart response validated");
    let count = flowcharts.len();
    Ok(FlowchartSet { flowcharts, count })
}

fn validate_graph(graph: &Value) -> Option<Flowchart> {
    let mut nodes = Vec::new();
    let mut node_ids: HashSet<String> = HashSet::new();

    for node in graph.get("nodes").and_then(Value::as_array)? {
        let Some(id) = required_field(node, "id") else {
            continue;
        };
        let Some(label) = required_field(node, "label") else {
            continue;
        };

        let node_type = string_field(node, "type")
            .map(|t| t.to_lowercase())
            .filter(|t| VALID_NODE_TYPES.contains(&t.as_str()))
            .unwrap_or_else(|| DEFAULT_NODE_TYPE.to_owned());

        node_ids.insert(id.clone());
        nodes.push(FlowNode {
            id,
            label,
            node_type,
        });
    }

    if nodes.is_empty() {
        return None;
    }

    let edges: Vec<FlowEdge> = graph
        .get("edges")
        .and_then(Value::as_array)
        .map(|edges| {
            edges
                .iter()
                .filter_map(|edge| {
                    let from = required_field(edge, "from")?;
                    let to = required_field(edge, "to")?;
                    if !node_ids.contains(&from) || !node_ids.contains(&to) {
                        return None;
                    }
                    Some(FlowEdge {
                        from,
                        to,
                        label: string_field(edge, "label").unwrap_or_default(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Some(Flowchart {
        title: string_field(graph, "title").unwrap_or_else(|| "Concept Flowchart".to_owned()),
        description: string_field(graph, "description").unwrap_or_default(),
        node_count: nodes.len(),
        edge_count: edges.len(),
        nodes,
        edges,
    })
}
