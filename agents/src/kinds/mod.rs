pub mod chat;
pub mod evaluation;
pub mod flashcard;
pub mod flowchart;
pub mod podcast;
pub mod quiz;
pub mod summary;
pub mod text_artifact;

/// Standard prompt layout shared by the context-driven agents: the retrieved
/// material first, then the kind-specific instruction.
pub(crate) fn compose_prompt(context: &str, instruction: &str) -> String {
    format!("## Content to Process\n{context}\n\n## User Request\n{instruction}")
}
