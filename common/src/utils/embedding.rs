use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::Arc,
    time::Duration,
};

use async_openai::{types::CreateEmbeddingRequestArgs, Client};
use async_trait::async_trait;
use tracing::debug;

use crate::{
    error::AppError,
    utils::config::{AppConfig, EmbeddingBackend},
};

/// Capability of turning text into fixed-length vectors.
///
/// The retrieval layer only depends on this trait; wiring a concrete backend
/// is the composition root's job. An unconfigured backend must fail loudly at
/// construction time rather than hand back empty vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, AppError>;

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError>;
}

#[derive(Clone)]
pub struct EmbeddingProvider {
    inner: EmbeddingInner,
    request_timeout: Duration,
}

#[derive(Clone)]
enum EmbeddingInner {
    OpenAi {
        client: Arc<Client<async_openai::config::OpenAIConfig>>,
        model: String,
        dimensions: u32,
    },
    Hashed {
        dimension: usize,
    },
}

impl EmbeddingProvider {
    pub fn backend_label(&self) -> &'static str {
        match self.inner {
            EmbeddingInner::Hashed { .. } => "hashed",
            EmbeddingInner::OpenAi { .. } => "openai",
        }
    }

    pub fn new_openai(
        client: Arc<Client<async_openai::config::OpenAIConfig>>,
        model: String,
        dimensions: u32,
        request_timeout: Duration,
    ) -> Self {
        EmbeddingProvider {
            inner: EmbeddingInner::OpenAi {
                client,
                model,
                dimensions,
            },
            request_timeout,
        }
    }

    pub fn new_hashed(dimension: usize) -> Self {
        EmbeddingProvider {
            inner: EmbeddingInner::Hashed {
                dimension: dimension.max(1),
            },
            request_timeout: Duration::from_secs(5),
        }
    }

    /// Builds the provider selected by configuration.
    ///
    /// Selecting the OpenAI backend without an API key is a configuration
    /// error, not a per-call failure.
    pub fn from_config(
        config: &AppConfig,
        client: Option<Arc<Client<async_openai::config::OpenAIConfig>>>,
    ) -> Result<Self, AppError> {
        match config.embedding_backend {
            EmbeddingBackend::Hashed => {
                Ok(Self::new_hashed(config.embedding_dimensions as usize))
            }
            EmbeddingBackend::OpenAi => {
                if config.openai_api_key.is_none() {
                    return Err(AppError::Configuration(
                        "Embeddings model not configured. Check OPENAI_API_KEY.".into(),
                    ));
                }
                let client = client.ok_or_else(|| {
                    AppError::Configuration("No OpenAI client available for embeddings".into())
                })?;
                Ok(Self::new_openai(
                    client,
                    config.embedding_model.clone(),
                    config.embedding_dimensions,
                    Duration::from_secs(config.request_timeout_secs),
                ))
            }
        }
    }

    async fn openai_request(
        client: &Client<async_openai::config::OpenAIConfig>,
        model: &str,
        dimensions: u32,
        inputs: Vec<String>,
        timeout: Duration,
    ) -> Result<Vec<Vec<f32>>, AppError> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(model)
            .input(inputs)
            .dimensions(dimensions)
            .build()?;

        let response = tokio::time::timeout(timeout, client.embeddings().create(request))
            .await
            .map_err(|_| {
                AppError::ExternalCall(format!(
                    "embedding request timed out after {}s",
                    timeout.as_secs()
                ))
            })??;

        let embeddings: Vec<Vec<f32>> = response
            .data
            .into_iter()
            .map(|item| item.embedding)
            .collect();

        if embeddings.is_empty() {
            return Err(AppError::ExternalCall(
                "No embedding data received from API".into(),
            ));
        }

        debug!(count = embeddings.len(), "received embeddings");
        Ok(embeddings)
    }
}

#[async_trait]
impl Embedder for EmbeddingProvider {
    fn dimension(&self) -> usize {
        match &self.inner {
            EmbeddingInner::Hashed { dimension } => *dimension,
            EmbeddingInner::OpenAi { dimensions, .. } => *dimensions as usize,
        }
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, AppError> {
        match &self.inner {
            EmbeddingInner::Hashed { dimension } => Ok(hashed_embedding(text, *dimension)),
            EmbeddingInner::OpenAi {
                client,
                model,
                dimensions,
            } => {
                let mut embeddings = Self::openai_request(
                    client,
                    model,
                    *dimensions,
                    vec![text.to_owned()],
                    self.request_timeout,
                )
                .await?;
                Ok(embeddings.swap_remove(0))
            }
        }
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        match &self.inner {
            EmbeddingInner::Hashed { dimension } => Ok(texts
                .iter()
                .map(|text| hashed_embedding(text, *dimension))
                .collect()),
            EmbeddingInner::OpenAi {
                client,
                model,
                dimensions,
            } => {
                Self::openai_request(
                    client,
                    model,
                    *dimensions,
                    texts.to_vec(),
                    self.request_timeout,
                )
                .await
            }
        }
    }
}

// Helper functions for hashed embeddings
fn hashed_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let dim = dimension.max(1);
    let mut vector = vec![0.0f32; dim];
    if text.is_empty() {
        return vector;
    }

    for token in tokens(text) {
        let idx = bucket(&token, dim);
        vector[idx] += 1.0;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }

    vector
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_ascii_lowercase())
}

fn bucket(token: &str, dimension: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    (hasher.finish() as usize) % dimension
}
