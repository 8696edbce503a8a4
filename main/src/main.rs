use std::{path::PathBuf, sync::Arc, time::Duration};

use agents::{
    default_descriptors,
    kinds::{
        evaluation::Strictness, flowchart::DetailLevel, podcast::PodcastLevel, quiz::Difficulty,
        summary::SummaryStyle,
    },
    AgentConfig, AgentRegistry, AgentRequest, AgentResponse,
};
use clap::{Args, Parser, Subcommand};
use common::{
    error::AppError,
    utils::{
        config::get_config,
        embedding::EmbeddingProvider,
        generation::{mime_type_for_extension, OpenAiGenerationClient},
    },
};
use retrieval_pipeline::{Chunker, VectorStore};
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    RetryIf,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const RETRY_ATTEMPTS: usize = 3;
const CONTEXT_CHUNKS: usize = 20;

#[derive(Parser)]
#[command(name = "studykit", about = "Study artifact generation from documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, embed and index a document file
    Index {
        document_id: String,
        file: PathBuf,
    },
    /// Search an indexed document for the chunks nearest a query
    Search {
        document_id: String,
        query: String,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },
    /// Print the context string that would be handed to an agent
    Context {
        document_id: String,
        #[arg(long)]
        query: Option<String>,
        #[arg(long, default_value_t = CONTEXT_CHUNKS)]
        max_chunks: usize,
    },
    /// Remove a document's index bundle
    Delete { document_id: String },
    /// Generate a study artifact from an indexed document
    Generate {
        #[command(subcommand)]
        artifact: Artifact,
    },
    /// Ask a question grounded in an indexed document
    Chat {
        document_id: String,
        message: String,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
        #[command(flatten)]
        overrides: GenOverrides,
    },
    /// Grade a handwritten answer-sheet image
    Evaluate {
        image: PathBuf,
        #[arg(long, default_value_t = 5)]
        strictness: u8,
        /// Indexed document to use as reference material
        #[arg(long)]
        document_id: Option<String>,
        #[command(flatten)]
        overrides: GenOverrides,
    },
    /// List the registered agents
    Agents,
}

#[derive(Subcommand)]
enum Artifact {
    Quiz {
        document_id: String,
        #[arg(long, default_value = "medium")]
        difficulty: Difficulty,
        #[arg(long, default_value_t = 10)]
        questions: usize,
        #[command(flatten)]
        overrides: GenOverrides,
    },
    Flashcards {
        document_id: String,
        #[arg(long, default_value_t = 15)]
        cards: usize,
        #[command(flatten)]
        overrides: GenOverrides,
    },
    Flowchart {
        document_id: String,
        #[arg(long, default_value = "medium")]
        detail: DetailLevel,
        #[command(flatten)]
        overrides: GenOverrides,
    },
    Summary {
        document_id: String,
        #[arg(long, default_value = "detailed")]
        style: SummaryStyle,
        #[arg(long = "focus")]
        focus_areas: Vec<String>,
        #[command(flatten)]
        overrides: GenOverrides,
    },
    Podcast {
        document_id: String,
        #[arg(long, default_value = "intermediate")]
        level: PodcastLevel,
        #[command(flatten)]
        overrides: GenOverrides,
    },
}

#[derive(Args, Clone)]
struct GenOverrides {
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    temperature: Option<f32>,
    #[arg(long)]
    max_tokens: Option<u32>,
}

impl From<GenOverrides> for AgentConfig {
    fn from(overrides: GenOverrides) -> Self {
        AgentConfig {
            model: overrides.model,
            temperature: overrides.temperature,
            max_tokens: overrides.max_tokens,
        }
    }
}

struct App {
    store: VectorStore,
    registry: AgentRegistry,
}

impl App {
    fn from_env() -> anyhow::Result<Self> {
        let config = get_config()?;

        let openai_client = Arc::new(async_openai::Client::with_config(
            async_openai::config::OpenAIConfig::new()
                .with_api_key(config.openai_api_key.clone().unwrap_or_default())
                .with_api_base(&config.openai_base_url),
        ));
        let timeout = Duration::from_secs(config.request_timeout_secs);

        let embedder = match EmbeddingProvider::from_config(&config, Some(openai_client.clone())) {
            Ok(provider) => {
                info!(backend = provider.backend_label(), "embedding provider ready");
                Some(Arc::new(provider) as Arc<dyn common::utils::embedding::Embedder>)
            }
            Err(err) => {
                warn!(error = %err, "embeddings unavailable, retrieval commands will fail");
                None
            }
        };

        let chunker = Chunker::new(config.chunk_size, config.chunk_overlap)?;
        let store = VectorStore::new(&config.vector_store_dir, embedder, chunker)?;

        let generation_client = Arc::new(OpenAiGenerationClient::new(openai_client, timeout));
        let registry = AgentRegistry::new(
            generation_client,
            config.generation_model.clone(),
            default_descriptors(),
        )?;

        Ok(Self { store, registry })
    }

    /// Runs one agent generation with bounded retries on transient failures.
    async fn generate(
        &self,
        name: &str,
        config: &AgentConfig,
        request: AgentRequest,
    ) -> Result<AgentResponse, AppError> {
        let agent = self.registry.get(name, config)?;
        let strategy = ExponentialBackoff::from_millis(500)
            .map(jitter)
            .take(RETRY_ATTEMPTS - 1);
        RetryIf::spawn(
            strategy,
            || agent.generate(request.clone()),
            |err: &AppError| {
                let retryable = err.is_retryable();
                if retryable {
                    warn!(agent = %name, error = %err, "retrying after transient failure");
                }
                retryable
            },
        )
        .await
    }

    async fn context_for(&self, document_id: &str, query: Option<&str>) -> Result<String, AppError> {
        let context = self.store.context(document_id, query, CONTEXT_CHUNKS).await;
        if context.is_empty() {
            return Err(AppError::NotFound(format!(
                "document '{document_id}' is not indexed"
            )));
        }
        Ok(context)
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let app = App::from_env()?;

    match cli.command {
        Command::Index { document_id, file } => {
            let text = tokio::fs::read_to_string(&file).await?;
            let summary = app.store.build(&document_id, &text).await?;
            println!(
                "indexed '{document_id}': {} chunks, dimension {}",
                summary.chunk_count, summary.dimension
            );
        }
        Command::Search {
            document_id,
            query,
            top_k,
        } => {
            let hits = app.store.search(&document_id, &query, top_k).await?;
            print_json(&hits)?;
        }
        Command::Context {
            document_id,
            query,
            max_chunks,
        } => {
            let context = app
                .store
                .context(&document_id, query.as_deref(), max_chunks)
                .await;
            println!("{context}");
        }
        Command::Delete { document_id } => {
            app.store.delete(&document_id).await?;
            println!("deleted '{document_id}'");
        }
        Command::Generate { artifact } => run_generate(&app, artifact).await?,
        Command::Chat {
            document_id,
            message,
            top_k,
            overrides,
        } => {
            let context = app
                .store
                .context(&document_id, Some(&message), top_k)
                .await;
            let response = app
                .generate(
                    "chat",
                    &overrides.into(),
                    AgentRequest::Chat {
                        context,
                        message,
                        history: Vec::new(),
                    },
                )
                .await?;
            if let AgentResponse::Chat(reply) = response {
                println!("{}", reply.response);
                if !reply.sources_used {
                    println!("\n(answer was not grounded in the document)");
                }
            }
        }
        Command::Evaluate {
            image,
            strictness,
            document_id,
            overrides,
        } => {
            let bytes = tokio::fs::read(&image).await?;
            let extension = image
                .extension()
                .and_then(|ext| ext.to_str())
                .unwrap_or("png");
            let reference = match document_id {
                Some(id) => Some(app.context_for(&id, None).await?),
                None => None,
            };
            let response = app
                .generate(
                    "evaluation",
                    &overrides.into(),
                    AgentRequest::Evaluation {
                        image: bytes,
                        mime_type: mime_type_for_extension(extension).to_owned(),
                        strictness: Strictness::new(strictness),
                        reference,
                    },
                )
                .await?;
            if let AgentResponse::Evaluation(report) = response {
                print_json(&report)?;
            }
        }
        Command::Agents => {
            for (name, descriptor) in app.registry.list()? {
                println!(
                    "{name:<12} {} (temperature {}, max {} tokens)",
                    descriptor.description,
                    descriptor.defaults.temperature,
                    descriptor.defaults.max_tokens
                );
            }
        }
    }
    Ok(())
}

async fn run_generate(app: &App, artifact: Artifact) -> anyhow::Result<()> {
    match artifact {
        Artifact::Quiz {
            document_id,
            difficulty,
            questions,
            overrides,
        } => {
            let context = app.context_for(&document_id, None).await?;
            let response = app
                .generate(
                    "quiz",
                    &overrides.into(),
                    AgentRequest::Quiz {
                        context,
                        difficulty,
                        question_count: questions,
                    },
                )
                .await?;
            if let AgentResponse::Quiz(set) = response {
                print_json(&set)?;
            }
        }
        Artifact::Flashcards {
            document_id,
            cards,
            overrides,
        } => {
            let context = app.context_for(&document_id, None).await?;
            let response = app
                .generate(
                    "flashcard",
                    &overrides.into(),
                    AgentRequest::Flashcards {
                        context,
                        card_count: cards,
                    },
                )
                .await?;
            if let AgentResponse::Flashcards(set) = response {
                print_json(&set)?;
            }
        }
        Artifact::Flowchart {
            document_id,
            detail,
            overrides,
        } => {
            let context = app.context_for(&document_id, None).await?;
            let response = app
                .generate(
                    "flowchart",
                    &overrides.into(),
                    AgentRequest::Flowcharts { context, detail },
                )
                .await?;
            if let AgentResponse::Flowcharts(set) = response {
                print_json(&set)?;
            }
        }
        Artifact::Summary {
            document_id,
            style,
            focus_areas,
            overrides,
        } => {
            let context = app.context_for(&document_id, None).await?;
            let response = app
                .generate(
                    "summary",
                    &overrides.into(),
                    AgentRequest::Summary {
                        context,
                        style,
                        focus_areas,
                    },
                )
                .await?;
            if let AgentResponse::Summary(artifact) = response {
                println!("{}", artifact.text);
            }
        }
        Artifact::Podcast {
            document_id,
            level,
            overrides,
        } => {
            let context = app.context_for(&document_id, None).await?;
            let response = app
                .generate(
                    "podcast",
                    &overrides.into(),
                    AgentRequest::Podcast { context, level },
                )
                .await?;
            if let AgentResponse::Podcast(artifact) = response {
                println!("{}", artifact.text);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    run(Cli::parse()).await
}
