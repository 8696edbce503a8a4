use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use common::{error::AppError, utils::embedding::Embedder};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::{chunker::Chunker, index::FlatIndex};

/// Delimiter between context sections handed to a generation prompt.
pub const SECTION_DELIMITER: &str = "\n\n---\n\n";

/// Outcome of a successful index build.
#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    pub chunk_count: usize,
    pub dimension: usize,
}

/// One retrieval hit: chunk text plus its raw squared-distance score
/// (smaller means more relevant). Ephemeral, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub text: String,
    pub distance: f32,
}

/// Sidecar record persisted next to the serialized index.
///
/// Invariant: `chunk_count == chunks.len() == index.len()`. A bundle whose
/// sidecar disagrees with its index is treated as not indexed.
#[derive(Debug, Serialize, Deserialize)]
struct BundleMetadata {
    chunks: Vec<String>,
    chunk_count: usize,
    dimension: usize,
    indexed_at: DateTime<Utc>,
}

/// Per-document vector store over flat on-disk bundles.
///
/// Each document id owns exactly one bundle: `<id>.index` holding the
/// serialized [`FlatIndex`] and `<id>.json` holding the parallel chunk list.
/// Bundles are replaced in full on re-indexing; a reader never observes an
/// index and chunk list written by different builds because replacement
/// happens via temp-file rename under the same per-document lock reads take.
pub struct VectorStore {
    store_dir: PathBuf,
    embedder: Option<Arc<dyn Embedder>>,
    chunker: Chunker,
    document_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl VectorStore {
    pub fn new(
        store_dir: impl Into<PathBuf>,
        embedder: Option<Arc<dyn Embedder>>,
        chunker: Chunker,
    ) -> Result<Self, AppError> {
        let store_dir = store_dir.into();
        std::fs::create_dir_all(&store_dir)?;
        Ok(Self {
            store_dir,
            embedder,
            chunker,
            document_locks: Mutex::new(HashMap::new()),
        })
    }

    fn embedder(&self) -> Result<&Arc<dyn Embedder>, AppError> {
        self.embedder.as_ref().ok_or_else(|| {
            AppError::Configuration(
                "Embeddings model not configured. Check OPENAI_API_KEY.".into(),
            )
        })
    }

    fn index_path(&self, document_id: &str) -> PathBuf {
        self.store_dir.join(format!("{document_id}.index"))
    }

    fn metadata_path(&self, document_id: &str) -> PathBuf {
        self.store_dir.join(format!("{document_id}.json"))
    }

    async fn lock_for(&self, document_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.document_locks.lock().await;
        Arc::clone(
            locks
                .entry(document_id.to_owned())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Chunks, embeds and indexes `text`, replacing any prior bundle for the
    /// document in full. Embedding happens before the per-document lock is
    /// taken; only the bundle swap itself is serialized.
    #[instrument(skip(self, text), fields(document_id = %document_id))]
    pub async fn build(&self, document_id: &str, text: &str) -> Result<IndexSummary, AppError> {
        let embedder = self.embedder()?;

        let chunks = self.chunker.split(text);
        if chunks.is_empty() {
            return Err(AppError::Validation(
                "No text chunks created from document.".into(),
            ));
        }

        let embeddings = embedder.embed_many(&chunks).await?;
        let index = FlatIndex::from_vectors(embeddings)?;
        let metadata = BundleMetadata {
            chunk_count: chunks.len(),
            dimension: index.dimension(),
            chunks,
            indexed_at: Utc::now(),
        };

        let lock = self.lock_for(document_id).await;
        let _guard = lock.lock().await;
        self.persist_bundle(document_id, &index, &metadata).await?;

        debug!(
            chunk_count = metadata.chunk_count,
            dimension = metadata.dimension,
            "document indexed"
        );
        Ok(IndexSummary {
            chunk_count: metadata.chunk_count,
            dimension: metadata.dimension,
        })
    }

    /// Returns the `min(top_k, chunk_count)` chunks nearest to `query`,
    /// ascending by distance with ties broken by original chunk order.
    #[instrument(skip(self, query), fields(document_id = %document_id, top_k))]
    pub async fn search(
        &self,
        document_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, AppError> {
        let embedder = self.embedder()?;
        let (index, metadata) = self.load_bundle(document_id).await?;

        let query_embedding = embedder.embed_one(query).await?;
        let hits = index.search(&query_embedding, top_k.min(metadata.chunk_count))?;

        Ok(hits
            .into_iter()
            .filter_map(|(position, distance)| {
                metadata.chunks.get(position).map(|text| ScoredChunk {
                    text: text.clone(),
                    distance,
                })
            })
            .collect())
    }

    /// Assembles a context string for generation.
    ///
    /// With a query, the top `max_chunks` search hits are joined by
    /// [`SECTION_DELIMITER`]. When search fails or returns nothing, or when no
    /// query is given, the first `max_chunks` stored chunks are used in
    /// original order. A missing bundle yields an empty string so the caller
    /// can fall back to the raw document text.
    #[instrument(skip(self, query), fields(document_id = %document_id, max_chunks))]
    pub async fn context(
        &self,
        document_id: &str,
        query: Option<&str>,
        max_chunks: usize,
    ) -> String {
        if let Some(query) = query {
            match self.search(document_id, query, max_chunks).await {
                Ok(hits) if !hits.is_empty() => {
                    return hits
                        .into_iter()
                        .map(|hit| hit.text)
                        .collect::<Vec<_>>()
                        .join(SECTION_DELIMITER);
                }
                Ok(_) => debug!("search returned no hits, falling back to leading chunks"),
                Err(err) => debug!(error = %err, "search failed, falling back to leading chunks"),
            }
        }

        match self.load_metadata(document_id).await {
            Ok(metadata) => metadata
                .chunks
                .into_iter()
                .take(max_chunks)
                .collect::<Vec<_>>()
                .join(SECTION_DELIMITER),
            Err(_) => String::new(),
        }
    }

    /// Removes the document's bundle. Absence is not an error, so a second
    /// delete for the same id is a no-op.
    #[instrument(skip(self), fields(document_id = %document_id))]
    pub async fn delete(&self, document_id: &str) -> Result<(), AppError> {
        let lock = self.lock_for(document_id).await;
        let _guard = lock.lock().await;

        for path in [
            self.index_path(document_id),
            self.metadata_path(document_id),
        ] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    /// Both bundle artifacts must be present for a document to count as
    /// indexed; partial presence is treated as not indexed.
    pub fn exists(&self, document_id: &str) -> bool {
        self.index_path(document_id).exists() && self.metadata_path(document_id).exists()
    }

    async fn load_bundle(
        &self,
        document_id: &str,
    ) -> Result<(FlatIndex, BundleMetadata), AppError> {
        let lock = self.lock_for(document_id).await;
        let _guard = lock.lock().await;

        let index_bytes = read_or_not_found(self.index_path(document_id), document_id).await?;
        let metadata_bytes = read_or_not_found(self.metadata_path(document_id), document_id).await?;

        let index: FlatIndex = serde_json::from_slice(&index_bytes)?;
        let metadata: BundleMetadata = serde_json::from_slice(&metadata_bytes)?;

        if metadata.chunk_count != metadata.chunks.len() || metadata.chunk_count != index.len() {
            warn!(
                document_id,
                declared = metadata.chunk_count,
                chunks = metadata.chunks.len(),
                vectors = index.len(),
                "bundle invariant violated, treating document as not indexed"
            );
            return Err(AppError::NotFound(format!(
                "Document index not found for: {document_id}"
            )));
        }

        Ok((index, metadata))
    }

    async fn load_metadata(&self, document_id: &str) -> Result<BundleMetadata, AppError> {
        let lock = self.lock_for(document_id).await;
        let _guard = lock.lock().await;

        let metadata_bytes = read_or_not_found(self.metadata_path(document_id), document_id).await?;
        Ok(serde_json::from_slice(&metadata_bytes)?)
    }

    // Write both artifacts to temp files in the store directory, then rename
    // into place. Rename is atomic within one filesystem, so a reader holding
    // the lock next sees either the old pair or the new pair.
    async fn persist_bundle(
        &self,
        document_id: &str,
        index: &FlatIndex,
        metadata: &BundleMetadata,
    ) -> Result<(), AppError> {
        let index_bytes = serde_json::to_vec(index)?;
        let metadata_bytes = serde_json::to_vec(metadata)?;

        write_via_rename(&self.store_dir, self.index_path(document_id), &index_bytes).await?;
        write_via_rename(
            &self.store_dir,
            self.metadata_path(document_id),
            &metadata_bytes,
        )
        .await?;
        Ok(())
    }
}

async fn write_via_rename(
    store_dir: &Path,
    target: PathBuf,
    bytes: &[u8],
) -> Result<(), AppError> {
    let staging = store_dir.join(format!(".tmp-{}", Uuid::new_v4()));
    tokio::fs::write(&staging, bytes).await?;
    tokio::fs::rename(&staging, &target).await?;
    Ok(())
}

async fn read_or_not_found(path: PathBuf, document_id: &str) -> Result<Vec<u8>, AppError> {
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(bytes),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(AppError::NotFound(
            format!("Document index not found for: {document_id}"),
        )),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::utils::embedding::EmbeddingProvider;
    use tempfile::TempDir;

    const DOC_TEXT: &str = "Photosynthesis converts light into chemical energy.\n\n\
                            Cellular respiration releases that stored energy.\n\n\
                            Mitochondria are the site of respiration in eukaryotes.\n\n\
                            Chloroplasts host photosynthesis in plant cells.";

    fn test_store(dir: &TempDir) -> VectorStore {
        let embedder: Arc<dyn Embedder> = Arc::new(EmbeddingProvider::new_hashed(64));
        VectorStore::new(
            dir.path(),
            Some(embedder),
            Chunker::new(80, 10).expect("valid chunker"),
        )
        .expect("store should initialize")
    }

    #[tokio::test]
    async fn build_then_search_returns_bounded_sorted_results() {
        let dir = TempDir::new().expect("tempdir");
        let store = test_store(&dir);

        let summary = store.build("doc-1", DOC_TEXT).await.expect("build");
        assert!(summary.chunk_count >= 2);
        assert!(store.exists("doc-1"));

        let hits = store
            .search("doc-1", "where does respiration happen", 3)
            .await
            .expect("search");

        assert!(hits.len() <= 3.min(summary.chunk_count));
        assert!(!hits.is_empty());
        for pair in hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[tokio::test]
    async fn search_without_an_index_is_not_found() {
        let dir = TempDir::new().expect("tempdir");
        let store = test_store(&dir);

        let err = store
            .search("never-built", "anything", 5)
            .await
            .err()
            .expect("must fail");
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn empty_document_fails_validation() {
        let dir = TempDir::new().expect("tempdir");
        let store = test_store(&dir);

        let err = store.build("doc-1", "").await.err().expect("must fail");
        assert!(matches!(err, AppError::Validation(_)));
        assert!(!store.exists("doc-1"));
    }

    #[tokio::test]
    async fn missing_embedder_is_a_configuration_error() {
        let dir = TempDir::new().expect("tempdir");
        let store = VectorStore::new(
            dir.path(),
            None,
            Chunker::new(80, 10).expect("valid chunker"),
        )
        .expect("store should initialize");

        let err = store.build("doc-1", DOC_TEXT).await.err().expect("fail");
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = TempDir::new().expect("tempdir");
        let store = test_store(&dir);

        store.build("doc-1", DOC_TEXT).await.expect("build");
        assert!(store.exists("doc-1"));

        store.delete("doc-1").await.expect("first delete");
        assert!(!store.exists("doc-1"));
        store.delete("doc-1").await.expect("second delete is a no-op");
    }

    #[tokio::test]
    async fn rebuild_replaces_the_bundle_in_full() {
        let dir = TempDir::new().expect("tempdir");
        let store = test_store(&dir);

        let first = store.build("doc-1", DOC_TEXT).await.expect("build");
        let second = store
            .build("doc-1", "One tiny replacement document.")
            .await
            .expect("rebuild");

        assert!(second.chunk_count < first.chunk_count);
        let hits = store
            .search("doc-1", "replacement", 10)
            .await
            .expect("search");
        assert_eq!(hits.len(), second.chunk_count);
    }

    #[tokio::test]
    async fn context_joins_search_hits_with_the_section_delimiter() {
        let dir = TempDir::new().expect("tempdir");
        let store = test_store(&dir);
        store.build("doc-1", DOC_TEXT).await.expect("build");

        let context = store
            .context("doc-1", Some("photosynthesis in plants"), 2)
            .await;

        assert!(!context.is_empty());
        assert!(context.matches(SECTION_DELIMITER).count() <= 1);
    }

    #[tokio::test]
    async fn context_without_query_uses_leading_chunks_in_order() {
        let dir = TempDir::new().expect("tempdir");
        let store = test_store(&dir);
        store.build("doc-1", DOC_TEXT).await.expect("build");

        let context = store.context("doc-1", None, 1).await;
        assert!(context.starts_with("Photosynthesis"));
        assert!(!context.contains(SECTION_DELIMITER));
    }

    #[tokio::test]
    async fn context_for_unknown_document_is_empty_not_an_error() {
        let dir = TempDir::new().expect("tempdir");
        let store = test_store(&dir);

        assert_eq!(store.context("ghost", Some("query"), 5).await, "");
        assert_eq!(store.context("ghost", None, 5).await, "");
    }

    #[tokio::test]
    async fn partial_bundle_presence_counts_as_not_indexed() {
        let dir = TempDir::new().expect("tempdir");
        let store = test_store(&dir);
        store.build("doc-1", DOC_TEXT).await.expect("build");

        tokio::fs::remove_file(dir.path().join("doc-1.index"))
            .await
            .expect("remove index artifact");

        assert!(!store.exists("doc-1"));
        let err = store
            .search("doc-1", "anything", 3)
            .await
            .err()
            .expect("must fail");
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
