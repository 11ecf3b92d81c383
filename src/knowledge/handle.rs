//! Index Handle - 프로세스당 한 번만 빌드되는 공유 인덱스
//!
//! 첫 접근 시 문서를 로드하고 인덱스를 빌드합니다. 결과(성공/실패)는
//! 프로세스가 끝날 때까지 캐시되며 재시도하지 않습니다.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::collector::CollectorConfig;
use crate::config::{ChatConfig, RetrievalMode, VectorBackend};
use crate::embedding::EmbeddingProvider;
use crate::error::ChatError;
use crate::loader::DocumentLoader;

use super::chunker::{ChunkConfig, MarkdownChunker};
use super::index::{DocumentIndex, IndexStats};
use super::lance::{default_lance_path, LanceVectorStore};
use super::memory::InMemoryVectorStore;
use super::vector::VectorStore;

// ============================================================================
// Index Builder
// ============================================================================

/// 데이터 디렉토리 → 인덱스 빌드 파이프라인
pub struct IndexBuilder {
    pub data_dir: PathBuf,
    pub collector: CollectorConfig,
    pub chunk: ChunkConfig,
    pub backend: VectorBackend,
    pub mode: RetrievalMode,
    /// Lance 백엔드 스크래치 경로
    pub lance_path: PathBuf,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl IndexBuilder {
    pub fn new(data_dir: impl Into<PathBuf>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            data_dir: data_dir.into(),
            collector: CollectorConfig::default(),
            chunk: ChunkConfig::default(),
            backend: VectorBackend::default(),
            mode: RetrievalMode::default(),
            lance_path: default_lance_path(),
            embedder,
        }
    }

    /// 챗 설정에서 빌더 생성
    pub fn from_config(config: &ChatConfig, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            chunk: config.chunk.clone(),
            backend: config.backend,
            mode: config.retrieval,
            ..Self::new(config.data_dir.clone(), embedder)
        }
    }

    /// 로드 → 청킹 → 임베딩 → 벡터 저장
    pub async fn build(&self) -> Result<DocumentIndex> {
        let documents = DocumentLoader::new(self.collector.clone())
            .load(&self.data_dir)
            .await?;

        let vectors: Box<dyn VectorStore> = match self.backend {
            VectorBackend::Memory => Box::new(InMemoryVectorStore::new()),
            VectorBackend::Lance => Box::new(
                LanceVectorStore::open_fresh(&self.lance_path, self.embedder.dimension()).await?,
            ),
        };

        let chunker = MarkdownChunker::new(self.chunk.clone());
        DocumentIndex::build(documents, self.embedder.clone(), vectors, &chunker, self.mode).await
    }
}

// ============================================================================
// Index Handle
// ============================================================================

/// 인덱스 상태
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum IndexState {
    /// 아직 빌드 전
    Pending,
    Ready { stats: IndexStats },
    Failed { error: String },
}

/// 한 번만 초기화되는 인덱스 핸들
///
/// 동시에 여러 번 `get()`을 호출해도 빌드는 한 번만 실행됩니다.
pub struct IndexHandle {
    builder: IndexBuilder,
    cell: OnceCell<Result<Arc<DocumentIndex>, String>>,
    builds: AtomicUsize,
}

impl IndexHandle {
    pub fn new(builder: IndexBuilder) -> Self {
        Self {
            builder,
            cell: OnceCell::new(),
            builds: AtomicUsize::new(0),
        }
    }

    /// 인덱스 가져오기 (첫 호출 시 빌드)
    pub async fn get(&self) -> Result<Arc<DocumentIndex>, ChatError> {
        let outcome = self
            .cell
            .get_or_init(|| async {
                self.builds.fetch_add(1, Ordering::SeqCst);
                tracing::info!("Building index from {:?}", self.builder.data_dir);

                match self.builder.build().await {
                    Ok(index) => Ok(Arc::new(index)),
                    Err(e) => {
                        tracing::error!("Failed to load and index data: {:#}", e);
                        Err(format!("{:#}", e))
                    }
                }
            })
            .await;

        match outcome {
            Ok(index) => Ok(index.clone()),
            Err(message) => Err(ChatError::IndexUnavailable(message.clone())),
        }
    }

    /// 현재 상태 (빌드를 트리거하지 않음)
    pub async fn state(&self) -> IndexState {
        match self.cell.get() {
            None => IndexState::Pending,
            Some(Ok(index)) => match index.stats().await {
                Ok(stats) => IndexState::Ready { stats },
                Err(e) => IndexState::Failed {
                    error: format!("{:#}", e),
                },
            },
            Some(Err(message)) => IndexState::Failed {
                error: message.clone(),
            },
        }
    }

    /// 실행된 빌드 횟수 (최대 1)
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn data_dir(&self) -> &std::path::Path {
        &self.builder.data_dir
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seeded_data_dir, KeywordEmbedder};
    use tempfile::TempDir;

    fn handle_for(dir: &std::path::Path) -> Arc<IndexHandle> {
        let builder = IndexBuilder::new(dir, Arc::new(KeywordEmbedder::new()));
        Arc::new(IndexHandle::new(builder))
    }

    #[tokio::test]
    async fn test_missing_directory_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let handle = handle_for(&dir.path().join("missing"));

        match handle.get().await {
            Err(ChatError::IndexUnavailable(msg)) => assert!(msg.contains("Directory not found")),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
        assert!(matches!(handle.state().await, IndexState::Failed { .. }));
    }

    #[tokio::test]
    async fn test_empty_directory_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let handle = handle_for(dir.path());

        let err = handle.get().await.unwrap_err();
        assert!(matches!(err, ChatError::IndexUnavailable(_)));
    }

    #[tokio::test]
    async fn test_failure_is_cached() {
        let dir = TempDir::new().unwrap();
        let handle = handle_for(dir.path());

        assert!(handle.get().await.is_err());
        // 실패 후 파일이 생겨도 재빌드하지 않는다
        std::fs::write(dir.path().join("late.md"), "Roblox arrived late.").unwrap();
        assert!(handle.get().await.is_err());
        assert_eq!(handle.build_count(), 1);
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let dir = seeded_data_dir();
        let handle = handle_for(dir.path());

        assert_eq!(handle.state().await, IndexState::Pending);
        assert_eq!(handle.build_count(), 0);

        handle.get().await.unwrap();
        match handle.state().await {
            IndexState::Ready { stats } => {
                assert_eq!(stats.document_count, 3);
                assert!(stats.chunk_count >= 3);
            }
            other => panic!("unexpected state: {:?}", other),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_get_builds_once() {
        let dir = seeded_data_dir();
        let handle = handle_for(dir.path());

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let handle = handle.clone();
                tokio::spawn(async move { handle.get().await })
            })
            .collect();

        let mut indexes = Vec::new();
        for task in tasks {
            indexes.push(task.await.unwrap().unwrap());
        }

        assert_eq!(handle.build_count(), 1);
        assert!(indexes.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));

        handle.get().await.unwrap();
        assert_eq!(handle.build_count(), 1);
    }
}
