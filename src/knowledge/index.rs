//! Document Index - 청킹 + 임베딩 + 벡터 검색
//!
//! 문서 목록을 한 번에 인덱싱하고, 이후에는 읽기 전용으로 검색만 수행합니다.
//! 원본 `Document`는 빌드 후 버려지고 청크와 출처만 남습니다.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::RetrievalMode;
use crate::embedding::EmbeddingProvider;
use crate::loader::Document;

use super::chunker::Chunker;
use super::hybrid::rrf_fuse;
use super::store::{ChunkStore, StoreStats};
use super::vector::{VectorEntry, VectorStore};

/// 검색된 청크 (응답 근거)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub chunk_id: i64,
    pub source: PathBuf,
    pub title: String,
    pub text: String,
    /// 벡터 검색은 유사도, 통합 검색은 RRF 스코어
    pub score: f32,
}

/// 인덱스 통계
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IndexStats {
    pub document_count: usize,
    pub chunk_count: usize,
    pub vector_count: usize,
    pub total_chunk_bytes: usize,
    pub backend: &'static str,
    pub embedder: String,
}

/// 읽기 전용 문서 인덱스
pub struct DocumentIndex {
    store: ChunkStore,
    vectors: Box<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    mode: RetrievalMode,
}

impl std::fmt::Debug for DocumentIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentIndex")
            .field("backend", &self.vectors.name())
            .field("embedder", &self.embedder.name())
            .field("mode", &self.mode)
            .finish()
    }
}

impl DocumentIndex {
    /// 문서 목록으로 인덱스 빌드
    ///
    /// # Arguments
    /// * `documents` - 로더가 만든 문서 (빌드 후 소비됨)
    /// * `embedder` - 임베딩 프로바이더
    /// * `vectors` - 비어 있는 벡터 저장소
    /// * `chunker` - 청킹 전략
    /// * `mode` - 검색 모드
    pub async fn build(
        documents: Vec<Document>,
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: Box<dyn VectorStore>,
        chunker: &dyn Chunker,
        mode: RetrievalMode,
    ) -> Result<Self> {
        if documents.is_empty() {
            anyhow::bail!("Cannot build an index from zero documents");
        }

        tracing::debug!(
            "Chunking {} documents with {} chunker",
            documents.len(),
            chunker.name()
        );

        let store = ChunkStore::open_in_memory()?;
        let mut pending: Vec<(i64, i64, String)> = Vec::new();

        for doc in documents {
            let doc_id = store.add_document(&doc.source, &doc.title)?;
            let chunks = chunker.chunk(&doc.text);
            if chunks.is_empty() {
                tracing::warn!("No chunks generated for document: {:?}", doc.source);
                continue;
            }
            for (i, chunk) in chunks.into_iter().enumerate() {
                let chunk_id = store.add_chunk(doc_id, i, &chunk)?;
                pending.push((chunk_id, doc_id, chunk));
            }
        }

        if pending.is_empty() {
            anyhow::bail!("Documents produced no indexable chunks");
        }

        let texts: Vec<String> = pending.iter().map(|(_, _, text)| text.clone()).collect();
        let embeddings = embedder
            .embed_batch(&texts)
            .await
            .context("Failed to embed chunks")?;

        if embeddings.len() != pending.len() {
            anyhow::bail!(
                "Embedder returned {} vectors for {} chunks",
                embeddings.len(),
                pending.len()
            );
        }

        let entries: Vec<VectorEntry> = pending
            .into_iter()
            .zip(embeddings)
            .map(|((chunk_id, doc_id, chunk_text), embedding)| VectorEntry {
                chunk_id,
                doc_id,
                chunk_text,
                embedding,
            })
            .collect();

        vectors
            .insert_batch(&entries)
            .await
            .context("Failed to insert vectors")?;

        let index = Self {
            store,
            vectors,
            embedder,
            mode,
        };

        let stats = index.stats().await?;
        tracing::info!(
            documents = stats.document_count,
            chunks = stats.chunk_count,
            backend = stats.backend,
            "Index built"
        );

        Ok(index)
    }

    /// 질의 하나로 상위 `top_k` 청크 검색
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        self.retrieve_many(&[query.to_string()], top_k).await
    }

    /// 여러 질의의 검색 결과를 RRF로 통합 (HyDE용)
    ///
    /// 질의가 하나이고 벡터 모드면 유사도 점수를 그대로 사용합니다.
    pub async fn retrieve_many(
        &self,
        queries: &[String],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        if top_k == 0 || queries.is_empty() {
            return Ok(vec![]);
        }

        let mut ranked_lists: Vec<Vec<i64>> = Vec::new();
        let mut single_vector_scores: Option<Vec<(i64, f32)>> = None;

        for query in queries {
            let embedding = self
                .embedder
                .embed_query(query)
                .await
                .context("Failed to embed query")?;
            let hits = self.vectors.search(&embedding, top_k).await?;

            if queries.len() == 1 && self.mode == RetrievalMode::Vector {
                single_vector_scores =
                    Some(hits.iter().map(|h| (h.chunk_id, h.similarity)).collect());
            }
            ranked_lists.push(hits.iter().map(|h| h.chunk_id).collect());

            if self.mode == RetrievalMode::Hybrid {
                let fts = self.store.search_fts(query, top_k)?;
                tracing::debug!(
                    hits = fts.len(),
                    best_bm25 = ?fts.first().map(|r| r.bm25_score),
                    "FTS5 keyword search"
                );
                ranked_lists.push(fts.iter().map(|r| r.chunk_id).collect());
            }
        }

        let scored: Vec<(i64, f32)> = match single_vector_scores {
            Some(scores) => scores,
            None => rrf_fuse(&ranked_lists, top_k)
                .into_iter()
                .map(|hit| (hit.chunk_id, hit.score))
                .collect(),
        };

        let mut results = Vec::with_capacity(scored.len());
        for (chunk_id, score) in scored {
            match self.store.get_chunk(chunk_id)? {
                Some(chunk) => results.push(RetrievedChunk {
                    chunk_id,
                    source: chunk.source,
                    title: chunk.title,
                    text: chunk.text,
                    score,
                }),
                None => tracing::warn!("Vector hit for unknown chunk {}", chunk_id),
            }
        }

        Ok(results)
    }

    /// 인덱스 통계
    pub async fn stats(&self) -> Result<IndexStats> {
        let StoreStats {
            document_count,
            chunk_count,
            total_chunk_bytes,
        } = self.store.stats()?;

        Ok(IndexStats {
            document_count,
            chunk_count,
            vector_count: self.vectors.count().await?,
            total_chunk_bytes,
            backend: self.vectors.name(),
            embedder: self.embedder.name().to_string(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
