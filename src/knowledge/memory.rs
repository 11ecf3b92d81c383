//! 인메모리 벡터 저장소
//!
//! 수백~수천 청크 규모의 로컬 문서 세트를 위한 전수 비교(brute-force) 검색입니다.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use super::vector::{cosine_similarity, SearchResult, VectorEntry, VectorStore};

/// 프로세스 메모리 벡터 저장소
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<Vec<VectorEntry>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize> {
        let mut guard = self
            .entries
            .write()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        if let (Some(first), Some(new)) = (guard.first(), entries.first()) {
            if first.embedding.len() != new.embedding.len() {
                anyhow::bail!(
                    "Embedding dimension mismatch: store has {}, got {}",
                    first.embedding.len(),
                    new.embedding.len()
                );
            }
        }

        guard.extend_from_slice(entries);
        Ok(entries.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        let guard = self
            .entries
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut scored: Vec<SearchResult> = guard
            .iter()
            .map(|entry| SearchResult {
                chunk_id: entry.chunk_id,
                doc_id: entry.doc_id,
                chunk_text: entry.chunk_text.clone(),
                similarity: cosine_similarity(query_embedding, &entry.embedding),
            })
            .collect();

        // 동점이면 먼저 들어온 청크 우선
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk_id.cmp(&b.chunk_id))
        });
        scored.truncate(limit);

        Ok(scored)
    }

    async fn count(&self) -> Result<usize> {
        let guard = self
            .entries
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Ok(guard.len())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(chunk_id: i64, embedding: Vec<f32>) -> VectorEntry {
        VectorEntry {
            chunk_id,
            doc_id: 1,
            chunk_text: format!("chunk {}", chunk_id),
            embedding,
        }
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let store = InMemoryVectorStore::new();
        store
            .insert_batch(&[
                entry(1, vec![0.0, 1.0]),
                entry(2, vec![1.0, 0.0]),
                entry(3, vec![0.7, 0.7]),
            ])
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.1], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_id, 2);
        assert_eq!(results[1].chunk_id, 3);
        assert!(results[0].similarity >= results[1].similarity);
    }

    #[tokio::test]
    async fn test_count_and_empty_search() {
        let store = InMemoryVectorStore::new();
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.search(&[1.0], 5).await.unwrap().is_empty());

        store.insert_batch(&[entry(1, vec![1.0])]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let store = InMemoryVectorStore::new();
        store.insert_batch(&[entry(1, vec![1.0, 0.0])]).await.unwrap();
        assert!(store.insert_batch(&[entry(2, vec![1.0])]).await.is_err());
    }
}
