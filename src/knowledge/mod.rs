//! Knowledge 모듈 - 문서 인덱스
//!
//! - Chunker: Markdown 인식 텍스트 분할
//! - VectorStore: 인메모리(기본) 또는 LanceDB 벡터 검색
//! - ChunkStore: 인메모리 SQLite, 청크 텍스트 + FTS5 키워드 검색
//! - Hybrid: RRF 알고리즘으로 검색 결과 통합
//! - IndexHandle: 프로세스당 한 번만 빌드되는 공유 인덱스

mod chunker;
mod handle;
mod hybrid;
mod index;
mod lance;
mod memory;
mod store;
mod vector;

// Re-exports
pub use chunker::{ChunkConfig, Chunker, MarkdownChunker};
pub use handle::{IndexBuilder, IndexHandle, IndexState};
pub use hybrid::{rrf_fuse, FusedHit, RRF_K};
pub use index::{DocumentIndex, IndexStats, RetrievedChunk};
pub use lance::{default_lance_path, LanceVectorStore};
pub use memory::InMemoryVectorStore;
pub use store::{ChunkStore, FtsSearchResult, StoreStats, StoredChunk};
pub use vector::{cosine_similarity, SearchResult, VectorEntry, VectorStore};
