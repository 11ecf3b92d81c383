//! Chunk Store - rusqlite 인메모리 청크 저장소
//!
//! 인덱싱된 청크 텍스트와 출처(파일 경로)를 보관하고 FTS5 키워드 검색을 제공합니다.
//! 프로세스 메모리에만 존재하며, 원본 문서 본문은 저장하지 않습니다.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

// ============================================================================
// Types
// ============================================================================

/// 저장된 청크
#[derive(Debug, Clone, PartialEq)]
pub struct StoredChunk {
    pub chunk_id: i64,
    pub doc_id: i64,
    pub chunk_index: i64,
    pub source: PathBuf,
    pub title: String,
    pub text: String,
}

/// FTS5 검색 결과
#[derive(Debug, Clone)]
pub struct FtsSearchResult {
    pub chunk_id: i64,
    pub bm25_score: f64,
}

/// 저장소 통계
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StoreStats {
    pub document_count: usize,
    pub chunk_count: usize,
    pub total_chunk_bytes: usize,
}

// ============================================================================
// ChunkStore
// ============================================================================

/// 인메모리 청크 저장소
///
/// rusqlite `Connection`은 `Sync`가 아니므로 `Mutex`로 감쌉니다.
pub struct ChunkStore {
    conn: Mutex<Connection>,
    fts_enabled: bool,
}

impl ChunkStore {
    /// 인메모리 DB 생성 및 스키마 초기화
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite")?;

        conn.execute_batch(
            "CREATE TABLE documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source TEXT NOT NULL,
                title TEXT NOT NULL
            );
            CREATE TABLE chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                doc_id INTEGER NOT NULL REFERENCES documents(id),
                chunk_index INTEGER NOT NULL,
                text TEXT NOT NULL
            );
            CREATE INDEX idx_chunks_doc ON chunks(doc_id);",
        )
        .context("Failed to create chunk tables")?;

        // FTS5 가상 테이블 (키워드 검색용)
        // source: https://www.sqlite.org/fts5.html
        let fts_enabled = match conn.execute_batch(
            "CREATE VIRTUAL TABLE chunks_fts USING fts5(
                text,
                content=chunks,
                content_rowid=id
            );
            CREATE TRIGGER chunks_ai AFTER INSERT ON chunks BEGIN
                INSERT INTO chunks_fts(rowid, text) VALUES (new.id, new.text);
            END;",
        ) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("FTS5 not available, keyword search disabled: {}", e);
                false
            }
        };

        Ok(Self {
            conn: Mutex::new(conn),
            fts_enabled,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))
    }

    /// FTS5 사용 가능 여부
    pub fn fts_enabled(&self) -> bool {
        self.fts_enabled
    }

    /// 문서 등록 (본문 제외, 출처와 제목만)
    pub fn add_document(&self, source: &Path, title: &str) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO documents (source, title) VALUES (?1, ?2)",
            params![source.to_string_lossy(), title],
        )
        .context("Failed to insert document")?;
        Ok(conn.last_insert_rowid())
    }

    /// 청크 저장
    pub fn add_chunk(&self, doc_id: i64, chunk_index: usize, text: &str) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO chunks (doc_id, chunk_index, text) VALUES (?1, ?2, ?3)",
            params![doc_id, chunk_index as i64, text],
        )
        .context("Failed to insert chunk")?;
        Ok(conn.last_insert_rowid())
    }

    /// ID로 청크 조회
    pub fn get_chunk(&self, chunk_id: i64) -> Result<Option<StoredChunk>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT c.id, c.doc_id, c.chunk_index, d.source, d.title, c.text
             FROM chunks c JOIN documents d ON d.id = c.doc_id
             WHERE c.id = ?1",
            params![chunk_id],
            |row| {
                Ok(StoredChunk {
                    chunk_id: row.get(0)?,
                    doc_id: row.get(1)?,
                    chunk_index: row.get(2)?,
                    source: PathBuf::from(row.get::<_, String>(3)?),
                    title: row.get(4)?,
                    text: row.get(5)?,
                })
            },
        )
        .optional()
        .context("Failed to query chunk")
    }

    /// FTS5 키워드 검색
    ///
    /// 질의 단어를 OR로 묶어 BM25 순으로 반환합니다.
    /// source: https://www.sqlite.org/fts5.html#the_bm25_function
    pub fn search_fts(&self, query: &str, limit: usize) -> Result<Vec<FtsSearchResult>> {
        if !self.fts_enabled {
            return Ok(vec![]);
        }

        let fts_query = to_fts5_query(query);
        if fts_query.is_empty() {
            return Ok(vec![]);
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT rowid, bm25(chunks_fts) FROM chunks_fts
             WHERE chunks_fts MATCH ?1
             ORDER BY bm25(chunks_fts)
             LIMIT ?2",
        )?;

        let results = stmt
            .query_map(params![fts_query, limit as i64], |row| {
                Ok(FtsSearchResult {
                    chunk_id: row.get(0)?,
                    bm25_score: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("FTS5 search failed")?;

        Ok(results)
    }

    /// 저장소 통계
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock()?;

        let document_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        let (chunk_count, total_bytes): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(LENGTH(CAST(text AS BLOB))), 0) FROM chunks",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(StoreStats {
            document_count: document_count as usize,
            chunk_count: chunk_count as usize,
            total_chunk_bytes: total_bytes as usize,
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 자연어 질의를 FTS5 OR 질의로 변환
///
/// 특수 문자를 제거한 단어를 큰따옴표로 감싸 구문 오류를 막습니다.
/// source: https://www.sqlite.org/fts5.html#full_text_query_syntax
fn to_fts5_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric() || *c == '_')
                .collect::<String>()
        })
        .filter(|w| w.chars().count() > 1)
        .map(|w| format!("\"{}\"", w))
        .collect::<Vec<_>>()
        .join(" OR ")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_store() -> ChunkStore {
        let store = ChunkStore::open_in_memory().unwrap();
        let doc = store
            .add_document(Path::new("/data/roblox.md"), "roblox.md")
            .unwrap();
        store
            .add_chunk(doc, 0, "Roblox is an online game platform.")
            .unwrap();
        store
            .add_chunk(doc, 1, "Maybelline launched a beauty experience.")
            .unwrap();
        store
    }

    #[test]
    fn test_add_and_get_chunk() {
        let store = seeded_store();

        let chunk = store.get_chunk(2).unwrap().unwrap();
        assert_eq!(chunk.doc_id, 1);
        assert_eq!(chunk.chunk_index, 1);
        assert_eq!(chunk.source, PathBuf::from("/data/roblox.md"));
        assert!(chunk.text.contains("Maybelline"));

        assert!(store.get_chunk(99).unwrap().is_none());
    }

    #[test]
    fn test_search_fts() {
        let store = seeded_store();
        assert!(store.fts_enabled());

        let results = store.search_fts("Maybelline beauty?", 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk_id, 2);

        assert!(store.search_fts("?!", 5).unwrap().is_empty());
    }

    #[test]
    fn test_stats() {
        let store = seeded_store();
        let stats = store.stats().unwrap();
        assert_eq!(stats.document_count, 1);
        assert_eq!(stats.chunk_count, 2);
        assert_eq!(
            stats.total_chunk_bytes,
            "Roblox is an online game platform.".len()
                + "Maybelline launched a beauty experience.".len()
        );
    }

    #[test]
    fn test_to_fts5_query() {
        assert_eq!(to_fts5_query("hello world"), "\"hello\" OR \"world\"");
        assert_eq!(to_fts5_query("  "), "");
        assert_eq!(to_fts5_query("what's Roblox?"), "\"whats\" OR \"Roblox\"");
        assert_eq!(to_fts5_query("a b"), "");
    }
}
