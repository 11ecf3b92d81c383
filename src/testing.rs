//! 테스트용 목(mock) 프로바이더

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use crate::config::RetrievalMode;
use crate::embedding::EmbeddingProvider;
use crate::error::ChatError;
use crate::knowledge::{ChunkConfig, DocumentIndex, InMemoryVectorStore, MarkdownChunker};
use crate::llm::{ChatModel, LlmMessage};
use crate::loader::Document;

/// 테스트 문서 생성 (제목 = 경로)
pub fn doc(source: &str, text: &str) -> Document {
    Document {
        source: PathBuf::from(source),
        title: source.to_string(),
        text: text.to_string(),
    }
}

/// 문서 2개짜리 인메모리 인덱스
pub async fn test_index() -> Arc<DocumentIndex> {
    let docs = vec![
        doc("roblox.md", "Roblox is an online game platform."),
        doc("maybelline.md", "Maybelline opened a beauty experience on Roblox."),
    ];
    let index = DocumentIndex::build(
        docs,
        Arc::new(KeywordEmbedder::new()),
        Box::new(InMemoryVectorStore::new()),
        &MarkdownChunker::new(ChunkConfig::without_overlap()),
        RetrievalMode::Vector,
    )
    .await
    .unwrap();
    Arc::new(index)
}

/// 문서 3개가 든 임시 데이터 디렉토리
pub fn seeded_data_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("news")).unwrap();
    std::fs::write(
        dir.path().join("roblox.md"),
        "# Roblox\n\nRoblox is an online game platform where players build experiences.",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("news/maybelline.md"),
        "# Maybelline\n\nMaybelline launched a beauty experience on Roblox.",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("news/avatars.txt"),
        "Avatars on Roblox can wear virtual makeup and clothing.",
    )
    .unwrap();
    dir
}

// ============================================================================
// KeywordEmbedder
// ============================================================================

/// 단어 해시 기반 결정적 임베더
pub struct KeywordEmbedder {
    documents: AtomicUsize,
    queries: AtomicUsize,
}

impl KeywordEmbedder {
    pub const DIMENSION: usize = 256;

    pub fn new() -> Self {
        Self {
            documents: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
        }
    }

    pub fn document_calls(&self) -> usize {
        self.documents.load(Ordering::SeqCst)
    }

    pub fn query_calls(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn vectorize(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; Self::DIMENSION];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            // FNV-1a
            let mut hash: u64 = 0xcbf29ce484222325;
            for byte in word.to_lowercase().bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(0x100000001b3);
            }
            vector[(hash % Self::DIMENSION as u64) as usize] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.documents.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vectorize(text))
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vectorize(text))
    }

    fn dimension(&self) -> usize {
        Self::DIMENSION
    }

    fn name(&self) -> &str {
        "keyword-mock"
    }
}

// ============================================================================
// MockChatModel
// ============================================================================

enum Behavior {
    Reply,
    Fail(String),
    MissingKey,
}

/// 호출을 기록하는 가짜 모델
///
/// 예약된 응답을 순서대로 돌려주고, 소진되면 `DEFAULT_REPLY`를 반환합니다.
pub struct MockChatModel {
    behavior: Behavior,
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<Vec<LlmMessage>>>,
}

impl MockChatModel {
    pub const DEFAULT_REPLY: &'static str = "Roblox is an online game platform.";

    fn with_behavior(behavior: Behavior, replies: &[&str]) -> Self {
        Self {
            behavior,
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn new() -> Self {
        Self::with_behavior(Behavior::Reply, &[])
    }

    pub fn with_replies(replies: &[&str]) -> Self {
        Self::with_behavior(Behavior::Reply, replies)
    }

    pub fn failing(message: &str) -> Self {
        Self::with_behavior(Behavior::Fail(message.to_string()), &[])
    }

    pub fn missing_key() -> Self {
        Self::with_behavior(Behavior::MissingKey, &[])
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<Vec<LlmMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn complete(&self, messages: &[LlmMessage]) -> Result<String> {
        self.requests.lock().unwrap().push(messages.to_vec());

        match &self.behavior {
            Behavior::Reply => Ok(self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Self::DEFAULT_REPLY.to_string())),
            Behavior::Fail(message) => Err(anyhow::anyhow!(message.clone())),
            Behavior::MissingKey => Err(ChatError::MissingApiKey.into()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
