//! 설정 타입
//!
//! CLI 인자와 기본값이 모두 이 구조체들로 모입니다.

use std::path::PathBuf;

use clap::ValueEnum;
use serde::Serialize;

use crate::knowledge::ChunkConfig;
use crate::llm::{GenerationSettings, DEFAULT_CHAT_MODEL};

/// 기본 데이터 디렉토리
pub const DEFAULT_DATA_DIR: &str = "./data";

/// 검색할 청크 수
pub const DEFAULT_TOP_K: usize = 2;

/// 대화 메모리 토큰 상한
pub const DEFAULT_MEMORY_TOKEN_LIMIT: usize = 3000;

/// 임베딩 차원 (768 / 1536 / 3072)
pub const DEFAULT_EMBEDDING_DIMENSION: usize = crate::embedding::DEFAULT_DIMENSION;

/// `ask` 명령의 기본 질문
pub const DEFAULT_QUESTION: &str =
    "Given the recent news about Maybelline, what is their association with Roblox?";

/// 사용자 메시지를 감싸는 기본 프롬프트 템플릿
pub const DEFAULT_PROMPT_TEMPLATE: &str = "Answer the following question like a Discord Mod. \
Keep it brief and only answer questions about Roblox: \n\n{question}";

// ============================================================================
// Enums
// ============================================================================

/// 응답 생성 전략
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStrategy {
    /// 단발성 질의 (대화 상태 없음)
    Query,
    /// 후속 질문을 독립 질문으로 재작성 후 검색
    #[default]
    CondenseQuestion,
    /// 검색 컨텍스트를 시스템 메시지로 주입 + 메모리
    Context,
}

/// 검색 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// 벡터 유사도만 사용
    #[default]
    Vector,
    /// 벡터 + FTS5 키워드, RRF 통합
    Hybrid,
}

/// 벡터 저장소 백엔드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    /// 프로세스 내 전수 탐색
    #[default]
    Memory,
    /// 캐시 디렉토리의 LanceDB 스크래치 테이블
    Lance,
}

// ============================================================================
// Chat Config
// ============================================================================

/// 챗 엔진 + 인덱스 설정
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub data_dir: PathBuf,
    pub strategy: ResponseStrategy,
    /// HyDE 질의 변환 사용 여부
    pub hyde: bool,
    pub top_k: usize,
    pub memory_token_limit: usize,
    pub model: String,
    pub generation: GenerationSettings,
    pub embedding_dimension: usize,
    pub backend: VectorBackend,
    pub retrieval: RetrievalMode,
    pub chunk: ChunkConfig,
    /// `{question}` 자리표시자를 포함한 템플릿
    pub prompt_template: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            strategy: ResponseStrategy::default(),
            hyde: false,
            top_k: DEFAULT_TOP_K,
            memory_token_limit: DEFAULT_MEMORY_TOKEN_LIMIT,
            model: DEFAULT_CHAT_MODEL.to_string(),
            generation: GenerationSettings::default(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            backend: VectorBackend::default(),
            retrieval: RetrievalMode::default(),
            chunk: ChunkConfig::default(),
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }
}

impl ChatConfig {
    /// 배치 질의용 프리셋 (Query + HyDE)
    pub fn batch() -> Self {
        Self {
            strategy: ResponseStrategy::Query,
            hyde: true,
            ..Self::default()
        }
    }
}

// ============================================================================
// UI Config
// ============================================================================

/// 화면 문구
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UiConfig {
    pub title: String,
    pub subheader: String,
    pub greeting: String,
    pub placeholder: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            title: "Insomnia Labs - Roblox".to_string(),
            subheader: "Ask a question about Roblox and get an answer from my knowledge base"
                .to_string(),
            greeting: "Hello! I'm your assistant. Ask me anything about Roblox.".to_string(),
            placeholder: "Ask me anything about Roblox".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let chat = ChatConfig::default();
        assert_eq!(chat.strategy, ResponseStrategy::CondenseQuestion);
        assert!(!chat.hyde);
        assert_eq!(chat.top_k, 2);

        let batch = ChatConfig::batch();
        assert_eq!(batch.strategy, ResponseStrategy::Query);
        assert!(batch.hyde);
    }

    #[test]
    fn test_default_template_has_slot() {
        assert!(DEFAULT_PROMPT_TEMPLATE.contains("{question}"));
    }
}
