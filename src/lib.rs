//! rag-chat - 로컬 문서 기반 RAG 챗 어시스턴트
//!
//! 데이터 디렉토리의 문서를 인메모리 벡터 인덱스로 만들고, Gemini 모델로
//! 질의/대화 응답을 생성합니다. CLI(단발 질의, 터미널 대화)와 웹 UI를 제공합니다.
//!
//! 흐름: Loader → IndexHandle(한 번만 빌드) → ChatEngine → ChatSession → CLI/웹

pub mod cli;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod knowledge;
pub mod llm;
pub mod loader;
pub mod server;
pub mod session;

#[cfg(test)]
mod testing;

// Re-exports
pub use config::{ChatConfig, ResponseStrategy, RetrievalMode, UiConfig, VectorBackend};
pub use embedding::{get_api_key, has_api_key, EmbeddingProvider, GeminiEmbedding};
pub use engine::{ChatEngine, ChatMemoryBuffer, EngineResponse, HydeTransform, PromptTemplate};
pub use error::ChatError;
pub use knowledge::{DocumentIndex, IndexBuilder, IndexHandle, IndexState, RetrievedChunk};
pub use llm::{ChatModel, GeminiChat, LlmMessage, LlmRole};
pub use loader::{Document, DocumentLoader};
pub use session::{ChatSession, Message, Role, TurnOutcome};
