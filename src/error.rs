//! 에러 타입
//!
//! 내부 로직은 `anyhow::Result`로 전파하고, 표현 계층(CLI/웹)이 구분해서
//! 처리해야 하는 경계 에러만 `ChatError`로 정의합니다.

use thiserror::Error;

/// 챗 어시스턴트 경계 에러
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChatError {
    /// API 키 미설정 (첫 모델 호출 시점에 발생)
    #[error(
        "API key not found. Set GEMINI_API_KEY or GOOGLE_AI_API_KEY environment variable."
    )]
    MissingApiKey,

    /// 문서 로딩 또는 인덱스 빌드 실패 (챗 기능 비활성화)
    #[error("Failed to load and index data: {0}")]
    IndexUnavailable(String),

    /// 응답 생성 실패 (턴 단위로 복구)
    #[error("Failed to generate a response: {0}")]
    Generation(String),
}

impl ChatError {
    /// anyhow 에러를 생성 에러로 변환
    ///
    /// 체인 안에 `ChatError`가 있으면 그대로 꺼냅니다 (`MissingApiKey` 보존).
    pub fn from_generation(err: anyhow::Error) -> Self {
        match err.downcast_ref::<ChatError>() {
            Some(inner) => inner.clone(),
            None => ChatError::Generation(format!("{:#}", err)),
        }
    }
}
