//! HyDE (Hypothetical Document Embeddings) 질의 변환
//!
//! 모델에게 질문에 답하는 가상의 문서를 쓰게 하고, 그 문서로 검색합니다.
//! 질의당 모델 호출이 한 번 추가됩니다.

use anyhow::{Context, Result};

use crate::llm::ChatModel;

use super::prompt::hyde_prompt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HydeTransform {
    /// 원래 질의로도 검색할지 여부
    pub include_original: bool,
}

impl Default for HydeTransform {
    fn default() -> Self {
        Self {
            include_original: true,
        }
    }
}

impl HydeTransform {
    pub fn new(include_original: bool) -> Self {
        Self { include_original }
    }

    /// 검색에 사용할 질의 목록 생성 (가상 문서 우선)
    pub async fn expand(&self, model: &dyn ChatModel, query: &str) -> Result<Vec<String>> {
        let hypothesis = model
            .complete_prompt(&hyde_prompt(query))
            .await
            .context("Failed to generate HyDE hypothesis")?;

        tracing::debug!(hypothesis = %hypothesis, "HyDE hypothesis generated");

        let mut queries = vec![hypothesis];
        if self.include_original {
            queries.push(query.to_string());
        }
        Ok(queries)
    }
}
