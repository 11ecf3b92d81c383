//! Chat Engine - 인덱스 + 모델을 묶는 응답 생성기
//!
//! 사용자 메시지는 먼저 프롬프트 템플릿으로 감싼 뒤 전략별로 처리합니다.
//!
//! - Query: 검색 → QA 합성 (메모리 미사용)
//! - CondenseQuestion: 이전 대화가 있으면 독립 질문으로 재작성 → 검색 → 합성
//! - Context: 검색 컨텍스트를 시스템 메시지로 주입하고 메모리와 함께 전송
//!
//! HyDE가 켜져 있으면 어떤 전략이든 검색 단계에서 가상 문서를 함께 사용합니다.

mod hyde;
mod memory;
mod prompt;

pub use hyde::HydeTransform;
pub use memory::{estimate_tokens, ChatMemoryBuffer};
pub use prompt::{PromptTemplate, NO_CONTEXT};

use std::sync::Arc;

use anyhow::{Context as _, Result};
use serde::Serialize;

use crate::config::{ChatConfig, ResponseStrategy};
use crate::error::ChatError;
use crate::knowledge::{DocumentIndex, RetrievedChunk};
use crate::llm::{ChatModel, LlmMessage};

use prompt::{condense_prompt, context_system_prompt, format_context, qa_prompt};

/// 응답 + 근거
#[derive(Debug, Clone, Serialize)]
pub struct EngineResponse {
    pub answer: String,
    pub sources: Vec<RetrievedChunk>,
}

/// 챗 엔진
pub struct ChatEngine {
    index: Arc<DocumentIndex>,
    model: Arc<dyn ChatModel>,
    strategy: ResponseStrategy,
    hyde: Option<HydeTransform>,
    top_k: usize,
    template: PromptTemplate,
}

impl ChatEngine {
    pub fn new(
        index: Arc<DocumentIndex>,
        model: Arc<dyn ChatModel>,
        strategy: ResponseStrategy,
    ) -> Self {
        Self {
            index,
            model,
            strategy,
            hyde: None,
            top_k: crate::config::DEFAULT_TOP_K,
            template: PromptTemplate::default(),
        }
    }

    /// 설정에서 엔진 생성
    pub fn from_config(
        index: Arc<DocumentIndex>,
        model: Arc<dyn ChatModel>,
        config: &ChatConfig,
    ) -> Result<Self> {
        let mut engine = Self::new(index, model, config.strategy)
            .with_top_k(config.top_k)
            .with_template(PromptTemplate::new(config.prompt_template.clone())?);
        if config.hyde {
            engine = engine.with_hyde(HydeTransform::default());
        }
        Ok(engine)
    }

    pub fn with_hyde(mut self, hyde: HydeTransform) -> Self {
        self.hyde = Some(hyde);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn strategy(&self) -> ResponseStrategy {
        self.strategy
    }

    pub fn hyde_enabled(&self) -> bool {
        self.hyde.is_some()
    }

    /// 대화 상태 없이 단발성 질의 (전략과 무관하게 Query 경로)
    pub async fn query(&self, question: &str) -> Result<EngineResponse, ChatError> {
        let prompt = self.template.format(question);
        self.answer_query(&prompt)
            .await
            .map_err(ChatError::from_generation)
    }

    /// 한 턴 응답 생성
    ///
    /// 성공한 턴만 메모리에 기록됩니다 (Query 전략은 메모리를 쓰지 않음).
    pub async fn respond(
        &self,
        memory: &mut ChatMemoryBuffer,
        question: &str,
    ) -> Result<EngineResponse, ChatError> {
        let prompt = self.template.format(question);

        let result = match self.strategy {
            ResponseStrategy::Query => self.answer_query(&prompt).await,
            ResponseStrategy::CondenseQuestion => {
                self.answer_condensed(memory, question, &prompt).await
            }
            ResponseStrategy::Context => self.answer_with_context(memory, question, &prompt).await,
        };

        result.map_err(ChatError::from_generation)
    }

    // ========================================================================
    // Strategies
    // ========================================================================

    async fn answer_query(&self, prompt: &str) -> Result<EngineResponse> {
        let sources = self.retrieve(prompt).await?;
        let answer = self.synthesize(prompt, &sources).await?;
        Ok(EngineResponse { answer, sources })
    }

    async fn answer_condensed(
        &self,
        memory: &mut ChatMemoryBuffer,
        question: &str,
        prompt: &str,
    ) -> Result<EngineResponse> {
        let standalone = if memory.is_empty() {
            prompt.to_string()
        } else {
            let condensed = self
                .model
                .complete_prompt(&condense_prompt(&memory.messages(), prompt))
                .await
                .context("Failed to condense question")?;
            let condensed = condensed.trim().to_string();
            tracing::debug!(question = %condensed, "Condensed question");
            condensed
        };

        let sources = self.retrieve(&standalone).await?;
        let answer = self.synthesize(&standalone, &sources).await?;

        memory.put(LlmMessage::user(question));
        memory.put(LlmMessage::assistant(answer.clone()));
        Ok(EngineResponse { answer, sources })
    }

    async fn answer_with_context(
        &self,
        memory: &mut ChatMemoryBuffer,
        question: &str,
        prompt: &str,
    ) -> Result<EngineResponse> {
        let sources = self.retrieve(prompt).await?;

        let mut messages = vec![LlmMessage::system(context_system_prompt(
            &format_context(&sources),
        ))];
        messages.extend(memory.messages());
        messages.push(LlmMessage::user(prompt));

        let answer = self
            .model
            .complete(&messages)
            .await
            .context("Failed to generate chat response")?;

        memory.put(LlmMessage::user(question));
        memory.put(LlmMessage::assistant(answer.clone()));
        Ok(EngineResponse { answer, sources })
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        let sources = match &self.hyde {
            Some(hyde) => {
                let queries = hyde.expand(self.model.as_ref(), query).await?;
                self.index.retrieve_many(&queries, self.top_k).await?
            }
            None => self.index.retrieve(query, self.top_k).await?,
        };

        tracing::debug!("Retrieved {} chunks", sources.len());
        Ok(sources)
    }

    async fn synthesize(&self, query: &str, sources: &[RetrievedChunk]) -> Result<String> {
        self.model
            .complete_prompt(&qa_prompt(&format_context(sources), query))
            .await
            .context("Failed to synthesize answer")
    }
}

// ============================================================================
// Tests
// ============================================================================
