//! 프롬프트 템플릿
//!
//! 사용자 메시지 템플릿(`{question}` 슬롯)과 엔진 내부 프롬프트(QA, 질문 재작성,
//! HyDE, 컨텍스트 주입)를 정의합니다.

use anyhow::Result;

use crate::config::DEFAULT_PROMPT_TEMPLATE;
use crate::knowledge::RetrievedChunk;
use crate::llm::{LlmMessage, LlmRole};

const QUESTION_SLOT: &str = "{question}";

const QA_TEMPLATE: &str = "Context information is below.\n\
---------------------\n\
{context_str}\n\
---------------------\n\
Given the context information and not prior knowledge, answer the query.\n\
Query: {query_str}\n\
Answer: ";

const CONDENSE_TEMPLATE: &str = "Given a conversation (between Human and Assistant) and a \
follow up message from Human, rewrite the message to be a standalone question that captures \
all relevant context from the conversation.\n\n\
<Chat History>\n\
{chat_history}\n\n\
<Follow Up Message>\n\
{question}\n\n\
<Standalone question>\n";

const HYDE_TEMPLATE: &str = "Please write a passage to answer the question\n\
Try to include as many key details as possible.\n\n\n\
{question}\n\n\n\
Passage:\"\"\"\n";

const CONTEXT_SYSTEM_TEMPLATE: &str = "Context information is below.\n\
--------------------\n\
{context}\n\
--------------------\n";

/// 검색 결과가 없을 때 컨텍스트 자리에 들어가는 문구
pub const NO_CONTEXT: &str = "No relevant context was found in the knowledge base.";

// ============================================================================
// PromptTemplate
// ============================================================================

/// 사용자 메시지 템플릿
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// `{question}` 슬롯이 없는 템플릿은 거부
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if !template.contains(QUESTION_SLOT) {
            anyhow::bail!("Prompt template must contain a {} placeholder", QUESTION_SLOT);
        }
        Ok(Self { template })
    }

    /// 질문을 템플릿에 삽입
    pub fn format(&self, question: &str) -> String {
        self.template.replace(QUESTION_SLOT, question)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }
}

// ============================================================================
// Internal prompts
// ============================================================================

/// 검색된 청크를 컨텍스트 문자열로 결합
pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return NO_CONTEXT.to_string();
    }

    chunks
        .iter()
        .map(|c| format!("source: {}\n\n{}", c.source.display(), c.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn qa_prompt(context: &str, query: &str) -> String {
    QA_TEMPLATE
        .replace("{query_str}", query)
        .replace("{context_str}", context)
}

pub fn condense_prompt(history: &[LlmMessage], question: &str) -> String {
    let chat_history = history
        .iter()
        .map(|m| {
            let speaker = match m.role {
                LlmRole::User => "Human",
                LlmRole::Assistant => "Assistant",
                LlmRole::System => "System",
            };
            format!("{}: {}", speaker, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n");

    CONDENSE_TEMPLATE
        .replace("{question}", question)
        .replace("{chat_history}", &chat_history)
}

pub fn hyde_prompt(question: &str) -> String {
    HYDE_TEMPLATE.replace("{question}", question)
}

pub fn context_system_prompt(context: &str) -> String {
    CONTEXT_SYSTEM_TEMPLATE.replace("{context}", context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_template_requires_slot() {
        assert!(PromptTemplate::new("no slot here").is_err());

        let template = PromptTemplate::new("Q: {question}?").unwrap();
        assert_eq!(template.format("Roblox"), "Q: Roblox?");
    }

    #[test]
    fn test_default_template_wraps_question() {
        let formatted = PromptTemplate::default().format("What is Roblox?");
        assert!(formatted.contains("Discord Mod"));
        assert!(formatted.ends_with("What is Roblox?"));
    }

    #[test]
    fn test_format_context() {
        assert_eq!(format_context(&[]), NO_CONTEXT);

        let chunk = RetrievedChunk {
            chunk_id: 1,
            source: PathBuf::from("data/roblox.md"),
            title: "roblox.md".to_string(),
            text: "Roblox is a platform.".to_string(),
            score: 0.9,
        };
        let context = format_context(&[chunk]);
        assert!(context.starts_with("source: data/roblox.md"));
        assert!(context.ends_with("Roblox is a platform."));
    }

    #[test]
    fn test_condense_prompt_lists_history() {
        let history = vec![
            LlmMessage::user("What is Roblox?"),
            LlmMessage::assistant("A game platform."),
        ];
        let prompt = condense_prompt(&history, "Who owns it?");
        assert!(prompt.contains("Human: What is Roblox?\nAssistant: A game platform."));
        assert!(prompt.contains("<Follow Up Message>\nWho owns it?"));
    }

    #[test]
    fn test_qa_prompt_slots() {
        let prompt = qa_prompt("ctx", "q");
        assert!(prompt.contains("---------------------\nctx\n---------------------"));
        assert!(prompt.ends_with("Query: q\nAnswer: "));
    }
}
