//! 챗 세션 - 메시지 기록 + 대화 메모리
//!
//! 웹 UI와 터미널 REPL이 같은 세션 규칙을 공유합니다.
//! 기록은 초기화(reset) 외에는 추가만 되며, 마지막 메시지가 사용자
//! 메시지일 때만 응답을 생성합니다.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::{ChatEngine, ChatMemoryBuffer, EngineResponse};
use crate::error::ChatError;

/// 메시지 작성자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Assistant,
    User,
}

/// 화면에 표시되는 메시지
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// 한 턴 처리 결과
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// 응답이 기록됨
    Answered(EngineResponse),
    /// 생성 실패 (기록에는 추가되지 않음, 세션 유지)
    Failed(String),
    /// 빈 입력
    Idle,
}

/// 사용자 한 명의 대화 세션
#[derive(Debug)]
pub struct ChatSession {
    greeting: String,
    messages: Vec<Message>,
    memory: ChatMemoryBuffer,
    last_error: Option<String>,
}

impl ChatSession {
    pub fn new(greeting: impl Into<String>, memory_token_limit: usize) -> Self {
        let greeting = greeting.into();
        Self {
            messages: vec![Message::new(Role::Assistant, greeting.clone())],
            greeting,
            memory: ChatMemoryBuffer::new(memory_token_limit),
            last_error: None,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn memory(&self) -> &ChatMemoryBuffer {
        &self.memory
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// 마지막 메시지가 사용자 메시지인지
    pub fn needs_response(&self) -> bool {
        self.messages
            .last()
            .is_some_and(|m| m.role == Role::User)
    }

    /// 사용자 입력 한 건 처리
    ///
    /// 생성 실패는 `TurnOutcome::Failed`로 돌려주고 세션은 계속됩니다.
    /// API 키 누락처럼 턴 단위로 복구할 수 없는 에러만 `Err`이며,
    /// 이때는 방금 추가한 사용자 메시지를 되돌려 기록이 바뀌지 않습니다.
    pub async fn handle_user_message(
        &mut self,
        engine: &ChatEngine,
        text: &str,
    ) -> Result<TurnOutcome, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(TurnOutcome::Idle);
        }

        self.messages.push(Message::new(Role::User, text));

        match engine.respond(&mut self.memory, text).await {
            Ok(response) => {
                self.messages
                    .push(Message::new(Role::Assistant, response.answer.clone()));
                self.last_error = None;
                Ok(TurnOutcome::Answered(response))
            }
            Err(ChatError::Generation(message)) => {
                tracing::warn!("Failed to generate a response: {}", message);
                let message = ChatError::Generation(message).to_string();
                self.last_error = Some(message.clone());
                Ok(TurnOutcome::Failed(message))
            }
            Err(e) => {
                self.messages.pop();
                Err(e)
            }
        }
    }

    /// 기록을 인사말 하나로 되돌림
    pub fn reset(&mut self) {
        self.messages = vec![Message::new(Role::Assistant, self.greeting.clone())];
        self.memory.clear();
        self.last_error = None;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResponseStrategy;
    use crate::testing::{test_index, MockChatModel};
    use std::sync::Arc;

    const GREETING: &str = "Hello! I'm your assistant. Ask me anything about Roblox.";

    async fn engine(model: Arc<MockChatModel>, strategy: ResponseStrategy) -> ChatEngine {
        ChatEngine::new(test_index().await, model, strategy)
    }

    fn roles(session: &ChatSession) -> Vec<Role> {
        session.messages().iter().map(|m| m.role).collect()
    }

    #[test]
    fn test_new_session_has_seed() {
        let session = ChatSession::new(GREETING, 100);
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].role, Role::Assistant);
        assert_eq!(session.messages()[0].content, GREETING);
        assert!(!session.needs_response());
    }

    #[tokio::test]
    async fn test_single_turn_generates_once() {
        let model = Arc::new(MockChatModel::new());
        let engine = engine(model.clone(), ResponseStrategy::Query).await;
        let mut session = ChatSession::new(GREETING, 3000);

        let outcome = session
            .handle_user_message(&engine, "What is Roblox?")
            .await
            .unwrap();

        assert!(matches!(outcome, TurnOutcome::Answered(_)));
        assert_eq!(model.calls(), 1);
        assert_eq!(roles(&session), vec![Role::Assistant, Role::User, Role::Assistant]);
        assert_eq!(session.messages()[1].content, "What is Roblox?");
        assert_eq!(session.messages()[2].content, MockChatModel::DEFAULT_REPLY);
    }

    #[tokio::test]
    async fn test_blank_input_is_idle() {
        let model = Arc::new(MockChatModel::new());
        let engine = engine(model.clone(), ResponseStrategy::Query).await;
        let mut session = ChatSession::new(GREETING, 3000);

        let outcome = session.handle_user_message(&engine, "   ").await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Idle));
        assert_eq!(session.messages().len(), 1);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_reset_after_five_messages() {
        let model = Arc::new(MockChatModel::new());
        let engine = engine(model, ResponseStrategy::CondenseQuestion).await;
        let mut session = ChatSession::new(GREETING, 3000);

        session.handle_user_message(&engine, "What is Roblox?").await.unwrap();
        session.handle_user_message(&engine, "Who made it?").await.unwrap();
        assert_eq!(session.messages().len(), 5);
        assert!(!session.memory().is_empty());

        session.reset();
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].content, GREETING);
        assert!(session.memory().is_empty());
        assert!(session.last_error().is_none());
    }

    #[tokio::test]
    async fn test_failure_keeps_session_alive() {
        let model = Arc::new(MockChatModel::failing("quota exceeded"));
        let engine = engine(model.clone(), ResponseStrategy::Query).await;
        let mut session = ChatSession::new(GREETING, 3000);

        let outcome = session
            .handle_user_message(&engine, "What is Roblox?")
            .await
            .unwrap();

        match outcome {
            TurnOutcome::Failed(msg) => {
                assert!(msg.starts_with("Failed to generate a response"));
                assert!(msg.contains("quota exceeded"));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(roles(&session), vec![Role::Assistant, Role::User]);
        assert!(session.last_error().is_some());
        assert!(session.needs_response());

        // 다음 입력도 정상적으로 처리
        session.handle_user_message(&engine, "Hello?").await.unwrap();
        assert_eq!(model.calls(), 2);
        assert_eq!(
            roles(&session),
            vec![Role::Assistant, Role::User, Role::User]
        );
    }

    #[tokio::test]
    async fn test_missing_key_is_an_error() {
        let model = Arc::new(MockChatModel::missing_key());
        let engine = engine(model, ResponseStrategy::Query).await;
        let mut session = ChatSession::new(GREETING, 3000);

        let err = session
            .handle_user_message(&engine, "What is Roblox?")
            .await
            .unwrap_err();
        assert_eq!(err, ChatError::MissingApiKey);
        assert!(session.last_error().is_none());
        assert_eq!(session.messages().len(), 1);
        assert!(!session.needs_response());
    }

    #[tokio::test]
    async fn test_never_two_assistant_messages_in_a_row() {
        let model = Arc::new(MockChatModel::new());
        let engine = engine(model, ResponseStrategy::Context).await;
        let mut session = ChatSession::new(GREETING, 3000);

        for question in ["one", "", "two", "  ", "three"] {
            session.handle_user_message(&engine, question).await.unwrap();
        }

        let roles = roles(&session);
        assert!(roles
            .windows(2)
            .all(|w| !(w[0] == Role::Assistant && w[1] == Role::Assistant)));
        assert_eq!(roles.len(), 7);
    }
}
