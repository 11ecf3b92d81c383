//! 대화 메모리 버퍼
//!
//! 토큰 상한을 넘으면 가장 오래된 메시지부터 제거합니다.
//! 버퍼는 assistant 메시지로 시작하지 않습니다.

use std::collections::VecDeque;

use crate::llm::{LlmMessage, LlmRole};

/// 토큰 수 추정 (약 4바이트 = 1토큰)
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// 토큰 상한이 있는 대화 메모리
#[derive(Debug, Clone)]
pub struct ChatMemoryBuffer {
    token_limit: usize,
    messages: VecDeque<LlmMessage>,
    tokens: usize,
}

impl ChatMemoryBuffer {
    pub fn new(token_limit: usize) -> Self {
        Self {
            token_limit,
            messages: VecDeque::new(),
            tokens: 0,
        }
    }

    /// 메시지 추가 후 상한에 맞게 제거
    pub fn put(&mut self, message: LlmMessage) {
        self.tokens += estimate_tokens(&message.content);
        self.messages.push_back(message);
        self.evict();
    }

    fn evict(&mut self) {
        while self.tokens > self.token_limit {
            if !self.pop_front() {
                break;
            }
        }
        while self
            .messages
            .front()
            .is_some_and(|m| m.role == LlmRole::Assistant)
        {
            self.pop_front();
        }
    }

    fn pop_front(&mut self) -> bool {
        match self.messages.pop_front() {
            Some(m) => {
                self.tokens -= estimate_tokens(&m.content);
                true
            }
            None => false,
        }
    }

    /// 현재 메시지 (오래된 순)
    pub fn messages(&self) -> Vec<LlmMessage> {
        self.messages.iter().cloned().collect()
    }

    pub fn token_count(&self) -> usize {
        self.tokens
    }

    pub fn token_limit(&self) -> usize {
        self.token_limit
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.tokens = 0;
    }
}
