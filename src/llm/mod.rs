//! LLM 모듈 - Gemini generateContent 기반 텍스트 생성
//!
//! 역할(system/user/assistant)이 붙은 메시지 목록을 받아 응답 텍스트를 돌려줍니다.
//! system 메시지는 `systemInstruction`으로, assistant 메시지는 `model` 역할로 보냅니다.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::embedding::{get_api_key, GeminiError};
use crate::error::ChatError;

// ============================================================================
// Types
// ============================================================================

/// 메시지 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmRole {
    System,
    User,
    Assistant,
}

/// 모델에 전달하는 메시지
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: LlmRole,
    pub content: String,
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: LlmRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: LlmRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: LlmRole::Assistant,
            content: content.into(),
        }
    }
}

// ============================================================================
// ChatModel Trait
// ============================================================================

/// 텍스트 생성 모델 트레이트
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// 메시지 목록에 대한 응답 생성
    async fn complete(&self, messages: &[LlmMessage]) -> Result<String>;

    /// 단일 프롬프트 응답 생성
    async fn complete_prompt(&self, prompt: &str) -> Result<String> {
        self.complete(&[LlmMessage::user(prompt)]).await
    }

    /// 모델 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Google Gemini Chat
// ============================================================================

/// 기본 생성 모델
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.0-flash";

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// 생성 파라미터
#[derive(Debug, Clone, Copy)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_output_tokens: 1024,
        }
    }
}

/// Gemini 텍스트 생성 클라이언트
///
/// API 키는 생성 시점이 아니라 첫 호출 시점에 검사합니다.
#[derive(Debug)]
pub struct GeminiChat {
    api_key: Option<String>,
    model: String,
    settings: GenerationSettings,
    client: reqwest::Client,
}

impl GeminiChat {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            model: model.into(),
            settings: GenerationSettings::default(),
            client,
        })
    }

    /// 환경변수에서 API 키를 읽어 생성 (키가 없어도 생성됨)
    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        Self::new(get_api_key().ok(), model)
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", GEMINI_API_BASE, self.model)
    }
}

/// 메시지 목록을 generateContent 요청으로 변환
fn build_request(messages: &[LlmMessage], settings: GenerationSettings) -> GenerateRequest {
    let system_text: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == LlmRole::System)
        .map(|m| m.content.as_str())
        .collect();

    let system_instruction = (!system_text.is_empty()).then(|| Content {
        role: None,
        parts: vec![Part {
            text: system_text.join("\n\n"),
        }],
    });

    let contents = messages
        .iter()
        .filter(|m| m.role != LlmRole::System)
        .map(|m| Content {
            role: Some(
                match m.role {
                    LlmRole::Assistant => "model",
                    _ => "user",
                }
                .to_string(),
            ),
            parts: vec![Part {
                text: m.content.clone(),
            }],
        })
        .collect();

    GenerateRequest {
        contents,
        system_instruction,
        generation_config: GenerationConfig {
            temperature: settings.temperature,
            max_output_tokens: settings.max_output_tokens,
        },
    }
}

#[async_trait]
impl ChatModel for GeminiChat {
    async fn complete(&self, messages: &[LlmMessage]) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow::Error::new(ChatError::MissingApiKey))?;

        let request = build_request(messages, self.settings);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send generateContent request")?;

        let status = response.status();
        let body = response.text().await.context("Failed to read response body")?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<GeminiError>(&body) {
                anyhow::bail!(
                    "Gemini API error ({}): {}",
                    error.error.status,
                    error.error.message
                );
            }
            anyhow::bail!("Gemini API error ({}): {}", status, body);
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).context("Failed to parse generateContent response")?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            anyhow::bail!("Gemini returned an empty response");
        }

        tracing::debug!(model = %self.model, chars = text.len(), "Generated response");
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_roles() {
        let messages = vec![
            LlmMessage::system("Context: Roblox facts"),
            LlmMessage::user("Hi"),
            LlmMessage::assistant("Hello!"),
            LlmMessage::user("What is Roblox?"),
        ];

        let json = serde_json::to_value(build_request(&messages, GenerationSettings::default()))
            .unwrap();

        assert_eq!(
            json["systemInstruction"]["parts"][0]["text"],
            "Context: Roblox facts"
        );
        assert!(json["systemInstruction"].get("role").is_none());
        let contents = json["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["parts"][0]["text"], "What is Roblox?");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 1024);
    }

    #[test]
    fn test_build_request_without_system() {
        let json = serde_json::to_value(build_request(
            &[LlmMessage::user("Hi")],
            GenerationSettings::default(),
        ))
        .unwrap();
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Roblox is "},{"text":"a platform."}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        let parts: Vec<String> = parsed.candidates[0]
            .content
            .parts
            .iter()
            .map(|p| p.text.clone())
            .collect();
        assert_eq!(parts.join(""), "Roblox is a platform.");
    }

    #[tokio::test]
    async fn test_missing_key_fails_at_first_call() {
        let model = GeminiChat::new(None, DEFAULT_CHAT_MODEL).unwrap();
        let err = model.complete_prompt("hi").await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<ChatError>(),
            Some(&ChatError::MissingApiKey)
        );
    }
}
