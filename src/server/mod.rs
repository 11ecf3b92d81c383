//! 웹 UI 서버 (axum)
//!
//! 브라우저 세션마다 메시지 기록을 유지하는 챗 화면과 JSON API를 제공합니다.
//!
//! | Method | Path | 설명 |
//! |--------|------|------|
//! | GET | `/` | 챗 화면 |
//! | GET | `/health` | 헬스 체크 |
//! | GET | `/api/status` | 인덱스 상태 + 화면 문구 |
//! | GET | `/api/messages` | 현재 세션 기록 |
//! | POST | `/api/chat` | 사용자 턴 처리 |
//! | POST | `/api/reset` | 기록 초기화 |
//! | DELETE | `/api/session` | 세션 종료 |

mod error;
mod handlers;
mod page;
mod session;

pub use error::ApiError;
pub use session::{SessionRegistry, DEFAULT_SESSION_TTL, SESSION_COOKIE};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::routing::{delete, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::OnceCell;
use tower_http::trace::TraceLayer;

use crate::config::{ChatConfig, UiConfig};
use crate::engine::ChatEngine;
use crate::knowledge::IndexHandle;
use crate::llm::ChatModel;

/// 세션 정리 주기 상한
const MAX_REAP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// 공유 애플리케이션 상태
pub struct AppState {
    pub index: Arc<IndexHandle>,
    pub config: ChatConfig,
    pub ui: UiConfig,
    pub sessions: SessionRegistry,
    model: Arc<dyn ChatModel>,
    engine: OnceCell<Arc<ChatEngine>>,
}

impl AppState {
    pub fn new(
        index: Arc<IndexHandle>,
        model: Arc<dyn ChatModel>,
        config: ChatConfig,
        ui: UiConfig,
    ) -> Self {
        Self::with_session_ttl(index, model, config, ui, DEFAULT_SESSION_TTL)
    }

    pub fn with_session_ttl(
        index: Arc<IndexHandle>,
        model: Arc<dyn ChatModel>,
        config: ChatConfig,
        ui: UiConfig,
        ttl: Duration,
    ) -> Self {
        let sessions = SessionRegistry::new(ui.greeting.clone(), config.memory_token_limit, ttl);
        Self {
            index,
            config,
            ui,
            sessions,
            model,
            engine: OnceCell::new(),
        }
    }

    /// 인덱스가 준비되면 엔진 생성 (한 번만)
    pub async fn engine(&self) -> Result<Arc<ChatEngine>, ApiError> {
        let engine = self
            .engine
            .get_or_try_init(|| async {
                let index = self.index.get().await?;
                let engine = ChatEngine::from_config(index, self.model.clone(), &self.config)
                    .map_err(ApiError::internal)?;
                Ok::<_, ApiError>(Arc::new(engine))
            })
            .await?;
        Ok(engine.clone())
    }
}

/// 라우터 생성
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::index_page))
        .route("/health", get(handlers::health))
        .route("/api/status", get(handlers::status))
        .route("/api/messages", get(handlers::messages))
        .route("/api/chat", post(handlers::chat))
        .route("/api/reset", post(handlers::reset))
        .route("/api/session", delete(handlers::end_session))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 유휴 세션 정리 태스크
pub fn spawn_session_reaper(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    let period = (state.sessions.ttl() / 4).clamp(Duration::from_secs(1), MAX_REAP_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let reaped = state.sessions.reap_expired();
            if reaped > 0 {
                tracing::info!("Reaped {} idle sessions", reaped);
            }
        }
    })
}

/// 서버 실행
///
/// 시작과 동시에 인덱스 빌드를 백그라운드로 시작합니다.
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> Result<()> {
    let warmup = state.clone();
    tokio::spawn(async move {
        if let Err(e) = warmup.index.get().await {
            tracing::error!("{}", e);
        }
    });
    spawn_session_reaper(state.clone());

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, router(state))
        .await
        .context("Server error")?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
