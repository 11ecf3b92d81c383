//! 세션 레지스트리 - 쿠키 ID별 챗 세션
//!
//! 세션마다 비동기 Mutex를 두어 같은 세션의 턴은 순서대로 처리합니다.
//! 마지막 접근 후 TTL이 지난 세션은 리퍼가 제거합니다.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use axum::http::{header, HeaderMap, HeaderValue};
use uuid::Uuid;

use crate::session::ChatSession;

/// 세션 쿠키 이름
pub const SESSION_COOKIE: &str = "rag_chat_session";

/// 기본 유휴 TTL (30분)
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

pub type SharedSession = Arc<tokio::sync::Mutex<ChatSession>>;

struct SessionEntry {
    session: SharedSession,
    last_seen: Instant,
}

pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, SessionEntry>>,
    ttl: Duration,
    greeting: String,
    memory_token_limit: usize,
}

impl SessionRegistry {
    pub fn new(greeting: impl Into<String>, memory_token_limit: usize, ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
            greeting: greeting.into(),
            memory_token_limit,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, SessionEntry>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 기존 세션을 찾거나 새로 생성
    ///
    /// 반환값의 `bool`은 새로 만들었는지 여부입니다 (쿠키 발급 필요).
    pub fn get_or_create(&self, id: Option<Uuid>) -> (Uuid, SharedSession, bool) {
        let mut sessions = self.lock();

        if let Some(id) = id {
            if let Some(entry) = sessions.get_mut(&id) {
                entry.last_seen = Instant::now();
                return (id, entry.session.clone(), false);
            }
        }

        let id = Uuid::new_v4();
        let session = Arc::new(tokio::sync::Mutex::new(ChatSession::new(
            self.greeting.clone(),
            self.memory_token_limit,
        )));
        sessions.insert(
            id,
            SessionEntry {
                session: session.clone(),
                last_seen: Instant::now(),
            },
        );
        tracing::debug!("Created session {}", id);
        (id, session, true)
    }

    pub fn remove(&self, id: &Uuid) -> bool {
        let removed = self.lock().remove(id).is_some();
        if removed {
            tracing::debug!("Removed session {}", id);
        }
        removed
    }

    /// TTL이 지난 세션 제거, 제거한 개수 반환
    pub fn reap_expired(&self) -> usize {
        let ttl = self.ttl;
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_seen.elapsed() < ttl);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

// ============================================================================
// Cookies
// ============================================================================

/// 요청 쿠키에서 세션 ID 추출
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value).ok())
}

pub fn session_cookie(id: &Uuid) -> HeaderValue {
    let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id);
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

pub fn expired_session_cookie() -> HeaderValue {
    HeaderValue::from_static("rag_chat_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(ttl: Duration) -> SessionRegistry {
        SessionRegistry::new("Hello!", 1000, ttl)
    }

    #[test]
    fn test_get_or_create_reuses_session() {
        let registry = registry(DEFAULT_SESSION_TTL);

        let (id, first, created) = registry.get_or_create(None);
        assert!(created);

        let (same_id, second, created) = registry.get_or_create(Some(id));
        assert!(!created);
        assert_eq!(id, same_id);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_id_creates_new_session() {
        let registry = registry(DEFAULT_SESSION_TTL);
        let stale = Uuid::new_v4();

        let (id, _, created) = registry.get_or_create(Some(stale));
        assert!(created);
        assert_ne!(id, stale);
    }

    #[test]
    fn test_reap_expired() {
        let registry = registry(Duration::ZERO);
        registry.get_or_create(None);
        registry.get_or_create(None);

        assert_eq!(registry.reap_expired(), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove() {
        let registry = registry(DEFAULT_SESSION_TTL);
        let (id, _, _) = registry.get_or_create(None);
        assert!(registry.remove(&id));
        assert!(!registry.remove(&id));
    }

    #[test]
    fn test_cookie_parsing() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {}={}", SESSION_COOKIE, id)).unwrap(),
        );
        assert_eq!(session_id_from_headers(&headers), Some(id));

        let mut bad = HeaderMap::new();
        bad.insert(header::COOKIE, HeaderValue::from_static("rag_chat_session=nope"));
        assert_eq!(session_id_from_headers(&bad), None);
        assert_eq!(session_id_from_headers(&HeaderMap::new()), None);
    }
}
