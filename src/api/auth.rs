//! Admin sessions: password check, cookie handling and the route guard

use axum::{
    extract::{Request, State},
    http::{header::COOKIE, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

const MAX_SESSION_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Hex encoded SHA-256 of a password
pub fn hash_password(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

/// Compare a password against the configured hash
pub fn verify_password(password: &str, expected_hash: &str) -> bool {
    hash_password(password) == expected_hash.trim().to_ascii_lowercase()
}

/// Server-side store of logged-in admin sessions
#[derive(Debug)]
pub struct AdminSessions {
    sessions: DashMap<String, DateTime<Utc>>,
    ttl: Duration,
}

impl AdminSessions {
    pub fn new(ttl_secs: u64) -> Self {
        let ttl_secs = ttl_secs.min(MAX_SESSION_TTL_SECS) as i64;
        Self {
            sessions: DashMap::new(),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Open a session and return its id. Expired sessions are pruned first.
    pub fn create(&self) -> String {
        let now = Utc::now();
        self.sessions.retain(|_, expires_at| *expires_at > now);

        let id = Uuid::new_v4().simple().to_string();
        self.sessions.insert(id.clone(), now + self.ttl);
        debug!("Admin session created");
        id
    }

    /// True for a known, unexpired session. Expired sessions are dropped.
    pub fn is_valid(&self, id: &str) -> bool {
        let expired = match self.sessions.get(id) {
            Some(expires_at) => *expires_at <= Utc::now(),
            None => return false,
        };
        if expired {
            self.sessions.remove(id);
        }
        !expired
    }

    pub fn remove(&self, id: &str) {
        self.sessions.remove(id);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }
}

/// Value of the named cookie in the request headers
pub fn session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value opening a session
pub fn session_cookie_header(name: &str, id: &str, max_age_secs: i64) -> HeaderValue {
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        name, id, max_age_secs
    );
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// `Set-Cookie` value removing the session cookie
pub fn clear_cookie_header(name: &str) -> HeaderValue {
    session_cookie_header(name, "", 0)
}

/// Reject requests without a valid admin session with 401
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let cookie_name = state.settings.read().await.admin.cookie_name.clone();

    match session_cookie(request.headers(), &cookie_name) {
        Some(id) if state.sessions.is_valid(&id) => Ok(next.run(request).await),
        _ => Err(AppError::Unauthorized),
    }
}
