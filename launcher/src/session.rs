//! Browser sessions
//!
//! Session state lives in process memory. The browser only holds the
//! `xylo_session` cookie: an HS256 JWT whose `sub` is the session id. The GitHub
//! access token never leaves the server.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{FromRef, FromRequestParts};
use chrono::{DateTime, Utc};
use http::header::{self, HeaderMap, HeaderValue};
use http::request::Parts;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::errors::LauncherError;
use crate::github::{GitHubApi, GitHubClient};
use crate::utils::generate_uuid;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "xylo_session";

/// JWT claims carried by the session cookie
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Server side session
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub login: Option<String>,
    access_token: Option<SecretString>,
    oauth_state: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl Session {
    fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            login: None,
            access_token: None,
            oauth_state: None,
            created_at: now,
            last_seen_at: now,
        }
    }

    fn is_authenticated(&self) -> bool {
        self.login.is_some() && self.access_token.is_some()
    }
}

/// In-memory session store with cookie signing
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    secure_cookie: bool,
}

impl SessionStore {
    pub fn new(secret: &SecretString, ttl: Duration, secure_cookie: bool) -> Self {
        let secret = secret.expose_secret().as_bytes();
        Self {
            sessions: RwLock::new(HashMap::new()),
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
            secure_cookie,
        }
    }

    /// Idle lifetime of a session
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Create an anonymous session and return its id
    pub async fn create(&self) -> String {
        let id = generate_uuid();
        self.sessions
            .write()
            .await
            .insert(id.clone(), Session::new(id.clone()));
        debug!("Created session {}", id);
        id
    }

    /// Whether a live session exists; refreshes its idle timer
    pub async fn touch(&self, id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(id) {
            Some(session) if !self.is_expired(session, Utc::now()) => {
                session.last_seen_at = Utc::now();
                true
            }
            _ => false,
        }
    }

    /// Login of an authenticated session
    pub async fn login(&self, id: &str) -> Option<String> {
        let sessions = self.sessions.read().await;
        sessions
            .get(id)
            .filter(|s| s.is_authenticated())
            .and_then(|s| s.login.clone())
    }

    /// Remember the OAuth `state` issued for this session
    pub async fn set_oauth_state(&self, id: &str, state: &str) -> Result<(), LauncherError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| LauncherError::AuthError("Session expired".to_string()))?;
        session.oauth_state = Some(state.to_string());
        Ok(())
    }

    /// Consume the pending OAuth `state`; it can be checked only once
    pub async fn take_oauth_state(&self, id: &str) -> Option<String> {
        let mut sessions = self.sessions.write().await;
        sessions.get_mut(id).and_then(|s| s.oauth_state.take())
    }

    /// Attach the GitHub identity and token after a successful login
    pub async fn authenticate(
        &self,
        id: &str,
        login: &str,
        access_token: SecretString,
    ) -> Result<(), LauncherError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| LauncherError::AuthError("Session expired".to_string()))?;
        session.login = Some(login.to_string());
        session.access_token = Some(access_token);
        session.last_seen_at = Utc::now();
        debug!("Session {} authenticated as {}", id, login);
        Ok(())
    }

    /// Authenticated view of a session
    pub async fn auth_session(&self, id: &str) -> Option<AuthSession> {
        let mut sessions = self.sessions.write().await;
        let now = Utc::now();
        let session = sessions.get_mut(id)?;
        if self.is_expired(session, now) {
            return None;
        }
        session.last_seen_at = now;
        match (&session.login, &session.access_token) {
            (Some(login), Some(token)) => Some(AuthSession {
                id: session.id.clone(),
                login: login.clone(),
                token: SecretString::from(token.expose_secret().to_string()),
            }),
            _ => None,
        }
    }

    pub async fn remove(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop sessions idle for longer than the TTL; returns how many were removed
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !self.is_expired(session, now));
        before - sessions.len()
    }

    fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        let idle = now.signed_duration_since(session.last_seen_at);
        idle.to_std().map(|idle| idle > self.ttl).unwrap_or(false)
    }

    /// Sign a cookie value for a session id
    pub fn issue_token(&self, id: &str) -> Result<String, LauncherError> {
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            sub: id.to_string(),
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    /// Verify a cookie value and return the session id
    pub fn verify_token(&self, token: &str) -> Result<String, LauncherError> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &Validation::default())?;
        Ok(data.claims.sub)
    }

    /// `Set-Cookie` value carrying a session
    pub fn session_cookie(&self, id: &str) -> Result<HeaderValue, LauncherError> {
        let token = self.issue_token(id)?;
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            SESSION_COOKIE,
            token,
            self.ttl.as_secs()
        );
        if self.secure_cookie {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
            .map_err(|e| LauncherError::Internal(format!("Invalid cookie header: {}", e)))
    }

    /// `Set-Cookie` value expiring the session cookie
    pub fn expired_cookie(&self) -> HeaderValue {
        HeaderValue::from_static("xylo_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
    }

    /// Session id from a request's cookie, if the cookie verifies
    pub fn session_id_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        let token = cookie_value(headers, SESSION_COOKIE)?;
        match self.verify_token(&token) {
            Ok(id) => Some(id),
            Err(e) => {
                trace!("Ignoring invalid session cookie: {}", e);
                None
            }
        }
    }
}

/// Value of a named cookie
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// An authenticated session, extracted from the session cookie
///
/// Rejects with 401 when the cookie is missing, invalid or the session has no
/// GitHub login.
#[derive(Debug)]
pub struct AuthSession {
    pub id: String,
    pub login: String,
    token: SecretString,
}

impl AuthSession {
    /// GitHub client acting as the session's user
    pub fn github(&self, api: &GitHubApi) -> GitHubClient {
        api.client(self.token.expose_secret())
    }
}

impl<S> FromRequestParts<S> for AuthSession
where
    S: std::ops::Deref<Target: Sized> + Send + Sync,
    Arc<SessionStore>: FromRef<S::Target>,
{
    type Rejection = LauncherError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let sessions = Arc::<SessionStore>::from_ref(&**state);
        let id = sessions
            .session_id_from_headers(&parts.headers)
            .ok_or_else(|| LauncherError::AuthError("Not authenticated".to_string()))?;
        sessions
            .auth_session(&id)
            .await
            .ok_or_else(|| LauncherError::AuthError("Not authenticated".to_string()))
    }
}

/// Id of the live session named by the cookie, if any
#[derive(Debug)]
pub struct MaybeSession(pub Option<String>);

impl<S> FromRequestParts<S> for MaybeSession
where
    S: std::ops::Deref<Target: Sized> + Send + Sync,
    Arc<SessionStore>: FromRef<S::Target>,
{
    type Rejection = LauncherError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let sessions = Arc::<SessionStore>::from_ref(&**state);
        let Some(id) = sessions.session_id_from_headers(&parts.headers) else {
            return Ok(MaybeSession(None));
        };
        if sessions.touch(&id).await {
            Ok(MaybeSession(Some(id)))
        } else {
            Ok(MaybeSession(None))
        }
    }
}
