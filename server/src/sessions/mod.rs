pub mod models;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tower_cookies::{
    cookie::{Cookie, SameSite},
    Cookies, Key,
};
use uuid::Uuid;

use crate::{AppError, InnerAppState};

use self::{models::SessionData, store::SessionStore};

pub const SESSION_COOKIE_NAME: &str = "session";

pub const AUTHENTICATED_USER_ID_KEY: &str = "authenticatedUserID";
pub const FLASH_KEY: &str = "flash";
pub const REDIRECT_PATH_KEY: &str = "redirectPathAfterLogin";

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("something went wrong")]
    Sqlx(#[from] sqlx::Error),

    #[error("something went wrong")]
    Json(#[from] serde_json::Error),

    #[error("session middleware is not installed")]
    MissingLayer,

    #[error("session expiry out of range")]
    InvalidExpiry,
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}

struct SessionState {
    token: Option<Uuid>,
    /// Token replaced by [`Session::renew_token`], removed from the store on commit.
    stale_token: Option<Uuid>,
    data: SessionData,
    expiry: DateTime<Utc>,
    modified: bool,
}

/// Per-request handle on the session of the current client.
///
/// Changes are held in memory and written back by [`load_and_save`] once the
/// handler has produced its response.
#[derive(Clone)]
pub struct Session {
    state: Arc<Mutex<SessionState>>,
}

impl Session {
    fn new(token: Option<Uuid>, data: SessionData, expiry: DateTime<Utc>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState {
                token,
                stale_token: None,
                data,
                expiry,
                modified: false,
            })),
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.state.lock().await.data.get(key)
    }

    pub async fn put<T: Serialize>(&self, key: &str, value: T) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;
        state.data.insert(key, value)?;
        state.modified = true;
        Ok(())
    }

    /// Removes `key` and returns what it held, for one-time values like flashes.
    pub async fn pop<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut state = self.state.lock().await;
        let value = state.data.remove(key)?;
        state.modified = true;
        serde_json::from_value(value).ok()
    }

    pub async fn remove(&self, key: &str) {
        let mut state = self.state.lock().await;
        if state.data.remove(key).is_some() {
            state.modified = true;
        }
    }

    /// Moves the session data to a fresh token. The old token stops working
    /// once the session is committed.
    pub async fn renew_token(&self) {
        let mut state = self.state.lock().await;
        if state.stale_token.is_none() {
            state.stale_token = state.token;
        }
        state.token = None;
        state.modified = true;
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = SessionError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Session>().cloned().ok_or_else(|| {
            log::error!("session-extractor: no session in request extensions");
            SessionError::MissingLayer
        })
    }
}

pub struct SessionManager {
    store: Box<dyn SessionStore>,
    lifetime: Duration,
    cookies_secret: Key,
    secure: bool,
}

impl SessionManager {
    pub fn new(store: Box<dyn SessionStore>, lifetime: Duration, cookies_secret: Key) -> Self {
        Self {
            store,
            lifetime,
            cookies_secret,
            secure: false,
        }
    }

    /// Sets the `Secure` attribute on the session cookie.
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Loads the session for `token`, or starts an empty one when the token is
    /// absent, unknown or expired.
    pub async fn load(&self, token: Option<Uuid>) -> Result<Session, SessionError> {
        if let Some(token) = token {
            if let Some(record) = self.store.find(token).await? {
                return Ok(Session::new(Some(token), record.data, record.expiry));
            }
        }

        Ok(Session::new(
            None,
            SessionData::default(),
            Utc::now() + self.lifetime,
        ))
    }

    /// Writes a modified session back to the store. Returns the token and
    /// expiry the client cookie must carry, or `None` when nothing changed.
    pub async fn commit(
        &self,
        session: &Session,
    ) -> Result<Option<(Uuid, DateTime<Utc>)>, SessionError> {
        let mut state = session.state.lock().await;

        if !state.modified {
            return Ok(None);
        }

        if let Some(stale_token) = state.stale_token.take() {
            self.store.delete(stale_token).await?;
        }

        let current_token = state.token;
        let token = match current_token {
            Some(token) => token,
            None => {
                let token = Uuid::new_v4();
                state.token = Some(token);
                state.expiry = Utc::now() + self.lifetime;
                token
            }
        };

        self.store.commit(token, &state.data, state.expiry).await?;
        state.modified = false;

        Ok(Some((token, state.expiry)))
    }

    fn cookie(&self, token: Uuid, expiry: DateTime<Utc>) -> Result<Cookie<'static>, SessionError> {
        let expires = OffsetDateTime::from_unix_timestamp(expiry.timestamp())
            .map_err(|_| SessionError::InvalidExpiry)?;

        Ok(Cookie::build((SESSION_COOKIE_NAME, token.to_string()))
            .path("/")
            .expires(expires)
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .build())
    }
}

/// Loads the session named by the private session cookie before the handler
/// runs and persists it afterwards.
pub async fn load_and_save(
    State(state): State<Arc<InnerAppState>>,
    cookies: Cookies,
    mut request: Request,
    next: Next,
) -> Result<Response, SessionError> {
    let manager = &state.sessions;

    let token = cookies
        .private(&manager.cookies_secret)
        .get(SESSION_COOKIE_NAME)
        .and_then(|cookie| {
            Uuid::parse_str(cookie.value())
                .map_err(|e| log::warn!("session-middleware: invalid session token: {e}"))
                .ok()
        });

    let session = manager.load(token).await?;
    request.extensions_mut().insert(session.clone());

    let response = next.run(request).await;

    if let Some((token, expiry)) = manager.commit(&session).await? {
        cookies
            .private(&manager.cookies_secret)
            .add(manager.cookie(token, expiry)?);
    }

    Ok(response)
}
