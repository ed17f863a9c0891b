use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
    extract::FromRef,
    http::StatusCode,
    response::{IntoResponse, Response},
};

pub mod auth;
pub mod config;
pub mod middleware;
pub mod pages;
pub mod routes;
pub mod sessions;
pub mod snippets;
pub mod users;
pub mod validator;

#[cfg(test)]
mod testutil;

use crate::{
    pages::{PagesError, TemplateCache},
    sessions::{SessionError, SessionManager},
    snippets::{SnippetModel, SnippetsError},
    users::{UserModel, UsersError},
};

#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<InnerAppState>,
}

impl AppState {
    pub fn new(inner: InnerAppState) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }
}

impl FromRef<AppState> for Arc<InnerAppState> {
    fn from_ref(state: &AppState) -> Self {
        state.inner.clone()
    }
}

/// Everything handlers share. Built once at startup and never mutated.
pub struct InnerAppState {
    pub snippets: Box<dyn SnippetModel>,
    pub users: Box<dyn UserModel>,
    pub sessions: SessionManager,
    pub templates: TemplateCache,
    pub static_dir: PathBuf,
    /// Longest a client may take to send a request body
    pub read_timeout: Duration,
    pub request_timeout: Duration,
}

/// Detail of a server error, carried on the response until
/// [`middleware::log_request`] logs it next to the request method and URI.
#[derive(Clone, Debug)]
pub struct ServerError(pub String);

pub enum AppError {
    /// Answered with the status and its standard reason text.
    Client(StatusCode),
    /// Logged, and answered with a bare 500.
    Server(anyhow::Error),
}

pub fn client_error(status: StatusCode) -> Response {
    (status, status.canonical_reason().unwrap_or_default()).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Client(status) => client_error(status),
            AppError::Server(err) => {
                let mut response = client_error(StatusCode::INTERNAL_SERVER_ERROR);
                response
                    .extensions_mut()
                    .insert(ServerError(format!("{err:#}")));
                response
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Server(err)
    }
}

impl From<SnippetsError> for AppError {
    fn from(err: SnippetsError) -> Self {
        match err {
            SnippetsError::NoRecord => Self::Client(StatusCode::NOT_FOUND),
            err => Self::Server(err.into()),
        }
    }
}

impl From<UsersError> for AppError {
    fn from(err: UsersError) -> Self {
        match err {
            UsersError::NoRecord => Self::Client(StatusCode::NOT_FOUND),
            err => Self::Server(err.into()),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        Self::Server(err.into())
    }
}

impl From<PagesError> for AppError {
    fn from(err: PagesError) -> Self {
        Self::Server(err.into())
    }
}
