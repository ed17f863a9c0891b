use std::{convert::Infallible, sync::Arc};

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    RequestPartsExt,
};

use crate::{
    sessions::{Session, SessionError, AUTHENTICATED_USER_ID_KEY, REDIRECT_PATH_KEY},
    AppError, InnerAppState,
};

pub const LOGIN_PATH: &str = "/user/login";

/// Whether the request carries a session of a user that still exists.
/// Set by [`authenticate`]; absent means anonymous.
#[derive(Debug, Default, Clone, Copy)]
pub struct IsAuthenticated(pub bool);

#[async_trait]
impl<S> FromRequestParts<S> for IsAuthenticated
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<IsAuthenticated>()
            .copied()
            .unwrap_or_default())
    }
}

/// The id of the logged in user, for handlers behind [`require_authentication`].
pub struct CurrentUser {
    pub id: i64,
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("not logged in")]
    Unauthenticated,

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::Unauthenticated => Redirect::to(LOGIN_PATH).into_response(),
            AuthError::Session(e) => e.into_response(),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let Ok(IsAuthenticated(true)) = parts.extract::<IsAuthenticated>().await else {
            return Err(AuthError::Unauthenticated);
        };

        let session = parts.extract::<Session>().await?;
        let id = session
            .get::<i64>(AUTHENTICATED_USER_ID_KEY)
            .await
            .ok_or(AuthError::Unauthenticated)?;

        Ok(CurrentUser { id })
    }
}

pub async fn authenticate(
    State(state): State<Arc<InnerAppState>>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let is_authenticated = match session.get::<i64>(AUTHENTICATED_USER_ID_KEY).await {
        Some(id) => state.users.exists(id).await?,
        None => false,
    };

    request
        .extensions_mut()
        .insert(IsAuthenticated(is_authenticated));

    Ok(next.run(request).await)
}

/// Sends anonymous clients to the login page, remembering the page they
/// asked for. Authenticated responses are marked as not cacheable.
pub async fn require_authentication(
    IsAuthenticated(is_authenticated): IsAuthenticated,
    session: Session,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !is_authenticated {
        if request.method() == Method::GET {
            session
                .put(REDIRECT_PATH_KEY, request.uri().path())
                .await?;
        }
        return Ok(Redirect::to(LOGIN_PATH).into_response());
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    Ok(response)
}
