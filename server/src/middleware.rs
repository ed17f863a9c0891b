use std::{any::Any, net::SocketAddr};

use axum::{
    extract::{ConnectInfo, Request},
    http::{header, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::{client_error, ServerError};

/// Headers set on every response.
pub fn secure_headers() -> [(HeaderName, HeaderValue); 5] {
    [
        (
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(
                "default-src 'self'; style-src 'self' fonts.googleapis.com; font-src fonts.gstatic.com",
            ),
        ),
        (
            header::REFERRER_POLICY,
            HeaderValue::from_static("origin-when-cross-origin"),
        ),
        (
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ),
        (header::X_FRAME_OPTIONS, HeaderValue::from_static("deny")),
        (header::X_XSS_PROTECTION, HeaderValue::from_static("0")),
    ]
}

/// Logs every request, and the detail of any server error its handler hit.
pub async fn log_request(request: Request, next: Next) -> Response {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| String::from("-"));
    let proto = request.version();
    let method = request.method().clone();
    let uri = request.uri().clone();

    log::info!("received request ip={ip} proto={proto:?} method={method} uri={uri}");

    let mut response = next.run(request).await;

    if let Some(ServerError(detail)) = response.extensions_mut().remove::<ServerError>() {
        log::error!("{detail} method={method} uri={uri}");
    }

    response
}

pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        String::from("unknown panic message")
    };

    log::error!("handler panicked: {detail}");

    let mut response = client_error(StatusCode::INTERNAL_SERVER_ERROR);
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
