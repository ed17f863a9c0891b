use axum::{
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::Response,
    routing::{get, post, MethodRouter},
    Router,
};
use tower_cookies::CookieManagerLayer;
use tower_http::{
    catch_panic::CatchPanicLayer,
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
    timeout::{RequestBodyTimeoutLayer, TimeoutLayer},
};

use crate::{
    auth::{authenticate, require_authentication},
    client_error,
    middleware::{handle_panic, log_request, secure_headers},
    sessions::load_and_save,
    snippets::routes::{home, snippet_create, snippet_create_post, snippet_view},
    users::routes::{
        account_view, user_login, user_login_post, user_logout_post, user_signup,
        user_signup_post,
    },
    AppState,
};

const MAX_BODY_BYTES: usize = 1024 * 1024;

pub async fn ping() -> &'static str {
    "OK"
}

pub async fn not_found() -> Response {
    client_error(StatusCode::NOT_FOUND)
}

/// Puts the handlers of `route` behind a login. A request with a method the
/// route does not handle still gets 405.
fn protected(route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.route_layer(from_fn(require_authentication))
}

pub fn app(app_state: AppState) -> Router {
    let dynamic = Router::new()
        .route("/", get(home))
        .route("/snippet/view/:id", get(snippet_view))
        .route("/user/signup", get(user_signup).post(user_signup_post))
        .route("/user/login", get(user_login).post(user_login_post))
        .route(
            "/snippet/create",
            protected(get(snippet_create).post(snippet_create_post)),
        )
        .route("/user/logout", protected(post(user_logout_post)))
        .route("/account/view", protected(get(account_view)))
        .layer(from_fn_with_state(app_state.clone(), authenticate))
        .layer(from_fn_with_state(app_state.clone(), load_and_save))
        .layer(CookieManagerLayer::new());

    let mut app = Router::new()
        .route("/ping", get(ping))
        .nest_service("/static", ServeDir::new(&app_state.inner.static_dir))
        .merge(dynamic)
        .fallback(not_found);

    for (name, value) in secure_headers() {
        app = app.layer(SetResponseHeaderLayer::overriding(name, value));
    }

    app.layer(from_fn(log_request))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(RequestBodyTimeoutLayer::new(app_state.inner.read_timeout))
        .layer(TimeoutLayer::new(app_state.inner.request_timeout))
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(app_state)
}
