use std::sync::Arc;

use axum::{
    extract::{rejection::FormRejection, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};

use crate::{
    auth::CurrentUser,
    pages::{PageForm, TemplateData},
    sessions::{Session, AUTHENTICATED_USER_ID_KEY, FLASH_KEY, REDIRECT_PATH_KEY},
    AppError, InnerAppState,
};

use super::{
    models::{UserLoginForm, UserSignupForm},
    UsersError,
};

fn decode<T>(form: Result<Form<T>, FormRejection>) -> Result<T, AppError> {
    form.map(|Form(form)| form).map_err(|e| {
        log::warn!("undecodable form: {e}");
        AppError::Client(StatusCode::BAD_REQUEST)
    })
}

pub async fn user_signup(
    State(state): State<Arc<InnerAppState>>,
    mut data: TemplateData,
) -> Result<Response, AppError> {
    data.form = PageForm::Signup(UserSignupForm::default());

    Ok(state.templates.respond(StatusCode::OK, "signup.html", data).await?)
}

pub async fn user_signup_post(
    State(state): State<Arc<InnerAppState>>,
    session: Session,
    mut data: TemplateData,
    form: Result<Form<UserSignupForm>, FormRejection>,
) -> Result<Response, AppError> {
    let form = decode(form)?;

    let mut errors = form.check();
    if errors.valid() {
        match state
            .users
            .insert(&form.name, &form.email, &form.password)
            .await
        {
            Ok(()) => {
                session
                    .put(FLASH_KEY, "Your signup was successful. Please log in.")
                    .await?;
                return Ok(Redirect::to("/user/login").into_response());
            }
            Err(UsersError::DuplicateEmail) => {
                errors.add_field_error("email", "Email address is already in use");
            }
            Err(e) => return Err(e.into()),
        }
    }

    data.form = PageForm::Signup(form);
    data.errors = errors;

    Ok(state
        .templates
        .respond(StatusCode::UNPROCESSABLE_ENTITY, "signup.html", data)
        .await?)
}

pub async fn user_login(
    State(state): State<Arc<InnerAppState>>,
    mut data: TemplateData,
) -> Result<Response, AppError> {
    data.form = PageForm::Login(UserLoginForm::default());

    Ok(state.templates.respond(StatusCode::OK, "login.html", data).await?)
}

pub async fn user_login_post(
    State(state): State<Arc<InnerAppState>>,
    session: Session,
    mut data: TemplateData,
    form: Result<Form<UserLoginForm>, FormRejection>,
) -> Result<Response, AppError> {
    let form = decode(form)?;

    let mut errors = form.check();
    if errors.valid() {
        match state.users.authenticate(&form.email, &form.password).await {
            Ok(id) => {
                session.renew_token().await;
                session.put(AUTHENTICATED_USER_ID_KEY, id).await?;

                let path = session
                    .pop::<String>(REDIRECT_PATH_KEY)
                    .await
                    .unwrap_or_else(|| String::from("/snippet/create"));

                return Ok(Redirect::to(&path).into_response());
            }
            Err(UsersError::InvalidCredentials) => {
                errors.add_non_field_error("Email or password is incorrect");
            }
            Err(e) => return Err(e.into()),
        }
    }

    data.form = PageForm::Login(form);
    data.errors = errors;

    Ok(state
        .templates
        .respond(StatusCode::UNPROCESSABLE_ENTITY, "login.html", data)
        .await?)
}

pub async fn user_logout_post(session: Session) -> Result<Response, AppError> {
    session.renew_token().await;
    session.remove(AUTHENTICATED_USER_ID_KEY).await;
    session
        .put(FLASH_KEY, "You've been logged out successfully!")
        .await?;

    Ok(Redirect::to("/").into_response())
}

pub async fn account_view(
    State(state): State<Arc<InnerAppState>>,
    current_user: CurrentUser,
    mut data: TemplateData,
) -> Result<Response, AppError> {
    let user = match state.users.get(current_user.id).await {
        Ok(user) => user,
        Err(UsersError::NoRecord) => return Ok(Redirect::to("/user/login").into_response()),
        Err(e) => return Err(e.into()),
    };
    data.user = Some(user);

    Ok(state.templates.respond(StatusCode::OK, "account.html", data).await?)
}

#[cfg(test)]
mod tests {
    use axum::http::{header, Method, StatusCode};

    use crate::testutil::{
        body_string, form_request, login, request, send, session_cookie, TestApp, EMAIL, PASSWORD,
    };

    #[tokio::test]
    async fn test_signup_form() {
        let app = TestApp::new();
        let response = send(&app.router, request(Method::GET, "/user/signup", None)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response)
            .await
            .contains(r#"<form action="/user/signup" method="POST" novalidate>"#));
    }

    #[tokio::test]
    async fn test_signup_validation_keeps_values_but_not_password() {
        let app = TestApp::new();
        let response = send(
            &app.router,
            form_request(
                "/user/signup",
                "name=Bob&email=bob%40&password=secret",
                None,
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_string(response).await;
        assert!(body.contains(r#"value="Bob""#));
        assert!(body.contains("This field must be a valid email address"));
        assert!(body.contains("This field must be at least 8 characters long"));
        assert!(!body.contains("secret"));
    }

    #[tokio::test]
    async fn test_signup_duplicate_email() {
        let app = TestApp::new();
        let response = send(
            &app.router,
            form_request(
                "/user/signup",
                "name=Bob&email=dupe%40example.com&password=validPa%24%24word",
                None,
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_string(response).await;
        assert!(body.contains("Email address is already in use"));
        assert!(body.contains(r#"value="dupe@example.com""#));
    }

    #[tokio::test]
    async fn test_signup_success_redirects_to_login() {
        let app = TestApp::new();
        let response = send(
            &app.router,
            form_request(
                "/user/signup",
                "name=Bob&email=bob%40example.com&password=validPa%24%24word",
                None,
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/user/login");
        let cookie = session_cookie(&response).expect("session cookie");

        let response = send(
            &app.router,
            request(Method::GET, "/user/login", Some(&cookie)),
        )
        .await;
        assert!(body_string(response)
            .await
            .contains("Your signup was successful. Please log in."));
    }

    #[tokio::test]
    async fn test_login_failures_look_the_same() {
        let app = TestApp::new();

        for body in [
            format!("email={}&password=wrong-password", EMAIL.replace('@', "%40")),
            String::from("email=nobody%40example.com&password=wrong-password"),
        ] {
            let response = send(&app.router, form_request("/user/login", &body, None)).await;

            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
            assert!(session_cookie(&response).is_none());
            let body = body_string(response).await;
            assert!(body.contains("Email or password is incorrect"));
        }
    }

    #[tokio::test]
    async fn test_login_renews_session_token() {
        let app = TestApp::new();

        // an anonymous visit to a protected page opens a session
        let response = send(&app.router, request(Method::GET, "/account/view", None)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let anonymous = session_cookie(&response).expect("session cookie");
        assert_eq!(app.sessions.len().await, 1);

        let body = format!(
            "email={}&password={}",
            EMAIL.replace('@', "%40"),
            PASSWORD.replace('$', "%24")
        );
        let response = send(
            &app.router,
            form_request("/user/login", &body, Some(&anonymous)),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/account/view");
        let authenticated = session_cookie(&response).expect("session cookie");
        assert_ne!(anonymous, authenticated);
        // the anonymous token was dropped, not kept alongside the new one
        assert_eq!(app.sessions.len().await, 1);

        let response = send(
            &app.router,
            request(Method::GET, "/account/view", Some(&anonymous)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = send(
            &app.router,
            request(Method::GET, "/account/view", Some(&authenticated)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains(EMAIL));
    }

    #[tokio::test]
    async fn test_logout() {
        let app = TestApp::new();
        let cookie = login(&app).await;

        let response = send(
            &app.router,
            request(Method::POST, "/user/logout", Some(&cookie)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");
        let logged_out = session_cookie(&response).expect("session cookie");
        assert_ne!(cookie, logged_out);

        let response = send(&app.router, request(Method::GET, "/", Some(&logged_out))).await;
        let body = body_string(response).await;
        assert!(body.contains("logged out successfully!"));
        assert!(body.contains(r#"href="/user/login""#));
        assert!(!body.contains(r#"action="/user/logout""#));

        let response = send(
            &app.router,
            request(Method::GET, "/snippet/create", Some(&cookie)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn test_logout_requires_login() {
        let app = TestApp::new();
        let response = send(&app.router, request(Method::POST, "/user/logout", None)).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/user/login");
    }
}
