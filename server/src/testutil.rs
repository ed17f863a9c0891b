use std::{collections::HashMap, path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use tokio::sync::Mutex;
use tower::ServiceExt;
use tower_cookies::Key;
use uuid::Uuid;

use crate::{
    pages::TemplateCache,
    routes::app,
    sessions::{
        models::{SessionData, SessionRecord},
        store::SessionStore,
        SessionError, SessionManager, SESSION_COOKIE_NAME,
    },
    snippets::{models::Snippet, SnippetModel, SnippetsError},
    users::{models::User, UserModel, UsersError},
    AppState, InnerAppState,
};

pub const EMAIL: &str = "alice@example.com";
pub const PASSWORD: &str = "pa$$word";
pub const DUPLICATE_EMAIL: &str = "dupe@example.com";

fn timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 17, 10, 15, 0).unwrap()
}

#[derive(Clone, Default)]
pub struct MockSnippetModel {
    inserted: Arc<Mutex<usize>>,
}

impl MockSnippetModel {
    pub async fn inserted(&self) -> usize {
        *self.inserted.lock().await
    }

    fn snippet() -> Snippet {
        Snippet {
            id: 1,
            title: "An old silent pond".into(),
            content: "An old silent pond...".into(),
            created: timestamp(),
            expires: timestamp() + chrono::Duration::days(365),
        }
    }
}

#[async_trait]
impl SnippetModel for MockSnippetModel {
    async fn insert(&self, _title: &str, _content: &str, _expires: i32) -> Result<i64, SnippetsError> {
        *self.inserted.lock().await += 1;
        Ok(2)
    }

    async fn get(&self, id: i64) -> Result<Snippet, SnippetsError> {
        match id {
            1 => Ok(Self::snippet()),
            _ => Err(SnippetsError::NoRecord),
        }
    }

    async fn latest(&self) -> Result<Vec<Snippet>, SnippetsError> {
        Ok(vec![Self::snippet()])
    }
}

/// Snippet store whose database is unreachable.
pub struct FailingSnippetModel;

#[async_trait]
impl SnippetModel for FailingSnippetModel {
    async fn insert(&self, _title: &str, _content: &str, _expires: i32) -> Result<i64, SnippetsError> {
        Err(SnippetsError::Sqlx(sqlx::Error::PoolTimedOut))
    }

    async fn get(&self, _id: i64) -> Result<Snippet, SnippetsError> {
        Err(SnippetsError::Sqlx(sqlx::Error::PoolTimedOut))
    }

    async fn latest(&self) -> Result<Vec<Snippet>, SnippetsError> {
        Err(SnippetsError::Sqlx(sqlx::Error::PoolTimedOut))
    }
}

pub struct MockUserModel;

#[async_trait]
impl UserModel for MockUserModel {
    async fn insert(&self, _name: &str, email: &str, _password: &str) -> Result<(), UsersError> {
        match email {
            DUPLICATE_EMAIL => Err(UsersError::DuplicateEmail),
            _ => Ok(()),
        }
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<i64, UsersError> {
        if email == EMAIL && password == PASSWORD {
            return Ok(1);
        }
        Err(UsersError::InvalidCredentials)
    }

    async fn exists(&self, id: i64) -> Result<bool, UsersError> {
        Ok(id == 1)
    }

    async fn get(&self, id: i64) -> Result<User, UsersError> {
        match id {
            1 => Ok(User {
                id: 1,
                name: "Alice".into(),
                email: EMAIL.into(),
                created: timestamp(),
            }),
            _ => Err(UsersError::NoRecord),
        }
    }
}

#[derive(Clone, Default)]
pub struct MemorySessionStore {
    records: Arc<Mutex<HashMap<Uuid, (SessionData, DateTime<Utc>)>>>,
}

impl MemorySessionStore {
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn find(&self, token: Uuid) -> Result<Option<SessionRecord>, SessionError> {
        Ok(self
            .records
            .lock()
            .await
            .get(&token)
            .filter(|(_, expiry)| *expiry > Utc::now())
            .map(|(data, expiry)| SessionRecord {
                data: data.clone(),
                expiry: *expiry,
            }))
    }

    async fn commit(
        &self,
        token: Uuid,
        data: &SessionData,
        expiry: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        self.records
            .lock()
            .await
            .insert(token, (data.clone(), expiry));
        Ok(())
    }

    async fn delete(&self, token: Uuid) -> Result<(), SessionError> {
        self.records.lock().await.remove(&token);
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub snippets: MockSnippetModel,
    pub sessions: MemorySessionStore,
}

impl TestApp {
    pub fn new() -> Self {
        let snippets = MockSnippetModel::default();
        let sessions = MemorySessionStore::default();

        Self {
            router: router(Box::new(snippets.clone()), sessions.clone()),
            snippets,
            sessions,
        }
    }
}

/// The app with a snippet store that fails every call.
pub fn failing_router() -> Router {
    router(Box::new(FailingSnippetModel), MemorySessionStore::default())
}

fn router(snippets: Box<dyn SnippetModel>, sessions: MemorySessionStore) -> Router {
    app(AppState::new(InnerAppState {
        snippets,
        users: Box::new(MockUserModel),
        sessions: SessionManager::new(
            Box::new(sessions),
            chrono::Duration::hours(12),
            Key::generate(),
        ),
        templates: TemplateCache::new().unwrap(),
        static_dir: PathBuf::from("ui/static"),
        read_timeout: Duration::from_secs(5),
        request_timeout: Duration::from_secs(10),
    }))
}

pub fn request(method: Method, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn form_request(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn body_string(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// The `name=value` pair of the session cookie set by `response`, ready to be
/// sent back in a `Cookie` header.
pub fn session_cookie(response: &Response) -> Option<String> {
    let prefix = format!("{SESSION_COOKIE_NAME}=");
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(&prefix))
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}

/// Logs in as the known user and returns the session cookie.
pub async fn login(app: &TestApp) -> String {
    let body = format!(
        "email={}&password={}",
        EMAIL.replace('@', "%40"),
        PASSWORD.replace('$', "%24")
    );
    let response = send(&app.router, form_request("/user/login", &body, None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    session_cookie(&response).expect("login sets a session cookie")
}
