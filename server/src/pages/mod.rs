use std::collections::HashMap;

use askama::Template;
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    RequestPartsExt,
};
use chrono::{Datelike, Utc};

use crate::{
    auth::IsAuthenticated,
    sessions::{Session, SessionError, FLASH_KEY},
    snippets::models::{Snippet, SnippetCreateForm},
    users::models::{User, UserLoginForm, UserSignupForm},
    validator::Validator,
};

mod filters {
    use chrono::{DateTime, Utc};

    pub fn human_date(t: &DateTime<Utc>) -> ::askama::Result<String> {
        Ok(t.format("%d %b %Y at %H:%M").to_string())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PagesError {
    #[error("the template {0} does not exist")]
    MissingTemplate(String),

    #[error("the template {0} was registered twice")]
    DuplicateTemplate(&'static str),

    #[error("the template {0} cannot show this form")]
    UnexpectedForm(&'static str),

    #[error("the template {0} needs data that was not provided")]
    MissingData(&'static str),

    #[error(transparent)]
    Askama(#[from] askama::Error),
}

/// The form a page shows, with whatever the user submitted last.
#[derive(Debug, Default, Clone)]
pub enum PageForm {
    #[default]
    None,
    SnippetCreate(SnippetCreateForm),
    Signup(UserSignupForm),
    Login(UserLoginForm),
}

/// Everything a page can show. Built per request by its extractor; the
/// pending flash message is taken from the session only once a page is
/// rendered by [`TemplateCache::respond`].
#[derive(Default)]
pub struct TemplateData {
    pub current_year: i32,
    pub flash: Option<String>,
    session: Option<Session>,
    pub is_authenticated: bool,
    pub snippet: Option<Snippet>,
    pub snippets: Vec<Snippet>,
    pub user: Option<User>,
    pub form: PageForm,
    pub errors: Validator,
}

#[async_trait]
impl<S> FromRequestParts<S> for TemplateData
where
    S: Send + Sync,
{
    type Rejection = SessionError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let session = parts.extract::<Session>().await?;
        let IsAuthenticated(is_authenticated) = parts
            .extensions
            .get::<IsAuthenticated>()
            .copied()
            .unwrap_or_default();

        Ok(TemplateData {
            current_year: Utc::now().year(),
            session: Some(session),
            is_authenticated,
            ..Default::default()
        })
    }
}

#[derive(Template)]
#[template(path = "pages/home.html")]
struct HomePage<'a> {
    data: &'a TemplateData,
}

#[derive(Template)]
#[template(path = "pages/view.html")]
struct ViewPage<'a> {
    data: &'a TemplateData,
    snippet: &'a Snippet,
}

#[derive(Template)]
#[template(path = "pages/create.html")]
struct CreatePage<'a> {
    data: &'a TemplateData,
    form: &'a SnippetCreateForm,
}

#[derive(Template)]
#[template(path = "pages/signup.html")]
struct SignupPage<'a> {
    data: &'a TemplateData,
    form: &'a UserSignupForm,
}

#[derive(Template)]
#[template(path = "pages/login.html")]
struct LoginPage<'a> {
    data: &'a TemplateData,
    form: &'a UserLoginForm,
}

#[derive(Template)]
#[template(path = "pages/account.html")]
struct AccountPage<'a> {
    data: &'a TemplateData,
    user: &'a User,
}

type RenderFn = fn(&TemplateData) -> Result<String, PagesError>;

fn render_home(data: &TemplateData) -> Result<String, PagesError> {
    Ok(HomePage { data }.render()?)
}

fn render_view(data: &TemplateData) -> Result<String, PagesError> {
    let snippet = data
        .snippet
        .as_ref()
        .ok_or(PagesError::MissingData("view.html"))?;
    Ok(ViewPage { data, snippet }.render()?)
}

fn render_create(data: &TemplateData) -> Result<String, PagesError> {
    let PageForm::SnippetCreate(form) = &data.form else {
        return Err(PagesError::UnexpectedForm("create.html"));
    };
    Ok(CreatePage { data, form }.render()?)
}

fn render_signup(data: &TemplateData) -> Result<String, PagesError> {
    let PageForm::Signup(form) = &data.form else {
        return Err(PagesError::UnexpectedForm("signup.html"));
    };
    Ok(SignupPage { data, form }.render()?)
}

fn render_login(data: &TemplateData) -> Result<String, PagesError> {
    let PageForm::Login(form) = &data.form else {
        return Err(PagesError::UnexpectedForm("login.html"));
    };
    Ok(LoginPage { data, form }.render()?)
}

fn render_account(data: &TemplateData) -> Result<String, PagesError> {
    let user = data
        .user
        .as_ref()
        .ok_or(PagesError::MissingData("account.html"))?;
    Ok(AccountPage { data, user }.render()?)
}

const PAGES: [(&str, RenderFn); 6] = [
    ("home.html", render_home),
    ("view.html", render_view),
    ("create.html", render_create),
    ("signup.html", render_signup),
    ("login.html", render_login),
    ("account.html", render_account),
];

/// Page name to renderer table, built once at startup.
///
/// Template sources are parsed and type checked when the crate is compiled,
/// so building the table only has to make sure every page is registered once.
pub struct TemplateCache {
    pages: HashMap<&'static str, RenderFn>,
}

impl TemplateCache {
    pub fn new() -> Result<Self, PagesError> {
        Self::from_pages(&PAGES)
    }

    fn from_pages(pages: &[(&'static str, RenderFn)]) -> Result<Self, PagesError> {
        let mut cache = HashMap::with_capacity(pages.len());

        for (name, render) in pages {
            if cache.insert(*name, *render).is_some() {
                return Err(PagesError::DuplicateTemplate(*name));
            }
        }

        Ok(Self { pages: cache })
    }

    pub fn names(&self) -> impl Iterator<Item = &&'static str> {
        self.pages.keys()
    }

    /// Renders `page` into a buffer and only then turns it into a response, so
    /// a failing template never sends a partial body.
    pub fn render(
        &self,
        status: StatusCode,
        page: &str,
        data: &TemplateData,
    ) -> Result<Response, PagesError> {
        let render = self
            .pages
            .get(page)
            .ok_or_else(|| PagesError::MissingTemplate(page.to_string()))?;

        let body = render(data)?;

        Ok((status, Html(body)).into_response())
    }

    /// Renders `page` for the current request, showing and consuming the
    /// session's flash message.
    pub async fn respond(
        &self,
        status: StatusCode,
        page: &str,
        mut data: TemplateData,
    ) -> Result<Response, PagesError> {
        if let Some(session) = &data.session {
            if data.flash.is_none() {
                data.flash = session.pop::<String>(FLASH_KEY).await;
            }
        }

        self.render(status, page, &data)
    }
}
