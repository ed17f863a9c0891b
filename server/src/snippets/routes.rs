use std::sync::Arc;

use axum::{
    extract::{rejection::FormRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};

use crate::{
    pages::{PageForm, TemplateData},
    sessions::{Session, FLASH_KEY},
    AppError, InnerAppState,
};

use super::models::SnippetCreateForm;

pub async fn home(
    State(state): State<Arc<InnerAppState>>,
    mut data: TemplateData,
) -> Result<Response, AppError> {
    data.snippets = state.snippets.latest().await?;

    Ok(state.templates.respond(StatusCode::OK, "home.html", data).await?)
}

pub async fn snippet_view(
    State(state): State<Arc<InnerAppState>>,
    Path(id): Path<String>,
    mut data: TemplateData,
) -> Result<Response, AppError> {
    let id = match id.parse::<i64>() {
        Ok(id) if id >= 1 => id,
        _ => return Err(AppError::Client(StatusCode::NOT_FOUND)),
    };

    data.snippet = Some(state.snippets.get(id).await?);

    Ok(state.templates.respond(StatusCode::OK, "view.html", data).await?)
}

pub async fn snippet_create(
    State(state): State<Arc<InnerAppState>>,
    mut data: TemplateData,
) -> Result<Response, AppError> {
    data.form = PageForm::SnippetCreate(SnippetCreateForm::blank());

    Ok(state.templates.respond(StatusCode::OK, "create.html", data).await?)
}

pub async fn snippet_create_post(
    State(state): State<Arc<InnerAppState>>,
    session: Session,
    mut data: TemplateData,
    form: Result<Form<SnippetCreateForm>, FormRejection>,
) -> Result<Response, AppError> {
    let Form(form) = form.map_err(|e| {
        log::warn!("snippet-create: undecodable form: {e}");
        AppError::Client(StatusCode::BAD_REQUEST)
    })?;

    let errors = form.check();
    if !errors.valid() {
        data.form = PageForm::SnippetCreate(form);
        data.errors = errors;
        return Ok(state
            .templates
            .respond(StatusCode::UNPROCESSABLE_ENTITY, "create.html", data)
            .await?);
    }

    let id = state
        .snippets
        .insert(&form.title, &form.content, form.expires)
        .await?;

    session
        .put(FLASH_KEY, "Snippet successfully created!")
        .await?;

    Ok(Redirect::to(&format!("/snippet/view/{id}")).into_response())
}
