//! Request handlers.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use tracing::debug;

use super::pages::{self, FormPage, Notice};
use super::{AppError, AppState};
use crate::codes::CODE_EXTENSION;
use crate::error::{Error, Result};
use crate::inventory::{Inventory, ScanOutcome};
use crate::item::{is_valid_id, ItemForm};

type HandlerResult<T = Response> = std::result::Result<T, AppError>;

/// Run an inventory operation on the blocking thread pool.
async fn blocking<T, F>(state: &AppState, op: F) -> Result<T>
where
    F: FnOnce(&Inventory) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let inventory = state.inventory.clone();
    tokio::task::spawn_blocking(move || op(&inventory))
        .await
        .map_err(|err| Error::internal(format!("inventory task failed: {err}")))?
}

fn host(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::HOST).and_then(|value| value.to_str().ok())
}

fn invalid_form(item_id: Option<&str>, form: &ItemForm, message: &str) -> Response {
    let page = pages::form(&FormPage {
        item_id,
        title: form.title.as_deref().unwrap_or_default(),
        description: form.description.as_deref().unwrap_or_default(),
        error: Some(message),
    });
    (StatusCode::UNPROCESSABLE_ENTITY, Html(page)).into_response()
}

pub(super) async fn index(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> HandlerResult<Html<String>> {
    let notice = params.get("notice").and_then(|value| Notice::parse(value));
    let items = blocking(&state, Inventory::list).await?;
    Ok(Html(pages::index(&items, notice)))
}

pub(super) async fn create_form() -> Html<String> {
    Html(pages::form(&FormPage::default()))
}

pub(super) async fn create_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<ItemForm>,
) -> HandlerResult {
    let base_url = state.base_url(host(&headers));
    let submitted = form.clone();
    match blocking(&state, move |inventory| inventory.create(&submitted, &base_url)).await {
        Ok(_) => Ok(Redirect::to(&Notice::Created.location()).into_response()),
        Err(err) if err.is_validation() => Ok(invalid_form(None, &form, &err.to_string())),
        Err(err) => Err(err.into()),
    }
}

pub(super) async fn edit_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HandlerResult {
    let Some(item) = blocking(&state, move |inventory| inventory.get(&id)).await? else {
        return Ok(Redirect::to(&Notice::NotFound.location()).into_response());
    };
    let page = pages::form(&FormPage {
        item_id: Some(&item.id),
        title: &item.title,
        description: &item.description,
        error: None,
    });
    Ok(Html(page).into_response())
}

pub(super) async fn edit_submit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<ItemForm>,
) -> HandlerResult {
    let (target, submitted) = (id.clone(), form.clone());
    match blocking(&state, move |inventory| inventory.update(&target, &submitted)).await {
        Ok(Some(_)) => Ok(Redirect::to(&Notice::Updated.location()).into_response()),
        Ok(None) => Ok(Redirect::to(&Notice::NotFound.location()).into_response()),
        Err(err) if err.is_validation() => Ok(invalid_form(Some(&id), &form, &err.to_string())),
        Err(err) => Err(err.into()),
    }
}

pub(super) async fn scan_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> HandlerResult {
    let token = params.get("token").cloned();
    let outcome = blocking(&state, move |inventory| {
        inventory.scan_delete(&id, token.as_deref())
    })
    .await?;
    let response = match outcome {
        ScanOutcome::Deleted(item) => Html(pages::scan_deleted(&item)).into_response(),
        ScanOutcome::AlreadyGone => Html(pages::scan_already_gone()).into_response(),
        ScanOutcome::Rejected(_) => {
            (StatusCode::FORBIDDEN, Html(pages::scan_rejected())).into_response()
        }
    };
    Ok(response)
}

pub(super) async fn manual_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HandlerResult<Redirect> {
    let notice = match blocking(&state, move |inventory| inventory.delete(&id)).await? {
        Some(_) => Notice::Deleted,
        None => Notice::NotFound,
    };
    Ok(Redirect::to(&notice.location()))
}

pub(super) async fn code_image(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> HandlerResult {
    let id = file
        .strip_suffix(CODE_EXTENSION)
        .and_then(|stem| stem.strip_suffix('.'))
        .filter(|id| is_valid_id(id));
    let Some(id) = id else {
        debug!("Rejected code image request for {:?}", file);
        return Ok(StatusCode::NOT_FOUND.into_response());
    };

    let path = state.inventory.codes().path_for(id)?;
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, "image/png")], bytes).into_response()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Ok(StatusCode::NOT_FOUND.into_response())
        }
        Err(err) => Err(Error::from(err).into()),
    }
}

pub(super) async fn healthz() -> &'static str {
    "ok"
}
