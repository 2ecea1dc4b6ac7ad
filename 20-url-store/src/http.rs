//! HTTP front end: an add form and key redirects.

use std::sync::Arc;

use axum::{
    Form, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::store::Store;

const ADD_FORM: &str = r#"
<form method="POST" action="/add">
URL: <input type="text" name="url">
<input type="submit" value="Add">
</form>
"#;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    /// Host and port placed in the links returned by `POST /add`.
    pub hostname: String,
}

#[derive(Debug, Deserialize)]
pub struct AddForm {
    #[serde(default)]
    pub url: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/add", get(add_form).post(add))
        .route("/:key", get(redirect))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn add_form() -> Html<&'static str> {
    Html(ADD_FORM)
}

async fn add(State(state): State<AppState>, Form(form): Form<AddForm>) -> Response {
    match state.store.put(form.url).await {
        Ok(key) => format!("http://{}/{}", state.hostname, key).into_response(),
        Err(err) => {
            warn!(error = %err, "failed to add url");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

async fn redirect(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    match state.store.get(&key).await {
        Ok(url) => (StatusCode::FOUND, [(header::LOCATION, url)]).into_response(),
        Err(err) => {
            debug!(%key, error = %err, "redirect lookup failed");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}
