use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use tower::ServiceExt;
use url_store::{
    KeyValueStore,
    http::{AppState, router},
};

fn app(store: Arc<KeyValueStore>) -> Router {
    router(AppState {
        store,
        hostname: "short.test".to_string(),
    })
}

async fn body_string(response: axum::response::Response) -> Result<String> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

#[tokio::test]
async fn add_form_is_served() -> Result<()> {
    let response = app(Arc::new(KeyValueStore::in_memory()))
        .oneshot(Request::get("/add").body(Body::empty())?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/html"));
    assert!(body_string(response).await?.contains(r#"name="url""#));
    Ok(())
}

#[tokio::test]
async fn posting_a_url_returns_its_short_link() -> Result<()> {
    let store = Arc::new(KeyValueStore::in_memory());
    let response = app(store.clone())
        .oneshot(
            Request::post("/add")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("url=http%3A%2F%2Fexample.com%2Fa%3Fb%3Dc"))?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await?, "http://short.test/0");
    assert_eq!(store.get("0")?, "http://example.com/a?b=c");
    Ok(())
}

#[tokio::test]
async fn known_keys_redirect() -> Result<()> {
    let store = Arc::new(KeyValueStore::in_memory());
    store.set("x1", "http://example.com/")?;

    let response = app(store)
        .oneshot(Request::get("/x1").body(Body::empty())?)
        .await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(header::LOCATION).map(|v| v.as_bytes()),
        Some(&b"http://example.com/"[..])
    );
    Ok(())
}

#[tokio::test]
async fn unknown_keys_are_not_found() -> Result<()> {
    let response = app(Arc::new(KeyValueStore::in_memory()))
        .oneshot(Request::get("/missing").body(Body::empty())?)
        .await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}
