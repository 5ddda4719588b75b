//! Request handlers.
//!
//! JSON bodies are taken as raw bytes and parsed here so every parse failure
//! maps to the same `400 {"error": "Invalid JSON body"}` response.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;

use super::error::ApiError;
use super::{assets, AppState};
use crate::constants::{CA_CERT_FILENAME, STREAM_KEEP_ALIVE};
use crate::notifications::PushSubscription;
use crate::relay::Notification;

/// Body of `POST /send`. `null` is treated like an absent field.
#[derive(Debug, Default, Deserialize)]
struct SendRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl From<SendRequest> for Notification {
    fn from(req: SendRequest) -> Self {
        Notification::new(req.title.unwrap_or_default(), req.message.unwrap_or_default())
    }
}

pub(super) async fn index() -> Html<&'static str> {
    Html(assets::INDEX_HTML)
}

pub(super) async fn service_worker() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        assets::SERVICE_WORKER_JS,
    )
}

pub(super) async fn ca_cert(State(state): State<AppState>) -> Response {
    match state.ca_cert {
        Some(pem) => (
            [
                (header::CONTENT_TYPE, "application/x-x509-ca-cert".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{CA_CERT_FILENAME}\""),
                ),
            ],
            pem.to_string(),
        )
            .into_response(),
        None => not_found().await.into_response(),
    }
}

pub(super) async fn vapid_public_key(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "key": state.vapid_public_key.as_ref() }))
}

pub(super) async fn subscribe(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let subscription: PushSubscription = serde_json::from_slice(&body)?;

    state
        .relay
        .add_subscription(subscription)
        .await
        .map_err(|e| ApiError::internal(&e))?;

    Ok(Json(json!({ "ok": true })))
}

pub(super) async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let connection = state.relay.streams().connect();

    let greeting =
        stream::once(async { Ok::<_, Infallible>(Event::default().comment("connected")) });
    let frames = connection.map(|frame| Ok::<_, Infallible>(frame.to_sse_event()));

    Sse::new(greeting.chain(frames)).keep_alive(
        KeepAlive::new()
            .interval(STREAM_KEEP_ALIVE)
            .text("keep-alive"),
    )
}

pub(super) async fn send(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let request: SendRequest = serde_json::from_slice(&body)?;

    let summary = state
        .relay
        .submit(request.into())
        .await
        .map_err(|e| ApiError::internal(&e))?;

    Ok(Json(json!({ "ok": true, "sse": summary.sse, "push": summary.push })))
}

pub(super) async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/plain")],
        "Not Found",
    )
}
