use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::json;
use tracing::instrument;

use crate::state::AppState;

use super::dto::{ApprovedMailRequest, NewUserMailRequest, PurchaseMailRequest};
use super::service::dispatch;
use super::templates;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/mails/userapproved", post(user_approved))
        .route("/mails/newuser", post(new_user))
        .route("/mails/buy", post(buy))
}

// Each endpoint queues the send and answers immediately; delivery failures
// are logged by the dispatcher and never surface here.

#[instrument(skip(state, payload))]
pub async fn user_approved(
    State(state): State<AppState>,
    Json(payload): Json<ApprovedMailRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let _ = dispatch(
        state.mailer.clone(),
        payload.email,
        templates::APPROVAL_SUBJECT,
        templates::approval_notice(&payload.full_name),
    );
    (StatusCode::ACCEPTED, Json(json!({ "message": "queued" })))
}

#[instrument(skip(state, payload))]
pub async fn new_user(
    State(state): State<AppState>,
    Json(payload): Json<NewUserMailRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let html = templates::signup_alert(
        &payload.full_name,
        &payload.email,
        &payload.phone_number,
        &payload.college_id,
        &payload.department,
    );
    let _ = dispatch(
        state.mailer.clone(),
        payload.email,
        templates::SIGNUP_SUBJECT,
        html,
    );
    (StatusCode::ACCEPTED, Json(json!({ "message": "queued" })))
}

#[instrument(skip(state, payload))]
pub async fn buy(
    State(state): State<AppState>,
    Json(payload): Json<PurchaseMailRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let html = templates::purchase_alert(
        &payload.full_name,
        &payload.seller_email,
        &payload.phone_number,
    );
    let _ = dispatch(
        state.mailer.clone(),
        payload.email,
        templates::PURCHASE_SUBJECT,
        html,
    );
    (StatusCode::ACCEPTED, Json(json!({ "message": "queued" })))
}
