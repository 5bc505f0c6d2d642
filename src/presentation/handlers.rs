// HTTP request handlers

use crate::application::user_service::{NewUser, UserError, UserUpdate};
use crate::domain::settings::UserSettings;
use crate::domain::threshold::{TagThreshold, ThresholdPatch};
use crate::infrastructure::control_feed;
use crate::infrastructure::live_feed::FeedState;
use crate::infrastructure::store::{get_value, keys, set_value};
use crate::presentation::app_state::AppState;
use crate::presentation::auth::{bearer_token, Session};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<Session, Response> {
    let token = bearer_token(headers)
        .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "Unauthorized"))?;
    state
        .sessions
        .authorize(token)
        .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "Unauthorized"))
}

fn authorize_admin(state: &AppState, headers: &HeaderMap) -> Result<Session, Response> {
    let session = authorize(state, headers)?;
    if !session.role.is_admin() {
        return Err(error_response(StatusCode::FORBIDDEN, "Forbidden"));
    }
    Ok(session)
}

fn user_error_response(err: UserError) -> Response {
    match &err {
        UserError::MissingFields => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
        UserError::Duplicate(_) => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
        UserError::NotFound => error_response(StatusCode::NOT_FOUND, &err.to_string()),
        UserError::InvalidCredentials | UserError::Inactive => {
            error_response(StatusCode::UNAUTHORIZED, &err.to_string())
        }
        UserError::Internal(e) => {
            tracing::error!("user service error: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: crate::domain::user::UserView,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Response {
    match state
        .users
        .authenticate(&request.username, &request.password)
        .await
    {
        Ok(user) => {
            let token = state.sessions.create(&user);
            Json(LoginResponse { token, user }).into_response()
        }
        Err(e) => user_error_response(e),
    }
}

pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(token) = bearer_token(&headers) {
        state.sessions.revoke(token);
    }
    Json(json!({ "message": "Logged out" })).into_response()
}

/// Current dashboard state: latest classified frame, active alerts,
/// summary counts and feed connectivity.
pub async fn dashboard(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }
    let snapshot = state.pipeline().snapshot();
    let connected = *state.feed_state.borrow() == FeedState::Connected;
    Json(json!({
        "connected": connected,
        "lastUpdate": snapshot.last_update,
        "frame": snapshot.frame,
        "alerts": snapshot.alerts,
        "summary": snapshot.summary,
    }))
    .into_response()
}

/// Rolling chart window (live frames, or the backfilled dataset).
pub async fn dashboard_history(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }
    Json(state.pipeline().chart_window()).into_response()
}

pub async fn get_thresholds(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }
    Json(state.pipeline().thresholds().to_vec()).into_response()
}

/// Wholesale threshold replacement: persist locally, then forward the
/// min/max pairs to the gateway best-effort.
pub async fn put_thresholds(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(entries): Json<Vec<TagThreshold>>,
) -> Response {
    if let Err(response) = authorize_admin(&state, &headers) {
        return response;
    }

    let status = state
        .pipeline()
        .replace_thresholds(entries.clone(), state.store.as_ref());

    let payload: HashMap<String, ThresholdPatch> = entries
        .iter()
        .map(|t| (t.tag.clone(), ThresholdPatch { min: t.min, max: t.max }))
        .collect();
    let control_url = state.control_url.clone();
    tokio::spawn(async move {
        if let Err(e) = control_feed::push_thresholds(&control_url, payload).await {
            tracing::warn!("threshold push to gateway failed: {e}");
        }
    });

    Json(json!({
        "message": "Thresholds updated",
        "persisted": status.is_persisted(),
    }))
    .into_response()
}

pub async fn get_settings(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }
    let store = state.store.as_ref();
    let defaults = UserSettings::default();
    let settings = UserSettings {
        dark_mode: get_value(store, keys::DARK_MODE).unwrap_or(defaults.dark_mode),
        language: get_value(store, keys::LANGUAGE).unwrap_or(defaults.language),
        dashboard: get_value(store, keys::DASHBOARD_CONFIG).unwrap_or(defaults.dashboard),
    };
    Json(settings).into_response()
}

/// Persist the preference bundle. Each part lands under its own key; a
/// partial failure leaves the others written (no cross-key atomicity).
pub async fn put_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(settings): Json<UserSettings>,
) -> Response {
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }
    let store = state.store.as_ref();
    let persisted = set_value(store, keys::DARK_MODE, &settings.dark_mode).is_persisted()
        & set_value(store, keys::LANGUAGE, &settings.language).is_persisted()
        & set_value(store, keys::DASHBOARD_CONFIG, &settings.dashboard).is_persisted();
    Json(json!({ "message": "Settings saved", "persisted": persisted })).into_response()
}

pub async fn get_alert_history(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }
    Json(state.pipeline().alert_history().to_vec()).into_response()
}

pub async fn clear_alert_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let session = match authorize(&state, &headers) {
        Ok(session) => session,
        Err(response) => return response,
    };
    let status = state.pipeline().clear_alert_history(state.store.as_ref());
    tracing::info!("alert history cleared by {}", session.username);
    Json(json!({
        "message": "Alert history cleared",
        "persisted": status.is_persisted(),
    }))
    .into_response()
}

/// List all users (admin only)
pub async fn list_users(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(response) = authorize_admin(&state, &headers) {
        return response;
    }
    match state.users.list_users().await {
        Ok(users) => Json(users).into_response(),
        Err(e) => user_error_response(e),
    }
}

/// Create new user (admin only)
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(new_user): Json<NewUser>,
) -> Response {
    if let Err(response) = authorize_admin(&state, &headers) {
        return response;
    }
    match state.users.create_user(new_user).await {
        Ok(user) => Json(json!({ "message": "User created successfully", "user": user }))
            .into_response(),
        Err(e) => user_error_response(e),
    }
}

/// Update user (admin only)
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(update): Json<UserUpdate>,
) -> Response {
    if let Err(response) = authorize_admin(&state, &headers) {
        return response;
    }
    match state.users.update_user(update).await {
        Ok(()) => Json(json!({ "message": "User updated successfully" })).into_response(),
        Err(e) => user_error_response(e),
    }
}

#[derive(Deserialize)]
pub struct DeleteUserRequest {
    pub id: i64,
}

/// Delete user (admin only)
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<DeleteUserRequest>,
) -> Response {
    let session = match authorize_admin(&state, &headers) {
        Ok(session) => session,
        Err(response) => return response,
    };
    if session.user_id == request.id {
        return error_response(StatusCode::BAD_REQUEST, "You cannot delete your own account");
    }
    match state.users.delete_user(request.id).await {
        Ok(()) => Json(json!({ "message": "User deleted successfully" })).into_response(),
        Err(e) => user_error_response(e),
    }
}
