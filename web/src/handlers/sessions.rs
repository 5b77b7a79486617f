//! Session endpoints.
//!
//! - `GET /api/conferences/:key/sessions` - sessions of a conference
//! - `POST /api/conferences/:key/sessions` - create a session (organizer only)
//! - `GET /api/conferences/:key/sessions/type/:type` - sessions of one type
//! - `GET /api/sessions/speaker/:speaker` - sessions by speaker, all conferences
//! - `GET /api/sessions/duration/:minutes` - sessions of one length
//! - `GET /api/sessions/time/:time` - sessions starting at `HH:MM`
//! - `GET /api/sessions/wishlist` - the caller's wishlist
//! - `POST /api/sessions/:key/wishlist` - add to wishlist
//! - `DELETE /api/sessions/:key/wishlist` - remove from wishlist

use crate::error::AppError;
use crate::extractors::AuthenticatedCaller;
use crate::handlers::conferences::BooleanResponse;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use conference_core::model::{Session, SessionForm};

/// Sessions of a conference.
pub async fn conference_sessions(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Vec<Session>>, AppError> {
    Ok(Json(state.service.conference_sessions(&key).await?))
}

/// Create a session in a conference.
///
/// ```bash
/// curl -X POST -H 'X-User-Id: u-1' -H 'Content-Type: application/json' \
///   -d '{"name":"Lifetimes","speaker":"Ada","duration":45,"startTime":"10:30"}' \
///   http://localhost:8080/api/conferences/$KEY/sessions
/// ```
pub async fn create_session(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(key): Path<String>,
    Json(form): Json<SessionForm>,
) -> Result<(StatusCode, Json<Session>), AppError> {
    let session = state.service.create_session(&caller, &key, form).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// Sessions of a conference with the given type.
pub async fn conference_sessions_by_type(
    State(state): State<AppState>,
    Path((key, type_of_session)): Path<(String, String)>,
) -> Result<Json<Vec<Session>>, AppError> {
    Ok(Json(
        state
            .service
            .conference_sessions_by_type(&key, &type_of_session)
            .await?,
    ))
}

/// Sessions given by a speaker.
pub async fn sessions_by_speaker(
    State(state): State<AppState>,
    Path(speaker): Path<String>,
) -> Result<Json<Vec<Session>>, AppError> {
    Ok(Json(state.service.sessions_by_speaker(&speaker).await?))
}

/// Sessions of an exact length in minutes.
pub async fn sessions_by_duration(
    State(state): State<AppState>,
    Path(minutes): Path<String>,
) -> Result<Json<Vec<Session>>, AppError> {
    let minutes: i32 = minutes
        .parse()
        .map_err(|_| AppError::bad_request(format!("Invalid duration: {minutes}")))?;
    Ok(Json(state.service.sessions_by_duration(minutes).await?))
}

/// Sessions starting at a time of day.
pub async fn sessions_by_start_time(
    State(state): State<AppState>,
    Path(start_time): Path<String>,
) -> Result<Json<Vec<Session>>, AppError> {
    Ok(Json(state.service.sessions_by_start_time(&start_time).await?))
}

/// The caller's wishlist.
pub async fn wishlist(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
) -> Result<Json<Vec<Session>>, AppError> {
    Ok(Json(state.service.sessions_in_wishlist(&caller).await?))
}

/// Add a session to the caller's wishlist.
///
/// 409 when already wished.
pub async fn add_to_wishlist(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(key): Path<String>,
) -> Result<Json<BooleanResponse>, AppError> {
    let data = state.service.add_session_to_wishlist(&caller, &key).await?;
    Ok(Json(BooleanResponse { data }))
}

/// Remove a session from the caller's wishlist.
pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(key): Path<String>,
) -> Result<Json<BooleanResponse>, AppError> {
    let data = state.service.remove_session_from_wishlist(&caller, &key).await?;
    Ok(Json(BooleanResponse { data }))
}
