//! Conference endpoints.
//!
//! - `POST /api/conferences` - create a conference (caller becomes organizer)
//! - `POST /api/conferences/query` - filtered catalog query
//! - `GET /api/conferences/created` - conferences the caller organizes
//! - `GET /api/conferences/attending` - conferences the caller is registered for
//! - `GET /api/conferences/:key` - one conference
//! - `PUT /api/conferences/:key` - update (organizer only)
//! - `POST /api/conferences/:key/registration` - take a seat
//! - `DELETE /api/conferences/:key/registration` - give a seat back

use crate::error::AppError;
use crate::extractors::AuthenticatedCaller;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use conference_core::filter::FilterClause;
use conference_core::model::{Conference, ConferenceForm};
use serde::{Deserialize, Serialize};

/// Body of a catalog query.
#[derive(Debug, Default, Deserialize)]
pub struct ConferenceQueryRequest {
    /// Clauses, ANDed together. Empty lists every conference.
    #[serde(default)]
    pub filters: Vec<FilterClause>,
}

/// Outcome of a registration change.
#[derive(Debug, Serialize, Deserialize)]
pub struct BooleanResponse {
    /// Whether the change was applied.
    pub data: bool,
}

/// Create a conference.
///
/// ```bash
/// curl -X POST -H 'X-User-Id: u-1' -H 'X-User-Email: ada@example.com' \
///   -H 'Content-Type: application/json' \
///   -d '{"name":"RustConf","city":"Portland","maxAttendees":500,"startDate":"2026-09-10"}' \
///   http://localhost:8080/api/conferences
/// ```
pub async fn create_conference(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(form): Json<ConferenceForm>,
) -> Result<(StatusCode, Json<Conference>), AppError> {
    let conference = state.service.create_conference(&caller, form).await?;
    Ok((StatusCode::CREATED, Json(conference)))
}

/// Query conferences with filters.
///
/// ```bash
/// curl -X POST -H 'Content-Type: application/json' \
///   -d '{"filters":[{"field":"CITY","operator":"EQ","value":"London"}]}' \
///   http://localhost:8080/api/conferences/query
/// ```
pub async fn query_conferences(
    State(state): State<AppState>,
    Json(request): Json<ConferenceQueryRequest>,
) -> Result<Json<Vec<Conference>>, AppError> {
    Ok(Json(state.service.query_conferences(&request.filters).await?))
}

/// Conferences created by the caller.
pub async fn conferences_created(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
) -> Result<Json<Vec<Conference>>, AppError> {
    Ok(Json(state.service.conferences_created(&caller).await?))
}

/// Conferences the caller is registered for.
pub async fn conferences_to_attend(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
) -> Result<Json<Vec<Conference>>, AppError> {
    Ok(Json(state.service.conferences_to_attend(&caller).await?))
}

/// Get one conference. Public.
pub async fn get_conference(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Conference>, AppError> {
    Ok(Json(state.service.get_conference(&key).await?))
}

/// Update a conference. Only the fields present in the body are applied.
pub async fn update_conference(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(key): Path<String>,
    Json(form): Json<ConferenceForm>,
) -> Result<Json<Conference>, AppError> {
    Ok(Json(state.service.update_conference(&caller, &key, form).await?))
}

/// Register the caller for a conference.
///
/// 409 when already registered or sold out.
pub async fn register(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(key): Path<String>,
) -> Result<Json<BooleanResponse>, AppError> {
    let data = state.service.register_for_conference(&caller, &key).await?;
    Ok(Json(BooleanResponse { data }))
}

/// Unregister the caller from a conference.
///
/// `{"data": false}` when the caller was not registered.
pub async fn unregister(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(key): Path<String>,
) -> Result<Json<BooleanResponse>, AppError> {
    let data = state.service.unregister_from_conference(&caller, &key).await?;
    Ok(Json(BooleanResponse { data }))
}
