//! Profile endpoints.
//!
//! - `GET /api/profile` - the caller's profile, created on first access
//! - `POST /api/profile` - update display name and tee-shirt size

use crate::error::AppError;
use crate::extractors::AuthenticatedCaller;
use crate::state::AppState;
use axum::{Json, extract::State};
use conference_core::model::{Profile, ProfileForm};

/// Get the caller's profile.
///
/// ```bash
/// curl -H 'X-User-Id: u-1' http://localhost:8080/api/profile
/// ```
pub async fn get_profile(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(state.service.get_profile(&caller).await?))
}

/// Update the caller's profile. Absent or empty fields are left unchanged.
///
/// ```bash
/// curl -X POST -H 'X-User-Id: u-1' -H 'Content-Type: application/json' \
///   -d '{"displayName":"Ada","teeShirtSize":"M_W"}' http://localhost:8080/api/profile
/// ```
pub async fn save_profile(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(form): Json<ProfileForm>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(state.service.save_profile(&caller, form).await?))
}
