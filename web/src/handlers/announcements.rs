//! Derived-state reads.
//!
//! - `GET /api/announcement` - nearly-sold-out announcement, `""` when none
//! - `GET /api/featured-speaker` - featured speaker, `null` when none

use crate::error::AppError;
use crate::state::AppState;
use axum::{Json, extract::State};
use conference_core::model::FeaturedSpeaker;
use serde::{Deserialize, Serialize};

/// A single string value.
#[derive(Debug, Serialize, Deserialize)]
pub struct StringResponse {
    /// The value.
    pub data: String,
}

/// The current announcement.
pub async fn get_announcement(State(state): State<AppState>) -> Result<Json<StringResponse>, AppError> {
    let data = state.service.get_announcement().await?.unwrap_or_default();
    Ok(Json(StringResponse { data }))
}

/// The current featured speaker.
pub async fn get_featured_speaker(
    State(state): State<AppState>,
) -> Result<Json<Option<FeaturedSpeaker>>, AppError> {
    Ok(Json(state.service.get_featured_speaker().await?))
}
