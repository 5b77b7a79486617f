//! Router configuration.

use crate::handlers::{announcements, conferences, health_check, profile, readiness_check, sessions};
use crate::middleware::correlation_id_layer;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// Health checks sit at the root; every other endpoint is nested under
/// `/api`. All requests pass through the correlation ID and trace layers.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Profiles
        .route("/profile", get(profile::get_profile).post(profile::save_profile))
        // Conferences
        .route("/conferences", post(conferences::create_conference))
        .route("/conferences/query", post(conferences::query_conferences))
        .route("/conferences/created", get(conferences::conferences_created))
        .route("/conferences/attending", get(conferences::conferences_to_attend))
        .route(
            "/conferences/:key",
            get(conferences::get_conference).put(conferences::update_conference),
        )
        .route(
            "/conferences/:key/registration",
            post(conferences::register).delete(conferences::unregister),
        )
        // Sessions
        .route(
            "/conferences/:key/sessions",
            get(sessions::conference_sessions).post(sessions::create_session),
        )
        .route(
            "/conferences/:key/sessions/type/:type",
            get(sessions::conference_sessions_by_type),
        )
        .route("/sessions/speaker/:speaker", get(sessions::sessions_by_speaker))
        .route("/sessions/duration/:minutes", get(sessions::sessions_by_duration))
        .route("/sessions/time/:time", get(sessions::sessions_by_start_time))
        .route("/sessions/wishlist", get(sessions::wishlist))
        .route(
            "/sessions/:key/wishlist",
            post(sessions::add_to_wishlist).delete(sessions::remove_from_wishlist),
        )
        // Derived state
        .route("/announcement", get(announcements::get_announcement))
        .route("/featured-speaker", get(announcements::get_featured_speaker));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}
