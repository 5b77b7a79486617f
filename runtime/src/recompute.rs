//! Derived-state recomputation.
//!
//! Two cached values are rebuilt from the entity store by background jobs:
//!
//! - the announcement listing conferences that are nearly sold out
//!   (`0 < seatsAvailable <= 5`), recomputed from scratch on a schedule;
//! - the featured speaker, set when a speaker has more than one session in a
//!   conference.
//!
//! Both are snapshot recomputations, so running one twice, or concurrently
//! with registrations, converges on the same result.

use crate::metrics;
use crate::service::ConferenceService;
use conference_core::cache::{ANNOUNCEMENT_KEY, Cache, FEATURED_SPEAKER_KEY, get_json, set_json};
use conference_core::error::Result;
use conference_core::filter::{ConferenceField, ConferenceQuery, FilterValue, Operator, Predicate};
use conference_core::key::EntityKey;
use conference_core::model::FeaturedSpeaker;
use conference_core::store::{EntityStore, SessionQuery};
use tracing::{debug, info};

/// Conferences with at most this many seats left are announced.
pub const NEARLY_SOLD_OUT_SEATS: i64 = 5;

const ANNOUNCEMENT_PREFIX: &str =
    "Last chance to attend! The following conferences are nearly sold out: ";

fn nearly_sold_out() -> Result<ConferenceQuery> {
    let seats = |op, bound| Predicate {
        field: ConferenceField::SeatsAvailable,
        op,
        value: FilterValue::Int(bound),
    };
    Ok(ConferenceQuery::all()
        .and(seats(Operator::Gt, 0))?
        .and(seats(Operator::Le, NEARLY_SOLD_OUT_SEATS))?)
}

/// Rebuild the announcement. Stores it and returns it when some conference
/// is nearly sold out; otherwise removes the cache entry and returns `None`.
///
/// # Errors
///
/// Returns `Internal` if the store or cache fails.
pub async fn refresh_announcement(store: &dyn EntityStore, cache: &dyn Cache) -> Result<Option<String>> {
    let conferences = store.query_conferences(nearly_sold_out()?).await?;
    metrics::record_announcement_refresh();

    if conferences.is_empty() {
        cache.delete(ANNOUNCEMENT_KEY).await?;
        debug!("No conferences nearly sold out, announcement cleared");
        return Ok(None);
    }

    let names: Vec<&str> = conferences.iter().map(|c| c.name.as_str()).collect();
    let announcement = format!("{ANNOUNCEMENT_PREFIX}{}", names.join(", "));
    set_json(cache, ANNOUNCEMENT_KEY, &announcement).await?;
    info!(count = conferences.len(), "Announcement refreshed");
    Ok(Some(announcement))
}

/// Feature `speaker` if they have more than one session in `conference_key`.
/// Overwrites any previous featured speaker; otherwise leaves the cache alone.
///
/// # Errors
///
/// Returns `Internal` if the store or cache fails.
pub async fn set_featured_speaker(
    store: &dyn EntityStore,
    cache: &dyn Cache,
    conference_key: &EntityKey,
    speaker: &str,
) -> Result<Option<FeaturedSpeaker>> {
    let query = SessionQuery::new()
        .in_conference(conference_key.clone())
        .by_speaker(speaker);
    let sessions = store.query_sessions(query).await?;

    if sessions.len() <= 1 {
        debug!(speaker, sessions = sessions.len(), "Speaker not featured");
        return Ok(None);
    }

    let featured = FeaturedSpeaker {
        conference_key: conference_key.clone(),
        speaker: speaker.to_string(),
        session_names: sessions.into_iter().map(|s| s.name).collect(),
    };
    set_json(cache, FEATURED_SPEAKER_KEY, &featured).await?;
    metrics::record_featured_speaker_update();
    info!(speaker, conference = %conference_key, "Featured speaker updated");
    Ok(Some(featured))
}

impl ConferenceService {
    /// The current announcement, if any.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the cache fails.
    pub async fn get_announcement(&self) -> Result<Option<String>> {
        Ok(get_json(self.cache.as_ref(), ANNOUNCEMENT_KEY).await?)
    }

    /// The current featured speaker, if any.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the cache fails.
    pub async fn get_featured_speaker(&self) -> Result<Option<FeaturedSpeaker>> {
        Ok(get_json(self.cache.as_ref(), FEATURED_SPEAKER_KEY).await?)
    }
}
