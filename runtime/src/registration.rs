//! Registration engine: seat inventory and session wishlists.
//!
//! Registering moves one seat from a conference into a caller's attendance
//! set; unregistering moves it back. Both sides change in a single
//! transaction over the caller's profile and the conference, so the seat
//! count never drifts from the attendance sets under concurrent callers:
//!
//! ```text
//! seatsAvailable + |attendees| == seats at creation
//! ```
//!
//! Wishlist changes touch only the caller's profile.

use crate::metrics;
use crate::service::{ConferenceService, decode_key};
use conference_core::error::{ConferenceError, Result};
use conference_core::key::EntityKind;
use conference_core::model::{Caller, Session};
use tracing::{info, instrument, warn};

impl ConferenceService {
    /// Take one seat at a conference for the caller.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the conference does not exist
    /// - `Conflict` if the caller is already registered or no seats are left
    /// - `Internal` if the transaction could not commit
    #[instrument(skip(self, caller), fields(user = %caller.user_id))]
    pub async fn register_for_conference(&self, caller: &Caller, conference_key: &str) -> Result<bool> {
        let key = decode_key(conference_key, EntityKind::Conference, "conference")?;

        let outcome = self
            .transact(vec![caller.profile_key(), key.clone()], |txn| {
                let seats = txn.conference(&key)?.seats_available;
                if txn.profile(caller).is_some_and(|p| p.is_attending(&key)) {
                    return Err(ConferenceError::conflict(
                        "You have already registered for this conference",
                    ));
                }
                if seats <= 0 {
                    return Err(ConferenceError::conflict("There are no seats available."));
                }

                txn.profile_mut(caller)?.attend(key.clone());
                txn.conference_mut(&key)?.seats_available -= 1;
                Ok(true)
            })
            .await;

        match &outcome {
            Ok(_) => {
                metrics::record_registered();
                info!(conference = %key, "Registered for conference");
            }
            Err(ConferenceError::Conflict(reason)) => {
                metrics::record_registration_conflict();
                info!(conference = %key, reason = %reason, "Registration refused");
            }
            Err(_) => {}
        }
        outcome
    }

    /// Give the caller's seat back. Returns `false` if the caller was not
    /// registered, in which case nothing changes.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the conference does not exist
    /// - `Internal` if the transaction could not commit
    #[instrument(skip(self, caller), fields(user = %caller.user_id))]
    pub async fn unregister_from_conference(&self, caller: &Caller, conference_key: &str) -> Result<bool> {
        let key = decode_key(conference_key, EntityKind::Conference, "conference")?;

        let released = self
            .transact(vec![caller.profile_key(), key.clone()], |txn| {
                txn.conference(&key)?;
                if !txn.profile(caller).is_some_and(|p| p.is_attending(&key)) {
                    return Ok(false);
                }

                txn.profile_mut(caller)?.unattend(&key);
                let conference = txn.conference_mut(&key)?;
                conference.seats_available += 1;
                if conference.seats_available > conference.max_attendees {
                    warn!(
                        conference = %key,
                        seats_available = conference.seats_available,
                        max_attendees = conference.max_attendees,
                        "Seats available exceed capacity after unregistration"
                    );
                }
                Ok(true)
            })
            .await?;

        if released {
            metrics::record_unregistered();
            info!(conference = %key, "Unregistered from conference");
        }
        Ok(released)
    }

    /// Add a session to the caller's wishlist.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the session does not exist
    /// - `Conflict` if the session is already on the wishlist
    /// - `Internal` if the transaction could not commit
    #[instrument(skip(self, caller), fields(user = %caller.user_id))]
    pub async fn add_session_to_wishlist(&self, caller: &Caller, session_key: &str) -> Result<bool> {
        let key = decode_key(session_key, EntityKind::Session, "session")?;

        self.transact(vec![caller.profile_key(), key.clone()], |txn| {
            txn.session(&key)?;
            if !txn.profile_mut(caller)?.wish(key.clone()) {
                return Err(ConferenceError::conflict("This session is already in your wishlist"));
            }
            Ok(true)
        })
        .await
    }

    /// Remove a session from the caller's wishlist. Returns `false` if it was
    /// not there.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the session does not exist
    /// - `Internal` if the transaction could not commit
    #[instrument(skip(self, caller), fields(user = %caller.user_id))]
    pub async fn remove_session_from_wishlist(&self, caller: &Caller, session_key: &str) -> Result<bool> {
        let key = decode_key(session_key, EntityKind::Session, "session")?;

        self.transact(vec![caller.profile_key(), key.clone()], |txn| {
            txn.session(&key)?;
            if !txn.profile(caller).is_some_and(|p| p.has_wished(&key)) {
                return Ok(false);
            }
            Ok(txn.profile_mut(caller)?.unwish(&key))
        })
        .await
    }

    /// Sessions on the caller's wishlist, in wishlist order. Sessions deleted
    /// since they were added are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the store fails.
    pub async fn sessions_in_wishlist(&self, caller: &Caller) -> Result<Vec<Session>> {
        let profile = self.get_profile(caller).await?;
        let loaded = self.store.get_many(profile.session_wish_list).await?;
        Ok(loaded
            .into_iter()
            .flatten()
            .filter_map(|entry| entry.value.into_session())
            .collect())
    }
}
