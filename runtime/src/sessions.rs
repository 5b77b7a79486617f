//! Session creation and catalog queries.

use crate::service::{ConferenceService, decode_key};
use conference_core::error::{ConferenceError, Result};
use conference_core::job::Job;
use conference_core::key::{EntityKey, EntityKind};
use conference_core::model::{Caller, Entity, Session, SessionForm, parse_date, parse_time};
use conference_core::store::SessionQuery;
use tracing::{info, instrument};

impl ConferenceService {
    /// Create a session in a conference the caller organizes.
    ///
    /// When the session names a speaker, a featured-speaker recomputation is
    /// enqueued after the write.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `name` is missing or `date` / `startTime` is malformed
    /// - `NotFound` if the conference does not exist
    /// - `PermissionDenied` if the caller is not the organizer
    /// - `Internal` if the store fails
    #[instrument(skip(self, caller, form), fields(user = %caller.user_id))]
    pub async fn create_session(
        &self,
        caller: &Caller,
        conference_key: &str,
        form: SessionForm,
    ) -> Result<Session> {
        let name = form
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| ConferenceError::invalid("Session 'name' field required"))?;

        let conference = self.get_conference(conference_key).await?;
        if conference.organizer_user_id != caller.user_id {
            return Err(ConferenceError::forbidden(
                "Only the owner can add sessions to the conference.",
            ));
        }

        let date = form
            .date
            .as_deref()
            .map(parse_date)
            .transpose()
            .map_err(|bad| ConferenceError::invalid(format!("Session 'date' must be YYYY-MM-DD, got '{bad}'")))?;
        let start_time = form
            .start_time
            .as_deref()
            .map(parse_time)
            .transpose()
            .map_err(|bad| ConferenceError::invalid(format!("Session 'startTime' must be HH:MM, got '{bad}'")))?;
        let speaker = form.speaker.filter(|s| !s.trim().is_empty());

        let key = self
            .store
            .allocate_key(EntityKind::Session, Some(conference.key.clone()))
            .await?;
        let session = Session {
            key,
            name,
            highlights: form.highlights,
            speaker,
            duration: form.duration,
            type_of_session: form.type_of_session,
            date,
            start_time,
        };

        self.store.put(Entity::Session(session.clone())).await?;
        info!(session = %session.key, conference = %conference.key, "Session created");

        if let Some(speaker) = &session.speaker {
            self.enqueue_after_commit(Job::SetFeaturedSpeaker {
                conference_key: conference.key.clone(),
                speaker: speaker.clone(),
            })
            .await;
        }

        Ok(session)
    }

    async fn conference_scope(&self, conference_key: &str) -> Result<EntityKey> {
        let key = decode_key(conference_key, EntityKind::Conference, "conference")?;
        match self.store.get(key.clone()).await? {
            Some(entry) if entry.value.kind() == EntityKind::Conference => Ok(key),
            _ => Err(ConferenceError::not_found("conference", conference_key)),
        }
    }

    /// All sessions of a conference, by name.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the conference does not exist
    /// - `Internal` if the store fails
    pub async fn conference_sessions(&self, conference_key: &str) -> Result<Vec<Session>> {
        let key = self.conference_scope(conference_key).await?;
        Ok(self.store.query_sessions(SessionQuery::new().in_conference(key)).await?)
    }

    /// Sessions of one type within a conference, by name.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the conference does not exist
    /// - `Internal` if the store fails
    pub async fn conference_sessions_by_type(
        &self,
        conference_key: &str,
        type_of_session: &str,
    ) -> Result<Vec<Session>> {
        let key = self.conference_scope(conference_key).await?;
        let query = SessionQuery::new().in_conference(key).of_type(type_of_session);
        Ok(self.store.query_sessions(query).await?)
    }

    /// Sessions given by `speaker` across all conferences, by name.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the store fails.
    pub async fn sessions_by_speaker(&self, speaker: &str) -> Result<Vec<Session>> {
        Ok(self.store.query_sessions(SessionQuery::new().by_speaker(speaker)).await?)
    }

    /// Sessions lasting exactly `minutes`, by name.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the store fails.
    pub async fn sessions_by_duration(&self, minutes: i32) -> Result<Vec<Session>> {
        Ok(self.store.query_sessions(SessionQuery::new().lasting(minutes)).await?)
    }

    /// Sessions starting at `start_time` (`HH:MM`), by name.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the time is malformed
    /// - `Internal` if the store fails
    pub async fn sessions_by_start_time(&self, start_time: &str) -> Result<Vec<Session>> {
        let time = parse_time(start_time)
            .map_err(|bad| ConferenceError::invalid(format!("Start time must be HH:MM, got '{bad}'")))?;
        Ok(self.store.query_sessions(SessionQuery::new().starting_at(time)).await?)
    }
}
