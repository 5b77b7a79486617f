//! Conference lifecycle and filtered queries.

use crate::service::{ConferenceService, decode_key};
use conference_core::error::{ConferenceError, Result};
use conference_core::filter::{ConferenceQuery, FilterClause};
use conference_core::job::Job;
use conference_core::key::EntityKind;
use conference_core::model::{
    Caller, Conference, ConferenceForm, DEFAULT_CITY, DEFAULT_TOPICS, Entity, parse_date,
};
use chrono::{Datelike, NaiveDate};
use tracing::{info, instrument};

fn parse_optional_date(raw: Option<&str>, field: &str) -> Result<Option<NaiveDate>> {
    raw.map(|value| {
        parse_date(value).map_err(|bad| {
            ConferenceError::invalid(format!("Conference '{field}' must be YYYY-MM-DD, got '{bad}'"))
        })
    })
    .transpose()
}

#[allow(clippy::cast_possible_wrap)]
fn month_of(date: Option<NaiveDate>) -> i32 {
    date.map_or(0, |d| d.month() as i32)
}

fn summary(conference: &Conference) -> String {
    let date = |d: Option<NaiveDate>| d.map_or_else(|| "TBD".to_string(), |d| d.to_string());
    format!(
        "{}\r\nCity: {}\r\nTopics: {}\r\nDates: {} to {}\r\nMax attendees: {}",
        conference.name,
        conference.city,
        conference.topics.join(", "),
        date(conference.start_date),
        date(conference.end_date),
        conference.max_attendees
    )
}

impl ConferenceService {
    /// Create a conference owned by the caller.
    ///
    /// Missing fields get defaults: city `"Default City"`, topics
    /// `["Default", "Topic"]`, zero capacity. A positive `maxAttendees` also
    /// sets the initial seats. A confirmation mail job is enqueued after the
    /// write.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `name` is missing or a date is malformed
    /// - `Internal` if the store fails
    #[instrument(skip(self, caller, form), fields(user = %caller.user_id))]
    pub async fn create_conference(&self, caller: &Caller, form: ConferenceForm) -> Result<Conference> {
        let name = form
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| ConferenceError::invalid("Conference 'name' field required"))?;
        let start_date = parse_optional_date(form.start_date.as_deref(), "startDate")?;
        let end_date = parse_optional_date(form.end_date.as_deref(), "endDate")?;
        let max_attendees = form.max_attendees.unwrap_or(0);

        let key = self
            .store
            .allocate_key(EntityKind::Conference, Some(caller.profile_key()))
            .await?;

        let conference = Conference {
            key,
            name,
            description: form.description,
            organizer_user_id: caller.user_id.clone(),
            topics: form
                .topics
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_TOPICS.iter().map(ToString::to_string).collect()),
            city: form
                .city
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CITY.to_string()),
            start_date,
            end_date,
            month: month_of(start_date),
            max_attendees,
            seats_available: max_attendees.max(0),
        };

        self.store.put(Entity::Conference(conference.clone())).await?;
        info!(conference = %conference.key, name = %conference.name, "Conference created");

        self.enqueue_after_commit(Job::SendConfirmationEmail {
            email: caller.email.clone(),
            conference_info: summary(&conference),
        })
        .await;

        Ok(conference)
    }

    /// Update the provided fields of a conference the caller organizes.
    ///
    /// A new `startDate` also recomputes `month`. Seat inventory is left
    /// untouched.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the conference does not exist
    /// - `PermissionDenied` if the caller is not the organizer
    /// - `InvalidArgument` if a date is malformed
    /// - `Internal` if the transaction could not commit
    #[instrument(skip(self, caller, form), fields(user = %caller.user_id))]
    pub async fn update_conference(
        &self,
        caller: &Caller,
        conference_key: &str,
        form: ConferenceForm,
    ) -> Result<Conference> {
        let key = decode_key(conference_key, EntityKind::Conference, "conference")?;
        let start_date = parse_optional_date(form.start_date.as_deref(), "startDate")?;
        let end_date = parse_optional_date(form.end_date.as_deref(), "endDate")?;

        let updated = self
            .transact(vec![key.clone()], |txn| {
                let conference = txn.conference_mut(&key)?;
                if conference.organizer_user_id != caller.user_id {
                    return Err(ConferenceError::forbidden(
                        "Only the owner can update the conference.",
                    ));
                }

                if let Some(name) = form.name.as_ref().filter(|n| !n.trim().is_empty()) {
                    conference.name.clone_from(name);
                }
                if let Some(description) = &form.description {
                    conference.description = Some(description.clone());
                }
                if let Some(topics) = form.topics.as_ref().filter(|t| !t.is_empty()) {
                    conference.topics.clone_from(topics);
                }
                if let Some(city) = form.city.as_ref().filter(|c| !c.trim().is_empty()) {
                    conference.city.clone_from(city);
                }
                if start_date.is_some() {
                    conference.start_date = start_date;
                    conference.month = month_of(start_date);
                }
                if end_date.is_some() {
                    conference.end_date = end_date;
                }
                if let Some(max) = form.max_attendees {
                    conference.max_attendees = max;
                }
                Ok(conference.clone())
            })
            .await?;

        info!(conference = %updated.key, "Conference updated");
        Ok(updated)
    }

    /// Load one conference.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the conference does not exist
    /// - `Internal` if the store fails
    pub async fn get_conference(&self, conference_key: &str) -> Result<Conference> {
        let key = decode_key(conference_key, EntityKind::Conference, "conference")?;
        self.store
            .get(key)
            .await?
            .and_then(|entry| entry.value.into_conference())
            .ok_or_else(|| ConferenceError::not_found("conference", conference_key))
    }

    /// Conferences organized by the caller.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the store fails.
    pub async fn conferences_created(&self, caller: &Caller) -> Result<Vec<Conference>> {
        let children = self
            .store
            .children(caller.profile_key(), EntityKind::Conference)
            .await?;
        Ok(children.into_iter().filter_map(Entity::into_conference).collect())
    }

    /// Conferences the caller is registered for, in registration order.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the store fails.
    pub async fn conferences_to_attend(&self, caller: &Caller) -> Result<Vec<Conference>> {
        let profile = self.get_profile(caller).await?;
        let loaded = self.store.get_many(profile.conference_keys_to_attend).await?;
        Ok(loaded
            .into_iter()
            .flatten()
            .filter_map(|entry| entry.value.into_conference())
            .collect())
    }

    /// Compile `filters` and run them against all conferences.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for unknown fields or operators, non-numeric values
    ///   for numeric fields, or inequalities on more than one field
    /// - `Internal` if the store fails
    #[instrument(skip(self))]
    pub async fn query_conferences(&self, filters: &[FilterClause]) -> Result<Vec<Conference>> {
        let query = ConferenceQuery::compile(filters)?;
        Ok(self.store.query_conferences(query).await?)
    }
}
