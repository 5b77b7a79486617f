//! Domain entities and the input forms that create or update them.

use crate::key::{EntityKey, EntityKind};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// City assigned to a conference created without one.
pub const DEFAULT_CITY: &str = "Default City";

/// Topics assigned to a conference created without any.
pub const DEFAULT_TOPICS: [&str; 2] = ["Default", "Topic"];

/// The authenticated identity behind a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Stable user id; also the profile key name.
    pub user_id: String,
    /// Email address.
    pub email: String,
    /// Display nickname used as the initial profile display name.
    pub nickname: String,
}

impl Caller {
    /// Creates a caller identity.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        email: impl Into<String>,
        nickname: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            nickname: nickname.into(),
        }
    }

    /// Key of this caller's profile.
    #[must_use]
    pub fn profile_key(&self) -> EntityKey {
        EntityKey::profile(self.user_id.clone())
    }
}

/// T-shirt size recorded on a profile.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum TeeShirtSize {
    #[default]
    #[serde(rename = "NOT_SPECIFIED")]
    NotSpecified,
    #[serde(rename = "XS_M")]
    XsM,
    #[serde(rename = "XS_W")]
    XsW,
    #[serde(rename = "S_M")]
    SM,
    #[serde(rename = "S_W")]
    SW,
    #[serde(rename = "M_M")]
    MM,
    #[serde(rename = "M_W")]
    MW,
    #[serde(rename = "L_M")]
    LM,
    #[serde(rename = "L_W")]
    LW,
    #[serde(rename = "XL_M")]
    XlM,
    #[serde(rename = "XL_W")]
    XlW,
    #[serde(rename = "XXL_M")]
    XxlM,
    #[serde(rename = "XXL_W")]
    XxlW,
    #[serde(rename = "XXXL_M")]
    XxxlM,
    #[serde(rename = "XXXL_W")]
    XxxlW,
}

/// A user's profile: identity plus attendance and wishlist sets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Profile key (root of the user's entity group).
    pub key: EntityKey,
    /// Name shown to other users.
    pub display_name: String,
    /// Contact email.
    pub main_email: String,
    /// T-shirt size.
    #[serde(default)]
    pub tee_shirt_size: TeeShirtSize,
    /// Conferences the user is registered for. No duplicates.
    #[serde(default)]
    pub conference_keys_to_attend: Vec<EntityKey>,
    /// Sessions on the user's wishlist. No duplicates.
    #[serde(default)]
    pub session_wish_list: Vec<EntityKey>,
}

impl Profile {
    /// Fresh profile for a caller seen for the first time.
    #[must_use]
    pub fn for_caller(caller: &Caller) -> Self {
        Self {
            key: caller.profile_key(),
            display_name: caller.nickname.clone(),
            main_email: caller.email.clone(),
            tee_shirt_size: TeeShirtSize::NotSpecified,
            conference_keys_to_attend: Vec::new(),
            session_wish_list: Vec::new(),
        }
    }

    /// Whether the user is registered for `conference`.
    #[must_use]
    pub fn is_attending(&self, conference: &EntityKey) -> bool {
        self.conference_keys_to_attend.contains(conference)
    }

    /// Adds `conference` to the attendance set. Returns `false` if already present.
    pub fn attend(&mut self, conference: EntityKey) -> bool {
        if self.is_attending(&conference) {
            return false;
        }
        self.conference_keys_to_attend.push(conference);
        true
    }

    /// Removes `conference` from the attendance set. Returns `false` if absent.
    pub fn unattend(&mut self, conference: &EntityKey) -> bool {
        let before = self.conference_keys_to_attend.len();
        self.conference_keys_to_attend.retain(|k| k != conference);
        self.conference_keys_to_attend.len() != before
    }

    /// Whether `session` is on the wishlist.
    #[must_use]
    pub fn has_wished(&self, session: &EntityKey) -> bool {
        self.session_wish_list.contains(session)
    }

    /// Adds `session` to the wishlist. Returns `false` if already present.
    pub fn wish(&mut self, session: EntityKey) -> bool {
        if self.has_wished(&session) {
            return false;
        }
        self.session_wish_list.push(session);
        true
    }

    /// Removes `session` from the wishlist. Returns `false` if absent.
    pub fn unwish(&mut self, session: &EntityKey) -> bool {
        let before = self.session_wish_list.len();
        self.session_wish_list.retain(|k| k != session);
        self.session_wish_list.len() != before
    }
}

/// A conference, owned by its organizer's profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conference {
    /// Conference key (child of the organizer's profile).
    pub key: EntityKey,
    /// Conference name. Never empty.
    pub name: String,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// User id of the organizer.
    pub organizer_user_id: String,
    /// Topics (repeated field).
    #[serde(default)]
    pub topics: Vec<String>,
    /// Host city.
    pub city: String,
    /// First day.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Last day.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Month of `start_date`, or 0 when unknown.
    pub month: i32,
    /// Capacity.
    pub max_attendees: i32,
    /// Remaining seats.
    pub seats_available: i32,
}

/// A session inside a conference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session key (child of the conference).
    pub key: EntityKey,
    /// Session name. Never empty.
    pub name: String,
    /// Highlights text.
    #[serde(default)]
    pub highlights: Option<String>,
    /// Speaker name.
    #[serde(default)]
    pub speaker: Option<String>,
    /// Length in minutes.
    #[serde(default)]
    pub duration: Option<i32>,
    /// Session type, e.g. "Workshop".
    #[serde(default)]
    pub type_of_session: Option<String>,
    /// Day of the session.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Start time of day.
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
}

impl Session {
    /// Key of the conference this session belongs to.
    #[must_use]
    pub fn conference_key(&self) -> Option<EntityKey> {
        self.key.parent()
    }
}

/// Cached description of a conference's featured speaker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturedSpeaker {
    /// Conference the speaker is featured in.
    pub conference_key: EntityKey,
    /// Speaker name.
    pub speaker: String,
    /// Names of the speaker's sessions in that conference.
    pub session_names: Vec<String>,
}

impl fmt::Display for FeaturedSpeaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Featured speaker: {}. Sessions: {}",
            self.speaker,
            self.session_names.join(", ")
        )
    }
}

/// Any stored entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
#[allow(missing_docs)]
pub enum Entity {
    Profile(Profile),
    Conference(Conference),
    Session(Session),
}

impl Entity {
    /// Key of the wrapped entity.
    #[must_use]
    pub const fn key(&self) -> &EntityKey {
        match self {
            Self::Profile(p) => &p.key,
            Self::Conference(c) => &c.key,
            Self::Session(s) => &s.key,
        }
    }

    /// Kind of the wrapped entity.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Profile(_) => EntityKind::Profile,
            Self::Conference(_) => EntityKind::Conference,
            Self::Session(_) => EntityKind::Session,
        }
    }

    /// The wrapped conference, if this is one.
    #[must_use]
    pub fn into_conference(self) -> Option<Conference> {
        match self {
            Self::Conference(c) => Some(c),
            _ => None,
        }
    }

    /// The wrapped session, if this is one.
    #[must_use]
    pub fn into_session(self) -> Option<Session> {
        match self {
            Self::Session(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Profile> for Entity {
    fn from(value: Profile) -> Self {
        Self::Profile(value)
    }
}

impl From<Conference> for Entity {
    fn from(value: Conference) -> Self {
        Self::Conference(value)
    }
}

impl From<Session> for Entity {
    fn from(value: Session) -> Self {
        Self::Session(value)
    }
}

/// Client input for creating or updating a conference.
///
/// On create, `name` is required and defaults fill the rest. On update,
/// only the fields present are applied.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct ConferenceForm {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub topics: Option<Vec<String>>,
    #[serde(default)]
    pub city: Option<String>,
    /// `YYYY-MM-DD`; only the first 10 characters are read.
    #[serde(default)]
    pub start_date: Option<String>,
    /// `YYYY-MM-DD`; only the first 10 characters are read.
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub max_attendees: Option<i32>,
}

/// Client input for creating a session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct SessionForm {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub highlights: Option<String>,
    #[serde(default)]
    pub speaker: Option<String>,
    #[serde(default)]
    pub duration: Option<i32>,
    #[serde(default)]
    pub type_of_session: Option<String>,
    /// `YYYY-MM-DD`; only the first 10 characters are read.
    #[serde(default)]
    pub date: Option<String>,
    /// `HH:MM`; only the first 5 characters are read.
    #[serde(default)]
    pub start_time: Option<String>,
}

/// Client input for updating the caller's own profile.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct ProfileForm {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub tee_shirt_size: Option<TeeShirtSize>,
}

/// Parses a `YYYY-MM-DD` date from the first 10 characters of `raw`.
///
/// # Errors
///
/// Returns the offending input when it does not hold a valid date.
pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    let head: String = raw.chars().take(10).collect();
    NaiveDate::parse_from_str(&head, "%Y-%m-%d").map_err(|_| raw.to_string())
}

/// Parses an `HH:MM` time of day from the first 5 characters of `raw`.
///
/// # Errors
///
/// Returns the offending input when it does not hold a valid time.
pub fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    let head: String = raw.chars().take(5).collect();
    NaiveTime::parse_from_str(&head, "%H:%M").map_err(|_| raw.to_string())
}

impl FromStr for TeeShirtSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| format!("unknown tee shirt size '{s}'"))
    }
}
