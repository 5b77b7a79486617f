//! Hierarchical entity keys.
//!
//! Every stored entity is addressed by an [`EntityKey`]: a non-empty path of
//! `(kind, id)` segments, root first. The last segment identifies the entity
//! itself; the preceding segments name its ancestors. A conference is a child
//! of its organizer's profile, and a session is a child of its conference:
//!
//! ```text
//! Profile("alice")
//! └── Conference(7)
//!     └── Session(12)
//! ```
//!
//! The root segment of a key is its *entity group*. Transactions are scoped to
//! a set of entity groups.
//!
//! Keys are exchanged with clients as opaque URL-safe strings
//! ([`EntityKey::to_urlsafe`] / [`EntityKey::from_urlsafe`]).

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced when decoding a URL-safe key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The input was not valid URL-safe base64.
    #[error("Invalid key encoding: {0}")]
    Encoding(String),

    /// The decoded payload was not a key path.
    #[error("Invalid key path: {0}")]
    Path(String),

    /// The decoded path had no segments.
    #[error("Key path is empty")]
    Empty,
}

/// The kind of entity a key segment refers to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// A user profile (always a root).
    Profile,
    /// A conference, child of its organizer's profile.
    Conference,
    /// A session, child of its conference.
    Session,
}

impl EntityKind {
    /// Stable name used in storage and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Profile => "Profile",
            Self::Conference => "Conference",
            Self::Session => "Session",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Profile" => Ok(Self::Profile),
            "Conference" => Ok(Self::Conference),
            "Session" => Ok(Self::Session),
            other => Err(KeyError::Path(format!("unknown kind '{other}'"))),
        }
    }
}

/// Identifier of a single key segment: either a caller-chosen name or an
/// allocated numeric id.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyId {
    /// Named id (profiles use the user id).
    Name(String),
    /// Store-allocated numeric id.
    Id(i64),
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "'{name}'"),
            Self::Id(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
struct Segment {
    kind: EntityKind,
    id: KeyId,
}

/// Hierarchical key of a stored entity.
///
/// Serializes as its URL-safe string so keys embedded in other entities
/// (wishlists, attendance lists) stay compact and opaque.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityKey {
    path: Vec<Segment>,
}

impl EntityKey {
    /// Root key of a user's profile.
    #[must_use]
    pub fn profile(user_id: impl Into<String>) -> Self {
        Self {
            path: vec![Segment {
                kind: EntityKind::Profile,
                id: KeyId::Name(user_id.into()),
            }],
        }
    }

    /// Root key with an arbitrary kind and id.
    #[must_use]
    pub fn root(kind: EntityKind, id: KeyId) -> Self {
        Self {
            path: vec![Segment { kind, id }],
        }
    }

    /// Key of a child entity under `self`.
    #[must_use]
    pub fn child(&self, kind: EntityKind, id: KeyId) -> Self {
        let mut path = self.path.clone();
        path.push(Segment { kind, id });
        Self { path }
    }

    fn last(&self) -> &Segment {
        // Constructors and decoding never produce an empty path.
        &self.path[self.path.len() - 1]
    }

    /// Kind of the entity this key addresses.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.last().kind
    }

    /// Id of the entity this key addresses.
    #[must_use]
    pub fn id(&self) -> &KeyId {
        &self.last().id
    }

    /// Parent key, or `None` for a root key.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.path.len() < 2 {
            return None;
        }
        Some(Self {
            path: self.path[..self.path.len() - 1].to_vec(),
        })
    }

    /// The entity group this key belongs to (its root).
    #[must_use]
    pub fn group(&self) -> Self {
        Self {
            path: vec![self.path[0].clone()],
        }
    }

    /// True when `self` is the direct parent of `other`.
    #[must_use]
    pub fn is_parent_of(&self, other: &Self) -> bool {
        other.path.len() == self.path.len() + 1 && other.path.starts_with(&self.path)
    }

    /// Opaque, URL-safe string form of this key.
    #[must_use]
    pub fn to_urlsafe(&self) -> String {
        // Serializing a Vec of plain enums/strings cannot fail.
        let bytes = serde_json::to_vec(&self.path).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Decodes a key produced by [`EntityKey::to_urlsafe`].
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] if the string is not a valid encoded key.
    pub fn from_urlsafe(encoded: &str) -> Result<Self, KeyError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .map_err(|e| KeyError::Encoding(e.to_string()))?;
        let path: Vec<Segment> =
            serde_json::from_slice(&bytes).map_err(|e| KeyError::Path(e.to_string()))?;
        if path.is_empty() {
            return Err(KeyError::Empty);
        }
        Ok(Self { path })
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_urlsafe())
    }
}

impl FromStr for EntityKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_urlsafe(s)
    }
}

impl TryFrom<String> for EntityKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_urlsafe(&value)
    }
}

impl From<EntityKey> for String {
    fn from(key: EntityKey) -> Self {
        key.to_urlsafe()
    }
}
