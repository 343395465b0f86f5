//! Identifier newtypes.
//!
//! The wire format is inconsistent about numeric identifiers: snapshot
//! rosters carry them as integers while some incremental updates carry
//! them as numeral strings. [`UserId`] accepts both at the deserialization
//! boundary and always serializes as an integer, so set-membership tests
//! above this crate never see a ghost entry caused by `7` vs `"7"`.

use std::fmt;

use serde::{Deserialize, Serialize, de};

/// Normalized user identifier.
///
/// Deserializes from either an integer or a numeral string; serializes
/// as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

struct UserIdVisitor;

impl de::Visitor<'_> for UserIdVisitor {
    type Value = UserId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer user id or a numeral string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<UserId, E> {
        Ok(UserId(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<UserId, E> {
        u64::try_from(v).map(UserId).map_err(|_| E::custom(format!("negative user id: {v}")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<UserId, E> {
        v.trim()
            .parse::<u64>()
            .map(UserId)
            .map_err(|_| E::custom(format!("non-numeric user id: {v:?}")))
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: de::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(UserIdVisitor)
    }
}

/// Room (channel or direct-message thread) identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for RoomId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Message identifier, strictly increasing within a room.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for MessageId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}
