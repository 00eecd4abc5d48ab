//! Internal implementation of entity identifiers.

use crate::{IdError, IdResult};
use chrono::{DateTime, Utc};
use std::{fmt, str::FromStr};

/// A `<prefix>-<millis>` entity identifier.
///
/// Once constructed, the identifier is guaranteed to have a non-empty prefix made of lowercase
/// ASCII letters, digits or underscores, followed by a hyphen and a non-negative Unix
/// millisecond timestamp.
///
/// # Construction
/// - [`IdGenerator::next`] allocates a fresh identifier.
/// - [`EntityId::parse`] validates an externally supplied identifier (CLI input, stored JSON).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    prefix: String,
    millis: i64,
}

impl EntityId {
    /// Builds an identifier from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidInput`] if the prefix is not canonical or `millis` is negative.
    pub fn from_parts(prefix: &str, millis: i64) -> IdResult<Self> {
        if !Self::is_canonical_prefix(prefix) {
            return Err(IdError::InvalidInput(format!(
                "prefix must be lowercase letters, digits or '_', got: '{}'",
                prefix
            )));
        }
        if millis < 0 {
            return Err(IdError::InvalidInput(format!(
                "timestamp must not be negative, got: {}",
                millis
            )));
        }
        Ok(Self {
            prefix: prefix.to_owned(),
            millis,
        })
    }

    /// Validates and parses a `<prefix>-<millis>` string.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidInput`] if the separator is missing, the prefix is not
    /// canonical or the timestamp is not a non-negative integer.
    pub fn parse(input: &str) -> IdResult<Self> {
        let (prefix, millis) = input.rsplit_once('-').ok_or_else(|| {
            IdError::InvalidInput(format!("Invalid entity id format: '{}'", input))
        })?;

        if millis.is_empty() || !millis.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IdError::InvalidInput(format!(
                "Invalid entity id timestamp: '{}'",
                input
            )));
        }

        let millis = millis.parse::<i64>().map_err(|e| {
            IdError::InvalidInput(format!("Invalid entity id timestamp '{}': {}", input, e))
        })?;

        Self::from_parts(prefix, millis)
    }

    /// Returns true if `prefix` may be used as an identifier prefix.
    pub fn is_canonical_prefix(prefix: &str) -> bool {
        !prefix.is_empty()
            && prefix
                .bytes()
                .all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'_'))
    }

    /// The entity-kind prefix (for example `apt`).
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The creation timestamp in Unix milliseconds.
    pub fn millis(&self) -> i64 {
        self.millis
    }

    /// The creation timestamp, if it is representable as a `DateTime<Utc>`.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.millis)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix, self.millis)
    }
}

impl FromStr for EntityId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityId::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for EntityId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for EntityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        EntityId::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Monotonic generator of [`EntityId`]s.
///
/// Consecutive calls are guaranteed to produce strictly increasing timestamps (bumped by 1 ms
/// when the clock has not advanced), so two entities created in the same millisecond by the
/// same generator never share an identifier.
#[derive(Clone, Debug, Default)]
pub struct IdGenerator {
    last_millis: Option<i64>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new identifier with the given prefix.
    ///
    /// # Panics
    ///
    /// Panics if `prefix` is not canonical. Prefixes are compile-time constants in this
    /// workspace, so a bad prefix is a programming error rather than an input error.
    pub fn next(&mut self, prefix: &'static str) -> EntityId {
        assert!(
            EntityId::is_canonical_prefix(prefix),
            "invalid entity id prefix: {prefix}"
        );

        let now = Utc::now().timestamp_millis();
        let millis = match self.last_millis {
            Some(prev) if now <= prev => prev + 1,
            _ => now,
        };
        self.last_millis = Some(millis);

        EntityId {
            prefix: prefix.to_owned(),
            millis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_has_prefix_and_timestamp() {
        let mut ids = IdGenerator::new();
        let id = ids.next("apt");

        assert_eq!(id.prefix(), "apt");
        assert!(id.to_string().starts_with("apt-"));
        assert!(id.created_at().is_some());
    }

    #[test]
    fn test_generate_is_strictly_monotonic() {
        let mut ids = IdGenerator::new();
        let mut previous = ids.next("notif");

        for _ in 0..1_000 {
            let next = ids.next("notif");
            assert!(next.millis() > previous.millis());
            previous = next;
        }
    }

    #[test]
    #[should_panic(expected = "invalid entity id prefix")]
    fn test_generate_rejects_bad_prefix() {
        let mut ids = IdGenerator::new();
        let _ = ids.next("Bad-Prefix");
    }

    #[test]
    fn test_parse_valid() {
        let id = EntityId::parse("rx-1767225600000").unwrap();

        assert_eq!(id.prefix(), "rx");
        assert_eq!(id.millis(), 1_767_225_600_000);
        assert_eq!(id.to_string(), "rx-1767225600000");
    }

    #[test]
    fn test_parse_accepts_underscored_prefix() {
        let id = EntityId::parse("follow_up-42").unwrap();
        assert_eq!(id.prefix(), "follow_up");
    }

    #[test]
    fn test_parse_missing_separator() {
        let result = EntityId::parse("apt1767225600000");

        match result {
            Err(IdError::InvalidInput(msg)) => {
                assert!(msg.contains("Invalid entity id format"));
            }
            _ => panic!("Expected InvalidInput error"),
        }
    }

    #[test]
    fn test_parse_rejects_non_numeric_timestamp() {
        assert!(EntityId::parse("apt-12ab").is_err());
        assert!(EntityId::parse("apt-").is_err());
    }

    #[test]
    fn test_parse_rejects_uppercase_prefix() {
        assert!(EntityId::parse("APT-1767225600000").is_err());
    }

    #[test]
    fn test_parse_rejects_empty_prefix() {
        assert!(EntityId::parse("-1767225600000").is_err());
    }

    #[test]
    fn test_from_parts_rejects_negative_timestamp() {
        assert!(EntityId::from_parts("apt", -1).is_err());
    }

    #[test]
    fn test_serde_uses_string_form() {
        let id = EntityId::parse("order-1767225600123").unwrap();
        let json = serde_json::to_string(&id).unwrap();

        assert_eq!(json, "\"order-1767225600123\"");

        let back: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_serde_rejects_malformed_id() {
        let result: Result<EntityId, _> = serde_json::from_str("\"not an id\"");
        assert!(result.is_err());
    }
}
