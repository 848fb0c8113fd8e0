//! Opaque sequence tokens.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// An opaque, server-issued position in a changes feed.
///
/// A `Seq` is only meaningful to the database that issued it. It is never
/// parsed, and two tokens are never compared for ordering: the feed itself
/// defines the order. Servers emit either JSON strings or bare numbers;
/// both decode to the same textual token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Seq(String);

impl Seq {
    /// The beginning of the feed.
    pub const ZERO: &'static str = "0";
    /// The current end of the feed.
    pub const NOW: &'static str = "now";

    /// Wraps a server-issued token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// A cursor positioned at the start of the feed.
    pub fn zero() -> Self {
        Self::new(Self::ZERO)
    }

    /// A cursor that only observes changes made after the request.
    pub fn now() -> Self {
        Self::new(Self::NOW)
    }

    /// Returns the token text as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the cursor and returns the token text.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl Default for Seq {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Seq {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for Seq {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl Serialize for Seq {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Seq {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SeqVisitor;

        impl Visitor<'_> for SeqVisitor {
            type Value = Seq;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a sequence token (string or integer)")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Seq, E> {
                Ok(Seq::new(v))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Seq, E> {
                Ok(Seq(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Seq, E> {
                Ok(Seq(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Seq, E> {
                Ok(Seq(v.to_string()))
            }
        }

        deserializer.deserialize_any(SeqVisitor)
    }
}
