//! Strongly-typed identifiers for domain entities.
//!
//! These prevent mixing up signal-side ids with the ids a venue assigns.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier from a string.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        // Venues and signal sources emit ids both as JSON strings and as
        // integers; both normalize to the string form.
        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                #[derive(Deserialize)]
                #[serde(untagged)]
                enum Raw {
                    Text(String),
                    Unsigned(u64),
                    Signed(i64),
                }

                Ok(match Raw::deserialize(deserializer)? {
                    Raw::Text(value) => Self(value),
                    Raw::Unsigned(value) => Self(value.to_string()),
                    Raw::Signed(value) => Self(value.to_string()),
                })
            }
        }
    };
}

define_id!(
    SignalOrderId,
    "Identifier correlating a chain of signals (open, modify, close) for one logical trade."
);
define_id!(ChannelId, "Identifier of the signal channel a message arrived on.");
define_id!(BrokerOrderId, "Venue-assigned identifier of a (possibly pending) order.");
define_id!(BrokerPositionId, "Venue-assigned identifier of a filled position.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_order_id_new_and_display() {
        let id = SignalOrderId::new("42");
        assert_eq!(id.as_str(), "42");
        assert_eq!(format!("{id}"), "42");
    }

    #[test]
    fn ids_deserialize_from_string_or_number() {
        let from_text: SignalOrderId = serde_json::from_str("\"abc-1\"").unwrap();
        let from_number: SignalOrderId = serde_json::from_str("1017").unwrap();
        let negative: BrokerOrderId = serde_json::from_str("-3").unwrap();

        assert_eq!(from_text.as_str(), "abc-1");
        assert_eq!(from_number.as_str(), "1017");
        assert_eq!(negative.as_str(), "-3");
    }

    #[test]
    fn ids_serialize_as_plain_string() {
        let id = BrokerPositionId::new("46870472");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"46870472\"");
    }

    #[test]
    fn channel_id_from_str() {
        let id: ChannelId = "signals-fx".into();
        assert_eq!(id.into_inner(), "signals-fx");
    }
}
