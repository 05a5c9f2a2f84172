//! Identifier types for messages, conversations, users and uploaded files.
//!
//! Every identifier is an opaque string newtype. Conversation, user and file
//! identifiers are assigned by the backend; message identifiers are minted by
//! whichever side creates the message (this client mints random UUIDs, history
//! records keep the backend's own ids).

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Error returned when parsing an identifier from text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IdParseError {
    /// The input was empty or whitespace only.
    #[error("identifier must not be empty")]
    Empty,
}

/// Declare an opaque string identifier with a consistent API.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[repr(transparent)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier.
            #[inline]
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the raw identifier.
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Extract the raw identifier.
            #[inline]
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(IdParseError::Empty);
                }
                Ok(Self(trimmed.to_string()))
            }
        }

        impl AsRef<str> for $name {
            #[inline]
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<$name> for String {
            #[inline]
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

define_string_id!(
    /// Identifier of a single chat message, stable for the message's lifetime.
    MessageId
);

define_string_id!(
    /// Identifier of a conversation, assigned by the backend.
    ConversationId
);

define_string_id!(
    /// Identifier of an uploaded file, assigned by the backend on success.
    FileId
);

impl MessageId {
    /// Mint a fresh random message identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl FileId {
    /// Mint a temporary identifier for a file whose upload is still pending.
    #[must_use]
    pub fn temporary() -> Self {
        Self(format!("pending-{}", Uuid::new_v4().simple()))
    }

    /// Whether this identifier was minted locally and never confirmed by the backend.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with("pending-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_message_ids_are_unique() {
        let a = MessageId::generate();
        let b = MessageId::generate();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn test_parse_trims_and_rejects_empty() {
        let id: ConversationId = "  65f1c0ffee  ".parse().unwrap();
        assert_eq!(id.as_str(), "65f1c0ffee");
        assert_eq!("   ".parse::<ConversationId>(), Err(IdParseError::Empty));
    }

    #[test]
    fn test_serde_is_transparent() {
        let id = ConversationId::new("abc123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc123\"");
        let back: ConversationId = serde_json::from_str("\"abc123\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_temporary_file_ids() {
        let temp = FileId::temporary();
        assert!(temp.is_temporary());
        assert!(!FileId::new("f_42").is_temporary());
    }
}
