//! Opaque identifiers for nodes and edges.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the identifier, returning the inner string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a knowledge node.
    NodeId
);

string_id!(
    /// Identifier of a relationship edge.
    EdgeId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ids_are_unique() {
        assert_ne!(NodeId::new(), NodeId::new());
        assert_ne!(EdgeId::new(), EdgeId::new());
    }

    #[test]
    fn test_caller_supplied_ids() {
        let id = NodeId::from("1");
        assert_eq!(id.as_str(), "1");
        assert_eq!(id.to_string(), "1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"1\"");
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let mut ids = vec![NodeId::from("b"), NodeId::from("a"), NodeId::from("c")];
        ids.sort();
        let expected: Vec<NodeId> = vec!["a".into(), "b".into(), "c".into()];
        assert_eq!(ids, expected);
    }
}
