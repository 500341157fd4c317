//! String-backed identifiers handed to us by the stories feed.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Fresh random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }
            /// Wraps an id issued elsewhere.
            pub fn from_str(s: impl Into<String>) -> Self {
                Self(s.into())
            }
            /// Borrowed string form.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(
    /// Identifier of a story row.
    StoryId
);
id_newtype!(
    /// Identifier of a user (story creator or viewer).
    UserId
);
