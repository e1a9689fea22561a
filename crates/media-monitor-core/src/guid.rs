//! Resource identity.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const GUID_LEN: usize = 8;

/// Short opaque identity of one monitored resource.
///
/// Random, 8 characters. Collisions are possible but negligible for the
/// handful of resources on a page, so nothing checks for them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(String);

impl Guid {
    /// Generate a fresh random identity.
    #[must_use]
    pub fn generate() -> Self {
        let mut simple = Uuid::new_v4().simple().to_string();
        simple.truncate(GUID_LEN);
        Self(simple)
    }

    /// The identity as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Guid {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Guid {
    fn from(value: String) -> Self {
        Self(value)
    }
}
