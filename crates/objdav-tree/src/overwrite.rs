//! Per-request overwrite policy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the request header carrying the overwrite hint.
pub const OVERWRITE_HEADER: &str = "Overwrite";

/// Header value that allows overwriting an existing destination.
pub const OVERWRITE_ALLOW: &str = "Y";

/// What the backend should do when the destination name is already taken.
///
/// Recomputed for every request and never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    /// Replace the existing destination.
    Overwrite,
    /// Refuse with a conflict.
    #[default]
    Fail,
}

impl OverwritePolicy {
    /// Derive the policy from the raw header value, if any.
    ///
    /// Only the exact (case-sensitive) value `"Y"` allows overwriting.
    pub fn from_hint(value: Option<&[u8]>) -> Self {
        match value {
            Some(v) if v == OVERWRITE_ALLOW.as_bytes() => OverwritePolicy::Overwrite,
            _ => OverwritePolicy::Fail,
        }
    }

    /// Returns true if an existing destination may be replaced.
    pub fn allows_overwrite(self) -> bool {
        matches!(self, OverwritePolicy::Overwrite)
    }

    /// Wire name understood by the store.
    pub fn as_str(self) -> &'static str {
        match self {
            OverwritePolicy::Overwrite => "overwrite",
            OverwritePolicy::Fail => "fail",
        }
    }
}

impl fmt::Display for OverwritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
