//! Rate limiting strategies.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The limiting policy family applied to a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Strategy {
    /// Login, registration and similar endpoints. One global limit
    /// configuration applies regardless of the caller's plan.
    Auth,
    /// General API usage, parameterized by the caller's pricing plan.
    #[default]
    Business,
}

impl Strategy {
    /// Canonical upper-case name, as used in logs and response bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Auth => "AUTH",
            Strategy::Business => "BUSINESS",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
