// OAuth provider identifiers.
// Each provider owns one token record slot in durable storage.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Third-party OAuth provider a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    GitHub,
    LinkedIn,
}

impl Provider {
    /// Every provider the store knows about.
    pub const ALL: [Provider; 2] = [Provider::GitHub, Provider::LinkedIn];

    /// Storage-key suffix for this provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::GitHub => "github",
            Provider::LinkedIn => "linkedin",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
