//! The closed (but extensible) set of judges the crawler knows how to crawl.

use serde::{Deserialize, Serialize};

/// A competitive-programming judge the crawler can discover submissions on.
///
/// Identity of an [`super::integration::Integration`] depends on this tag's
/// textual name, so the `rename_all` mapping below is load-bearing, not
/// cosmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Codeforces,
    Cses,
}

impl Platform {
    /// The canonical lowercase name used both in serialization and as an
    /// identity hash token.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Platform::Codeforces => "codeforces",
            Platform::Cses => "cses",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
