//! Integrations: a crawlable (platform, account) pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{hash_tokens, Token};

use super::platform::Platform;

/// A Codeforces account being crawled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeforcesIntegration {
    pub id: String,
    /// 3-30 chars, lowercased at construction time.
    pub handle: String,
    pub last_fetch: Option<DateTime<Utc>>,
}

impl CodeforcesIntegration {
    /// Build a new integration, validating and normalizing `handle`.
    ///
    /// # Errors
    /// Returns an error description if `handle` is outside the 3-30 char
    /// range the judge enforces for usernames.
    pub fn new(handle: &str) -> Result<Self, String> {
        let handle = handle.to_lowercase();
        if !(3..=30).contains(&handle.len()) {
            return Err(format!(
                "codeforces handle must be 3-30 characters, got {}",
                handle.len()
            ));
        }
        let id = hash_tokens([
            Token::Borrowed(Platform::Codeforces.as_str()),
            Token::Borrowed(&handle),
        ]);
        Ok(Self {
            id,
            handle,
            last_fetch: None,
        })
    }
}

/// A CSES account being crawled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsesIntegration {
    pub id: String,
    pub user_number: u32,
    /// 1-16 chars, trimmed; used to match hack-list rows against this user.
    pub handle: String,
    pub last_fetch: Option<DateTime<Utc>>,
}

impl CsesIntegration {
    /// Build a new integration, validating `user_number` and `handle`.
    ///
    /// # Errors
    /// Returns an error description if `user_number` is out of range or
    /// `handle` is empty/too long once trimmed.
    pub fn new(user_number: u32, handle: &str) -> Result<Self, String> {
        if !(1..=10_000_000).contains(&user_number) {
            return Err(format!(
                "cses user_number must be in 1..=10_000_000, got {user_number}"
            ));
        }
        let handle = handle.trim().to_string();
        if !(1..=16).contains(&handle.len()) {
            return Err(format!(
                "cses handle must be 1-16 characters once trimmed, got {}",
                handle.len()
            ));
        }
        let id = hash_tokens([
            Token::Borrowed(Platform::Cses.as_str()),
            Token::Owned(user_number.to_string()),
        ]);
        Ok(Self {
            id,
            user_number,
            handle,
            last_fetch: None,
        })
    }
}

/// A crawlable account on one of the supported judges.
///
/// Tagged by platform rather than dispatched through a trait object, per
/// this crate's preference for enum dispatch over known, closed variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum Integration {
    Codeforces(CodeforcesIntegration),
    Cses(CsesIntegration),
}

impl Integration {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Integration::Codeforces(i) => &i.id,
            Integration::Cses(i) => &i.id,
        }
    }

    #[must_use]
    pub fn platform(&self) -> Platform {
        match self {
            Integration::Codeforces(_) => Platform::Codeforces,
            Integration::Cses(_) => Platform::Cses,
        }
    }

    #[must_use]
    pub fn last_fetch(&self) -> Option<DateTime<Utc>> {
        match self {
            Integration::Codeforces(i) => i.last_fetch,
            Integration::Cses(i) => i.last_fetch,
        }
    }

    /// Bump `last_fetch` to `now`. `last_fetch` is monotonically
    /// non-decreasing; the Manager is the only caller that performs this
    /// mutation, and always with the current time.
    pub fn mark_fetched(&mut self, now: DateTime<Utc>) {
        match self {
            Integration::Codeforces(i) => i.last_fetch = Some(now),
            Integration::Cses(i) => i.last_fetch = Some(now),
        }
    }
}
