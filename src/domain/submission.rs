//! Submissions: the crawler's two-phase output.
//!
//! [`CrawledSubmission`] is the coarse record discovery can produce cheaply;
//! [`Submission`] is what finalization yields once the expensive enrichment
//! (source retrieval, paste upload) has been attempted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{hash_tokens, opt_token, Token};

use super::integration::Integration;
use super::problem::Problem;

/// CSES exposes no finer verdict than solved/not-solved; Codeforces' richer
/// verdict set collapses to this same pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Accepted,
    Rejected,
}

impl Verdict {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Verdict::Accepted => "accepted",
            Verdict::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The output of discovery: phase 1, before enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawledSubmission {
    pub id: String,
    pub integration: Integration,
    pub problem: Problem,
    pub verdict: Verdict,
    pub submitted_at: Option<DateTime<Utc>>,
    pub submission_url: Option<String>,
}

impl CrawledSubmission {
    /// Construct a crawled submission, computing its id from the tuple
    /// `(integration.id, problem.id, verdict, submitted_at, submission_url)`.
    ///
    /// Fields absent for the originating platform still contribute a token
    /// (the literal `"None"`), so the id stays stable even when the judge
    /// omits metadata at this phase.
    #[must_use]
    pub fn new(
        integration: Integration,
        problem: Problem,
        verdict: Verdict,
        submitted_at: Option<DateTime<Utc>>,
        submission_url: Option<String>,
    ) -> Self {
        let id = hash_tokens([
            Token::Borrowed(integration.id()),
            Token::Borrowed(problem.id.as_str()),
            Token::Borrowed(verdict.as_str()),
            opt_token(submitted_at.as_ref().map(DateTime::to_rfc3339).as_ref()),
            opt_token(submission_url.as_ref()),
        ]);
        Self {
            id,
            integration,
            problem,
            verdict,
            submitted_at,
            submission_url,
        }
    }
}

/// A [`CrawledSubmission`] enriched by finalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    #[serde(flatten)]
    pub crawled: CrawledSubmission,
    /// Stamped once at creation; invariant across subsequent upserts of the
    /// same id.
    pub first_seen_at: DateTime<Utc>,
    pub raw_code_url: Option<String>,
}

impl Submission {
    /// Wrap a crawled submission as-is, recording `first_seen_at` as now and
    /// leaving `raw_code_url` unset. Used when finalization could not obtain
    /// the source (private submission, upload failure, structural parse
    /// failure that callers chose to tolerate).
    #[must_use]
    pub fn from_crawled(crawled: CrawledSubmission, first_seen_at: DateTime<Utc>) -> Self {
        Self {
            crawled,
            first_seen_at,
            raw_code_url: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.crawled.id
    }
}
