//! The platform crawler contract: `discover`, `finalize`, and an optional
//! one-shot `load`. Dispatch is a tagged enum over the two known platforms
//! rather than a trait object, per this crate's preference for enum
//! dispatch over dynamic dispatch on a closed, small variant set — each
//! concrete crawler exposes the same inherent method shapes so the two
//! implementations stay structurally parallel without a formal trait.

use crate::domain::{CrawledSubmission, Integration, Submission};
use crate::error::CrawlerError;
use crate::platforms::codeforces::CodeforcesCrawler;
use crate::platforms::cses::CsesCrawler;

pub enum Crawler {
    Codeforces(CodeforcesCrawler),
    Cses(CsesCrawler),
}

impl Crawler {
    /// One-shot initialization. Codeforces is a no-op; CSES logs in here if
    /// credentials are configured.
    pub async fn load(&mut self) -> Result<(), CrawlerError> {
        match self {
            Crawler::Codeforces(c) => c.load().await,
            Crawler::Cses(c) => c.load().await,
        }
    }

    /// Every submission that currently exists and has not yet been
    /// reported must appear in the returned set; already-reported
    /// submissions may also appear, since dedup is the Manager's job.
    pub async fn discover(
        &self,
        integration: &Integration,
    ) -> Result<Vec<CrawledSubmission>, CrawlerError> {
        match (self, integration) {
            (Crawler::Codeforces(c), Integration::Codeforces(i)) => c.discover(i).await,
            (Crawler::Cses(c), Integration::Cses(i)) => c.discover(i).await,
            _ => Err(CrawlerError::Unexpected(
                "integration platform does not match crawler".to_string(),
            )),
        }
    }

    /// Performs the expensive enrichment exactly once per submission id.
    /// On partial failure, returns a valid `Submission` omitting whatever
    /// could not be obtained rather than failing outright.
    pub async fn finalize(&self, crawled: CrawledSubmission) -> Result<Submission, CrawlerError> {
        match self {
            Crawler::Codeforces(c) => c.finalize(crawled).await,
            Crawler::Cses(c) => c.finalize(crawled).await,
        }
    }
}
