//! The Codeforces crawler: a JSON submissions API for discovery, an HTML
//! submission page for finalization.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::backoff::{with_backoff, Schedule};
use crate::domain::{CodeforcesIntegration, CrawledSubmission, Integration, Problem, Verdict};
use crate::error::CrawlerError;
use crate::paste::PasteUploader;
use crate::rate_limit::RateLimiter;

const DISCOVER_CAP: Duration = Duration::from_secs(120);
const FINALIZE_CAP: Duration = Duration::from_secs(600);

#[derive(Deserialize)]
struct ApiResponse<T> {
    status: String,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Deserialize)]
struct ApiSubmission {
    id: i64,
    #[serde(rename = "contestId")]
    contest_id: i64,
    #[serde(rename = "creationTimeSeconds")]
    creation_time_seconds: i64,
    verdict: Option<String>,
    problem: ApiProblem,
}

#[derive(Deserialize)]
struct ApiProblem {
    index: String,
}

pub struct CodeforcesCrawler {
    client: reqwest::Client,
    /// A client identical to `client` except it never follows redirects —
    /// a 302 on the submission page is the "not public" signal, which a
    /// redirect-following client would otherwise swallow.
    no_redirect_client: reqwest::Client,
    api_limiter: Arc<RateLimiter>,
    html_limiter: Arc<RateLimiter>,
    paste: Arc<PasteUploader>,
    cancellation: CancellationToken,
    base_url: String,
}

impl CodeforcesCrawler {
    /// # Panics
    /// If a redirect-disabled client cannot be constructed from `client`'s
    /// configuration (only possible if the platform's TLS backend is
    /// unavailable, which would already have made `client` unusable).
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        api_limiter: Arc<RateLimiter>,
        html_limiter: Arc<RateLimiter>,
        paste: Arc<PasteUploader>,
        cancellation: CancellationToken,
    ) -> Self {
        let no_redirect_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("failed to build non-redirecting http client");
        Self {
            client,
            no_redirect_client,
            api_limiter,
            html_limiter,
            paste,
            cancellation,
            base_url: "https://codeforces.com".to_string(),
        }
    }

    /// Override the judge's base URL. Exists for tests to point the
    /// crawler at a local mock server instead of the real site.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// No one-shot initialization is needed for Codeforces; present only to
    /// keep [`crate::crawler::Crawler::load`]'s dispatch structurally
    /// parallel with CSES.
    pub async fn load(&mut self) -> Result<(), CrawlerError> {
        Ok(())
    }

    async fn fetch_status(&self, handle: &str) -> Result<Vec<ApiSubmission>, CrawlerError> {
        self.api_limiter.acquire(&self.cancellation).await?;
        let url = format!("{}/api/user.status?handle={handle}&from=1", self.base_url);
        let response = self.client.get(&url).send().await?;
        if response.status().as_u16() == 400 {
            return Err(CrawlerError::MisconfiguredHandle(handle.to_string()));
        }
        let response = response.error_for_status()?;
        let parsed: ApiResponse<Vec<ApiSubmission>> = response.json().await?;
        if parsed.status != "OK" {
            return Err(CrawlerError::MisconfiguredHandle(
                parsed.comment.unwrap_or_else(|| "unknown failure".to_string()),
            ));
        }
        Ok(parsed.result.unwrap_or_default())
    }

    fn to_crawled(&self, integration: &CodeforcesIntegration, raw: ApiSubmission) -> CrawledSubmission {
        let kind = if raw.contest_id > 100_000 { "gym" } else { "contest" };
        let problem_url =
            format!("https://codeforces.com/{kind}/{}/problem/{}", raw.contest_id, raw.problem.index);
        let submission_url =
            format!("https://codeforces.com/{kind}/{}/submission/{}", raw.contest_id, raw.id);
        let verdict = if raw.verdict.as_deref() == Some("OK") {
            Verdict::Accepted
        } else {
            Verdict::Rejected
        };
        let submitted_at = DateTime::<Utc>::from_timestamp(raw.creation_time_seconds, 0);

        CrawledSubmission::new(
            Integration::Codeforces(integration.clone()),
            Problem::new(problem_url),
            verdict,
            submitted_at,
            Some(submission_url),
        )
    }

    pub async fn discover(
        &self,
        integration: &CodeforcesIntegration,
    ) -> Result<Vec<CrawledSubmission>, CrawlerError> {
        let handle = integration.handle.clone();
        let raw = with_backoff(Schedule::default_exponential(), DISCOVER_CAP, &self.cancellation, || {
            let handle = handle.clone();
            async move { self.fetch_status(&handle).await }
        })
        .await?;

        Ok(raw.into_iter().map(|s| self.to_crawled(integration, s)).collect())
    }

    async fn fetch_submission_page(&self, url: &str) -> Result<Option<String>, CrawlerError> {
        self.html_limiter.acquire(&self.cancellation).await?;
        let response = self.no_redirect_client.get(url).send().await?;
        if response.status().is_redirection() {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        Ok(Some(response.text().await?))
    }

    fn extract_source(html: &str) -> Result<String, CrawlerError> {
        let document = scraper::Html::parse_document(html);
        let selector = scraper::Selector::parse("pre#program-source-text")
            .map_err(|e| CrawlerError::Unexpected(e.to_string()))?;
        let element = document.select(&selector).next().ok_or_else(|| {
            CrawlerError::PageSchema("missing <pre id=\"program-source-text\">".to_string())
        })?;
        let raw: String = element.text().collect();
        Ok(html_escape::decode_html_entities(&raw).into_owned())
    }

    pub async fn finalize(
        &self,
        crawled: CrawledSubmission,
    ) -> Result<crate::domain::Submission, CrawlerError> {
        use crate::domain::Submission;

        let now = Utc::now();
        let Some(submission_url) = crawled.submission_url.clone() else {
            return Ok(Submission::from_crawled(crawled, now));
        };

        let html = with_backoff(Schedule::CodeforcesHtml, FINALIZE_CAP, &self.cancellation, || {
            let url = submission_url.clone();
            async move { self.fetch_submission_page(&url).await }
        })
        .await?;

        let Some(html) = html else {
            // 302: running contest / gym, submission isn't public
            return Ok(Submission::from_crawled(crawled, now));
        };

        let source = Self::extract_source(&html)?;
        let mut submission = Submission::from_crawled(crawled, now);
        if let Ok(paste_url) = self.paste.upload(&source).await {
            submission.raw_code_url = Some(paste_url);
        }
        Ok(submission)
    }
}
