//! The CSES crawler: no submissions API exists, so an authenticated
//! session is used to scrape each problem's "hack list" for the user's own
//! accepted submissions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use scraper::{ElementRef, Html, Selector};
use tokio_util::sync::CancellationToken;

use crate::backoff::{with_backoff, Schedule};
use crate::domain::{CrawledSubmission, CsesIntegration, Integration, Problem, Submission, Verdict};
use crate::error::CrawlerError;
use crate::paste::PasteUploader;
use crate::rate_limit::RateLimiter;

const CAP: Duration = Duration::from_secs(120);

pub struct CsesCredentials {
    pub username: String,
    pub password: String,
}

pub struct CsesCrawler {
    client: reqwest::Client,
    no_redirect_client: reqwest::Client,
    limiter: Arc<RateLimiter>,
    paste: Arc<PasteUploader>,
    credentials: Option<CsesCredentials>,
    authenticated: AtomicBool,
    cancellation: CancellationToken,
    base_url: String,
}

impl CsesCrawler {
    /// `jar` must be shared with any other client the caller builds against
    /// CSES, so the `PHPSESSID` cookie set during login is visible to both
    /// the redirect-following and redirect-disabled clients here.
    #[must_use]
    pub fn new(
        jar: Arc<reqwest::cookie::Jar>,
        limiter: Arc<RateLimiter>,
        paste: Arc<PasteUploader>,
        credentials: Option<CsesCredentials>,
        cancellation: CancellationToken,
    ) -> Self {
        let client = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .build()
            .expect("failed to build http client");
        let no_redirect_client = reqwest::Client::builder()
            .cookie_provider(jar)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("failed to build non-redirecting http client");
        Self {
            client,
            no_redirect_client,
            limiter,
            paste,
            credentials,
            authenticated: AtomicBool::new(false),
            cancellation,
            base_url: "https://cses.fi".to_string(),
        }
    }

    /// Override the judge's base URL. Exists for tests to point the
    /// crawler at a local mock server instead of the real site.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Log in if credentials were supplied, leaving the crawler in
    /// anonymous mode (finalize degrades gracefully) otherwise. Both the
    /// CSRF fetch and the login POST go through the shared limiter and
    /// backoff, like every other request this crawler makes.
    pub async fn load(&mut self) -> Result<(), CrawlerError> {
        let Some(creds) = self.credentials.as_ref() else {
            log::info!("cses: no credentials configured, running anonymously");
            return Ok(());
        };
        let username = creds.username.clone();
        let password = creds.password.clone();

        let csrf_token = with_backoff(Schedule::default_exponential(), CAP, &self.cancellation, || {
            self.fetch_csrf_token()
        })
        .await?;

        let response = with_backoff(Schedule::default_exponential(), CAP, &self.cancellation, || {
            let csrf_token = csrf_token.clone();
            let username = username.clone();
            let password = password.clone();
            async move {
                self.limiter.acquire(&self.cancellation).await?;
                self.no_redirect_client
                    .post(format!("{}/login", self.base_url))
                    .form(&[
                        ("csrf_token", csrf_token.as_str()),
                        ("nick", username.as_str()),
                        ("pass", password.as_str()),
                    ])
                    .send()
                    .await
                    .map_err(CrawlerError::from)
            }
        })
        .await?;

        if response.status().as_u16() != 302 {
            return Err(CrawlerError::LoginFailed(format!(
                "expected a 302 redirect on successful login, got {}",
                response.status()
            )));
        }

        self.authenticated.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_csrf_token(&self) -> Result<String, CrawlerError> {
        self.limiter.acquire(&self.cancellation).await?;
        let response = self
            .client
            .get(format!("{}/login", self.base_url))
            .send()
            .await?
            .error_for_status()?;
        let html = response.text().await?;
        let document = Html::parse_document(&html);
        let selector = Selector::parse(r#"input[name="csrf_token"]"#)
            .map_err(|e| CrawlerError::Unexpected(e.to_string()))?;
        document
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr("value"))
            .map(str::to_string)
            .ok_or_else(|| CrawlerError::PageSchema("missing csrf_token input on /login".to_string()))
    }

    async fn fetch_text(&self, url: &str) -> Result<String, CrawlerError> {
        self.limiter.acquire(&self.cancellation).await?;
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    pub async fn discover(
        &self,
        integration: &CsesIntegration,
    ) -> Result<Vec<CrawledSubmission>, CrawlerError> {
        let url = format!("{}/problemset/user/{}/", self.base_url, integration.user_number);
        let html = with_backoff(Schedule::default_exponential(), CAP, &self.cancellation, || {
            let url = url.clone();
            async move { self.fetch_text(&url).await }
        })
        .await?;

        let document = Html::parse_document(&html);
        let table_selector =
            Selector::parse("table").map_err(|e| CrawlerError::Unexpected(e.to_string()))?;
        let table = document
            .select(&table_selector)
            .next()
            .ok_or(CrawlerError::UnknownUser)?;

        let link_selector = Selector::parse("a.full, a.zero")
            .map_err(|e| CrawlerError::Unexpected(e.to_string()))?;

        let mut crawled = Vec::new();
        for link in table.select(&link_selector) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let class = link.value().attr("class").unwrap_or_default();
            let verdict = if class.split_whitespace().any(|c| c == "full") {
                Verdict::Accepted
            } else {
                Verdict::Rejected
            };
            let problem_url = format!("{}{}", self.base_url, href.trim_end_matches('/'));
            crawled.push(CrawledSubmission::new(
                Integration::Cses(integration.clone()),
                Problem::new(problem_url),
                verdict,
                None,
                None,
            ));
        }
        Ok(crawled)
    }

    fn logged_out(document: &Html) -> Result<bool, CrawlerError> {
        let selector = Selector::parse(r#"a[href="/logout"]"#)
            .map_err(|e| CrawlerError::Unexpected(e.to_string()))?;
        Ok(document.select(&selector).next().is_none())
    }

    async fn resolve_hack_list_match(
        &self,
        task_id: &str,
        handle: &str,
    ) -> Result<Option<String>, CrawlerError> {
        let url = format!("{}/problemset/hack/{task_id}/list/", self.base_url);
        let html = with_backoff(Schedule::default_exponential(), CAP, &self.cancellation, || {
            let url = url.clone();
            async move { self.fetch_text(&url).await }
        })
        .await?;

        let document = Html::parse_document(&html);
        let content_selector =
            Selector::parse("div.content").map_err(|e| CrawlerError::Unexpected(e.to_string()))?;
        let Some(content) = document.select(&content_selector).next() else {
            return Err(CrawlerError::PageSchema("missing div.content on hack list page".to_string()));
        };

        let table_selector =
            Selector::parse("table").map_err(|e| CrawlerError::Unexpected(e.to_string()))?;
        let Some(table) = content.select(&table_selector).next() else {
            if Self::logged_out(&document)? {
                log::warn!("cses: session appears to have expired while reading hack list");
            }
            return Ok(None);
        };

        let row_selector = Selector::parse("tr").map_err(|e| CrawlerError::Unexpected(e.to_string()))?;
        let cell_selector = Selector::parse("td").map_err(|e| CrawlerError::Unexpected(e.to_string()))?;
        let link_selector = Selector::parse("a[href]").map_err(|e| CrawlerError::Unexpected(e.to_string()))?;

        for row in table.select(&row_selector) {
            let cells: Vec<ElementRef> = row.select(&cell_selector).collect();
            if cells.is_empty() {
                continue; // header row
            }
            let Some(username_cell) = cells.get(1) else {
                continue;
            };
            let username: String = username_cell.text().collect();
            if username.trim().eq_ignore_ascii_case(handle.trim()) {
                let Some(last_cell) = cells.last() else {
                    continue;
                };
                if let Some(href) = last_cell.select(&link_selector).next().and_then(|a| a.value().attr("href")) {
                    return Ok(Some(format!("{}{}", self.base_url, href)));
                }
            }
        }
        Ok(None)
    }

    /// Fetches the hack submission page and pulls out whatever it can.
    /// `submitted_at` and `source` are independent: the page schema could
    /// regress on either one without the other becoming unobtainable, so
    /// each is its own `Option` rather than collapsing both to `None`
    /// whenever just one is missing.
    async fn fetch_hack_submission(
        &self,
        url: &str,
    ) -> Result<(Option<DateTime<Utc>>, Option<String>), CrawlerError> {
        let html = with_backoff(Schedule::default_exponential(), CAP, &self.cancellation, || {
            let url = url.to_string();
            async move { self.fetch_text(&url).await }
        })
        .await?;

        let document = Html::parse_document(&html);
        let content_selector =
            Selector::parse("div.content").map_err(|e| CrawlerError::Unexpected(e.to_string()))?;
        let Some(content) = document.select(&content_selector).next() else {
            return Err(CrawlerError::PageSchema("missing div.content on hack submission page".to_string()));
        };

        let cell_selector = Selector::parse("td").map_err(|e| CrawlerError::Unexpected(e.to_string()))?;
        let naive_submitted_at = content.select(&cell_selector).find_map(|cell| {
            let text: String = cell.text().collect();
            let text = text.trim();
            NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").ok()
        });
        let submitted_at = match naive_submitted_at {
            Some(naive) => Some(
                Local
                    .from_local_datetime(&naive)
                    .single()
                    .ok_or_else(|| CrawlerError::Unexpected("ambiguous local submission timestamp".to_string()))?
                    .with_timezone(&Utc),
            ),
            None => None,
        };

        let pre_selector =
            Selector::parse("pre.prettyprint").map_err(|e| CrawlerError::Unexpected(e.to_string()))?;
        let source = content
            .select(&pre_selector)
            .next()
            .map(|pre| pre.text().collect::<String>())
            .map(|raw| html_escape::decode_html_entities(&raw).into_owned());

        Ok((submitted_at, source))
    }

    pub async fn finalize(&self, crawled: CrawledSubmission) -> Result<Submission, CrawlerError> {
        let now = Utc::now();
        if crawled.verdict == Verdict::Rejected {
            return Ok(Submission::from_crawled(crawled, now));
        }
        if !self.authenticated.load(Ordering::SeqCst) {
            log::debug!("cses: finalizing without an authenticated session; hack list may be unreadable");
        }

        let Integration::Cses(integration) = &crawled.integration else {
            return Err(CrawlerError::Unexpected(
                "cses finalize called with a non-cses integration".to_string(),
            ));
        };
        let task_id = crawled
            .problem
            .problem_url
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();

        let Some(submission_url) = self.resolve_hack_list_match(&task_id, &integration.handle).await? else {
            log::info!("cses: no hack-list entry matched handle {}", integration.handle);
            return Ok(Submission::from_crawled(crawled, now));
        };

        let (submitted_at, source) = self.fetch_hack_submission(&submission_url).await?;
        let mut submission = Submission::from_crawled(crawled, now);
        submission.crawled.submission_url = Some(submission_url);

        if let Some(submitted_at) = submitted_at {
            submission.crawled.submitted_at = Some(submitted_at);
        }
        if let Some(source) = source {
            if let Ok(paste_url) = self.paste.upload(&source).await {
                submission.raw_code_url = Some(paste_url);
            }
        }
        Ok(submission)
    }
}
