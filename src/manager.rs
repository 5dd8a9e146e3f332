//! The core driver loop: for every integration, discover what's new,
//! finalize it concurrently, and record it — forever, fairly, and without
//! letting one integration's failure touch another's.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::crawler::Crawler;
use crate::domain::{CrawledSubmission, Integration, Platform};
use crate::error::{CrawlerError, PassError};
use crate::store::Store;

pub struct Manager {
    store: Arc<Store>,
    crawlers: HashMap<Platform, Arc<Crawler>>,
    cancellation: CancellationToken,
}

impl Manager {
    #[must_use]
    pub fn new(
        store: Arc<Store>,
        crawlers: HashMap<Platform, Arc<Crawler>>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            store,
            crawlers,
            cancellation,
        }
    }

    /// Run the core loop until cancelled. Never returns under normal
    /// operation: `Store::integrations` is an infinite, fair sequence.
    pub async fn run(&self) {
        let store = Arc::clone(&self.store);
        let mut stream = Box::pin(store.integrations());
        loop {
            tokio::select! {
                () = self.cancellation.cancelled() => {
                    log::info!("manager: shutdown requested, stopping crawl loop");
                    return;
                }
                next = stream.next() => {
                    match next {
                        Some(Ok(integration)) => {
                            if let Err(e) = self.run_one_pass(integration).await {
                                log::error!("pass failed: {e}");
                            }
                        }
                        Some(Err(e)) => log::error!("failed to list integrations: {e}"),
                        None => {
                            log::warn!("manager: integration stream ended unexpectedly");
                            return;
                        }
                    }
                }
            }
        }
    }

    /// One pass over a single integration: discover, finalize concurrently,
    /// dedup, then bump `last_fetch`. A failure anywhere aborts only this
    /// pass — `last_fetch` is left untouched so the next pass retries
    /// naturally.
    async fn run_one_pass(&self, mut integration: Integration) -> Result<(), PassError> {
        let crawler = self
            .crawlers
            .get(&integration.platform())
            .cloned()
            .ok_or_else(|| {
                CrawlerError::Unexpected(format!(
                    "no crawler configured for platform {}",
                    integration.platform()
                ))
            })?;

        let seen: HashSet<String> = self
            .store
            .collected_submission_ids(integration.id())
            .await?
            .into_iter()
            .collect();

        let crawled = crawler.discover(&integration).await?;

        let mut tasks = tokio::task::JoinSet::new();
        for item in crawled {
            if seen.contains(&item.id) {
                continue;
            }
            let crawler = Arc::clone(&crawler);
            let store = Arc::clone(&self.store);
            let integration_id = integration.id().to_string();
            tasks.spawn(async move {
                Self::finalize_and_upsert(crawler, store, integration_id, item).await;
            });
        }

        if !self.drain_or_cancel(tasks).await {
            // a shutdown signal arrived mid-pass; leave last_fetch untouched
            // so the next run picks this integration back up from scratch
            return Ok(());
        }

        integration.mark_fetched(Utc::now());
        self.store.upsert_integration(&integration).await?;
        Ok(())
    }

    /// Drains a pass's in-flight finalizations, aborting every remaining
    /// task the moment a shutdown signal arrives. Returns `true` if the set
    /// drained naturally, `false` if it was cut short by cancellation.
    async fn drain_or_cancel(&self, mut tasks: tokio::task::JoinSet<()>) -> bool {
        loop {
            tokio::select! {
                () = self.cancellation.cancelled() => {
                    log::info!("manager: cancelling {} in-flight finalization(s)", tasks.len());
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                    return false;
                }
                next = tasks.join_next() => {
                    if next.is_none() {
                        return true;
                    }
                }
            }
        }
    }

    /// Finalize a single discovered submission and upsert the result.
    /// Failures here are logged, not propagated: one submission's failure
    /// to finalize must not prevent its siblings from being recorded.
    async fn finalize_and_upsert(
        crawler: Arc<Crawler>,
        store: Arc<Store>,
        integration_id: String,
        crawled: CrawledSubmission,
    ) {
        let mut submission = match crawler.finalize(crawled).await {
            Ok(submission) => submission,
            Err(e) => {
                log::error!("finalize failed: {e}");
                return;
            }
        };

        // first_seen_at is invariant once set; reuse the stored value if
        // this id was already recorded in a previous pass.
        match store.get_submission(submission.id()).await {
            Ok(Some(existing)) => submission.first_seen_at = existing.first_seen_at,
            Ok(None) => {}
            Err(e) => log::error!("store lookup failed for {}: {e}", submission.id()),
        }

        if let Err(e) = store.upsert_submission(&integration_id, &submission).await {
            log::error!("failed to upsert submission {}: {e}", submission.id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CodeforcesIntegration, CsesIntegration};
    use crate::paste::PasteUploader;
    use crate::platforms::codeforces::CodeforcesCrawler;
    use crate::platforms::cses::CsesCrawler;
    use crate::rate_limit::RateLimiter;
    use std::time::Duration;

    fn manager_with(platform: Platform, crawler: Crawler, store: Arc<Store>) -> Manager {
        let mut crawlers = HashMap::new();
        crawlers.insert(platform, Arc::new(crawler));
        Manager::new(store, crawlers, CancellationToken::new())
    }

    fn fast_limiter() -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(1000, Duration::from_millis(1)))
    }

    fn cses_crawler(base_url: &str, paste_base: &str) -> Crawler {
        let jar = Arc::new(reqwest::cookie::Jar::default());
        let paste = Arc::new(PasteUploader::new(reqwest::Client::new()).with_base_url(paste_base));
        Crawler::Cses(
            CsesCrawler::new(jar, fast_limiter(), paste, None, CancellationToken::new())
                .with_base_url(base_url),
        )
    }

    #[tokio::test]
    async fn dedup_skips_refinalizing_already_recorded_submissions() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/problemset/user/7/")
            .with_status(200)
            .with_body(
                r#"<html><body><table>
                    <tr><td><a class="full" href="/problemset/task/1068/">Weird Algorithm</a></td></tr>
                </table></body></html>"#,
            )
            .expect_at_least(2)
            .create_async()
            .await;
        let hack_list = server
            .mock("GET", "/problemset/hack/1068/list/")
            .with_status(200)
            .with_body(
                r#"<html><body><div class="content"><table>
                    <tr><th>#</th><th>user</th><th>link</th></tr>
                    <tr><td>1</td><td>Alice</td><td><a href="/problemset/hack/view/42">view</a></td></tr>
                </table></div></body></html>"#,
            )
            .expect(1)
            .create_async()
            .await;
        server
            .mock("GET", "/problemset/hack/view/42")
            .with_status(200)
            .with_body(
                r#"<html><body><div class="content">
                    <table><tr><td>2024-03-01 12:34:56</td></tr></table>
                    <pre class="prettyprint">print(1)</pre>
                </div></body></html>"#,
            )
            .create_async()
            .await;
        let mut paste_server = mockito::Server::new_async().await;
        paste_server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"url": "https://ity.sh/XYZ"}"#)
            .create_async()
            .await;

        let store = Arc::new(Store::connect("sqlite::memory:").await.unwrap());
        let crawler = cses_crawler(&server.url(), &(paste_server.url() + "/"));
        let manager = manager_with(Platform::Cses, crawler, Arc::clone(&store));

        let integration = Integration::Cses(CsesIntegration::new(7, "alice").unwrap());
        store.upsert_integration(&integration).await.unwrap();

        manager.run_one_pass(integration.clone()).await.unwrap();
        manager.run_one_pass(integration.clone()).await.unwrap();

        let ids = store.collected_submission_ids(integration.id()).await.unwrap();
        assert_eq!(ids.len(), 1, "re-upserting the same id must stay idempotent");
        hack_list.assert_async().await;
    }

    #[tokio::test(start_paused = true)]
    async fn discover_failure_leaves_last_fetch_untouched() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Regex(r"^/api/user\.status.*".into()))
            .with_status(500)
            .create_async()
            .await;
        let paste = Arc::new(PasteUploader::new(reqwest::Client::new()));
        let crawler = Crawler::Codeforces(
            CodeforcesCrawler::new(
                reqwest::Client::new(),
                fast_limiter(),
                fast_limiter(),
                paste,
                CancellationToken::new(),
            )
            .with_base_url(server.url()),
        );

        let store = Arc::new(Store::connect("sqlite::memory:").await.unwrap());
        let manager = manager_with(Platform::Codeforces, crawler, Arc::clone(&store));

        let integration = Integration::Codeforces(CodeforcesIntegration::new("flaky").unwrap());
        store.upsert_integration(&integration).await.unwrap();

        let result = manager.run_one_pass(integration.clone()).await;
        assert!(result.is_err());

        let stored = store.get_integration(integration.id()).await.unwrap().unwrap();
        assert!(stored.last_fetch().is_none(), "a failed pass must not bump last_fetch");
    }

    #[tokio::test]
    async fn one_submissions_finalize_failure_does_not_prevent_its_siblings_from_being_recorded() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/problemset/user/7/")
            .with_status(200)
            .with_body(
                r#"<html><body><table>
                    <tr><td><a class="full" href="/problemset/task/1068/">Weird Algorithm</a></td></tr>
                    <tr><td><a class="full" href="/problemset/task/1083/">Missing Number</a></td></tr>
                </table></body></html>"#,
            )
            .create_async()
            .await;
        // 1068's hack list resolves and finalizes cleanly.
        server
            .mock("GET", "/problemset/hack/1068/list/")
            .with_status(200)
            .with_body(
                r#"<html><body><div class="content"><table>
                    <tr><th>#</th><th>user</th><th>link</th></tr>
                    <tr><td>1</td><td>Alice</td><td><a href="/problemset/hack/view/42">view</a></td></tr>
                </table></div></body></html>"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/problemset/hack/view/42")
            .with_status(200)
            .with_body(
                r#"<html><body><div class="content">
                    <table><tr><td>2024-03-01 12:34:56</td></tr></table>
                    <pre class="prettyprint">print(1)</pre>
                </div></body></html>"#,
            )
            .create_async()
            .await;
        // 1083's hack list page is missing its content div entirely, a
        // page-schema failure that must not touch 1068's result.
        server
            .mock("GET", "/problemset/hack/1083/list/")
            .with_status(200)
            .with_body("<html><body>unexpected layout</body></html>")
            .create_async()
            .await;
        let mut paste_server = mockito::Server::new_async().await;
        paste_server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"url": "https://ity.sh/XYZ"}"#)
            .create_async()
            .await;

        let store = Arc::new(Store::connect("sqlite::memory:").await.unwrap());
        let crawler = cses_crawler(&server.url(), &(paste_server.url() + "/"));
        let manager = manager_with(Platform::Cses, crawler, Arc::clone(&store));

        let integration = Integration::Cses(CsesIntegration::new(7, "alice").unwrap());
        store.upsert_integration(&integration).await.unwrap();

        manager.run_one_pass(integration.clone()).await.unwrap();

        let ids = store.collected_submission_ids(integration.id()).await.unwrap();
        assert_eq!(ids.len(), 1, "only the submission whose finalize succeeded should be recorded");
        let recorded = store.get_submission(&ids[0]).await.unwrap().unwrap();
        assert!(recorded.crawled.problem.problem_url.ends_with("/problemset/task/1068"));
    }

    #[tokio::test]
    async fn fairness_processes_each_integration_independently() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/problemset/user/1/")
            .with_status(200)
            .with_body(
                r#"<html><body><table>
                    <tr><td><a class="zero" href="/problemset/task/1068/">Weird Algorithm</a></td></tr>
                </table></body></html>"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/problemset/user/2/")
            .with_status(200)
            .with_body(
                r#"<html><body><table>
                    <tr><td><a class="zero" href="/problemset/task/1083/">Missing Number</a></td></tr>
                </table></body></html>"#,
            )
            .create_async()
            .await;
        let paste_server = mockito::Server::new_async().await;

        let store = Arc::new(Store::connect("sqlite::memory:").await.unwrap());
        let crawler = cses_crawler(&server.url(), &(paste_server.url() + "/"));
        let manager = manager_with(Platform::Cses, crawler, Arc::clone(&store));

        let alice = Integration::Cses(CsesIntegration::new(1, "alice").unwrap());
        let bob = Integration::Cses(CsesIntegration::new(2, "bob").unwrap());
        store.upsert_integration(&alice).await.unwrap();
        store.upsert_integration(&bob).await.unwrap();

        manager.run_one_pass(alice.clone()).await.unwrap();
        manager.run_one_pass(bob.clone()).await.unwrap();

        let alice_ids = store.collected_submission_ids(alice.id()).await.unwrap();
        let bob_ids = store.collected_submission_ids(bob.id()).await.unwrap();
        assert_eq!(alice_ids.len(), 1);
        assert_eq!(bob_ids.len(), 1);
        assert_ne!(alice_ids[0], bob_ids[0]);

        let alice_fetched = store.get_integration(alice.id()).await.unwrap().unwrap();
        let bob_fetched = store.get_integration(bob.id()).await.unwrap().unwrap();
        assert!(alice_fetched.last_fetch().is_some());
        assert!(bob_fetched.last_fetch().is_some());
    }
}
