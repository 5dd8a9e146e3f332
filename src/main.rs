//! Process entry point: build the shared HTTP client, the platform
//! crawlers, and the store, then run the manager loop until a shutdown
//! signal arrives.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cccrawl::domain::Platform;
use cccrawl::platforms::codeforces::CodeforcesCrawler;
use cccrawl::platforms::cses::CsesCrawler;
use cccrawl::rate_limit::RateLimiter;
use cccrawl::paste::PasteUploader;
use cccrawl::{Config, Crawler, Manager, Store};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;
    log::info!("starting cccrawl in {} environment", config.env_name);

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://cccrawl.db".to_string());
    let store = Arc::new(
        Store::connect(&database_url)
            .await
            .context("failed to connect to the store")?,
    );

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("failed to build http client")?;
    let cses_jar = Arc::new(reqwest::cookie::Jar::default());
    let paste = Arc::new(PasteUploader::new(http_client.clone()));

    let cf_api_limiter = Arc::new(RateLimiter::new(3, Duration::from_secs(3)));
    let cf_html_limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(10)));
    let cses_limiter = Arc::new(RateLimiter::new(3, Duration::from_secs(5)));
    let cancellation = CancellationToken::new();

    let mut codeforces = Crawler::Codeforces(CodeforcesCrawler::new(
        http_client.clone(),
        cf_api_limiter,
        cf_html_limiter,
        paste.clone(),
        cancellation.clone(),
    ));
    let mut cses = Crawler::Cses(CsesCrawler::new(
        cses_jar,
        cses_limiter,
        paste,
        config.cses_credentials(),
        cancellation.clone(),
    ));

    codeforces.load().await.context("codeforces init failed")?;
    if let Err(e) = cses.load().await {
        log::error!("cses login failed, continuing in anonymous mode: {e}");
    }

    let mut crawlers = HashMap::new();
    crawlers.insert(Platform::Codeforces, Arc::new(codeforces));
    crawlers.insert(Platform::Cses, Arc::new(cses));

    let manager = Manager::new(store, crawlers, cancellation.clone());

    let shutdown = {
        let cancellation = cancellation.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("received ctrl-c, shutting down");
                cancellation.cancel();
            }
        }
    };

    tokio::select! {
        () = manager.run() => {}
        () = shutdown => {}
    }

    Ok(())
}
