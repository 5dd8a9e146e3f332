//! A JSON-document store behind a typed key, backed by SQLite.
//!
//! The real production store is a multi-tenant document database; binding
//! to it is explicitly out of scope here. What's kept is the same shape —
//! each collection is a table keyed by `id`, carrying a `platform`
//! discriminator column for filtering and a `body` column holding the
//! entity's JSON serialization — so `Store` is satisfied equally by a
//! production SQLite file or an in-memory `sqlite::memory:` instance in
//! tests.

use std::collections::VecDeque;
use std::time::Duration;

use futures::Stream;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use thiserror::Error;

use crate::domain::{Integration, Submission};

/// How long `integrations()` waits before re-querying an empty table, to
/// avoid busy-looping while no integrations exist yet.
const EMPTY_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("stored document was malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Connect to `database_url` (e.g. `sqlite://cccrawl.db` or
    /// `sqlite::memory:`) and ensure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS integrations (
                id TEXT PRIMARY KEY,
                platform TEXT NOT NULL,
                body TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS submissions (
                id TEXT PRIMARY KEY,
                integration_id TEXT NOT NULL,
                body TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS configs (
                id TEXT PRIMARY KEY,
                body TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_all_integrations(&self) -> Result<Vec<Integration>, StoreError> {
        let rows = sqlx::query("SELECT body FROM integrations ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                let body: String = row.try_get("body")?;
                serde_json::from_str(&body).map_err(StoreError::from)
            })
            .collect()
    }

    /// An infinite, fair sequence of every integration currently present.
    /// Each lap re-queries the table in full, so an integration created
    /// between laps appears no later than the next one.
    pub fn integrations(&self) -> impl Stream<Item = Result<Integration, StoreError>> + '_ {
        futures::stream::unfold(VecDeque::new(), move |mut queue| async move {
            loop {
                if let Some(integration) = queue.pop_front() {
                    return Some((Ok(integration), queue));
                }
                match self.fetch_all_integrations().await {
                    Ok(fresh) => {
                        if fresh.is_empty() {
                            tokio::time::sleep(EMPTY_POLL_INTERVAL).await;
                            continue;
                        }
                        queue = fresh.into_iter().collect();
                    }
                    Err(err) => return Some((Err(err), queue)),
                }
            }
        })
    }

    /// Insert or replace an integration by its id.
    pub async fn upsert_integration(&self, integration: &Integration) -> Result<(), StoreError> {
        let body = serde_json::to_string(integration)?;
        sqlx::query(
            "INSERT OR REPLACE INTO integrations (id, platform, body) VALUES (?, ?, ?)",
        )
        .bind(integration.id())
        .bind(integration.platform().as_str())
        .bind(body)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert or replace a submission by its id. Callers are responsible
    /// for preserving `first_seen_at` across re-upserts of an existing id
    /// (see [`crate::manager`]); the store performs a blind replace.
    pub async fn upsert_submission(
        &self,
        integration_id: &str,
        submission: &Submission,
    ) -> Result<(), StoreError> {
        let body = serde_json::to_string(submission)?;
        sqlx::query(
            "INSERT OR REPLACE INTO submissions (id, integration_id, body) VALUES (?, ?, ?)",
        )
        .bind(submission.id())
        .bind(integration_id)
        .bind(body)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Every submission id previously recorded under `integration_id`.
    pub async fn collected_submission_ids(
        &self,
        integration_id: &str,
    ) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT id FROM submissions WHERE integration_id = ?")
            .bind(integration_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| row.try_get::<String, _>("id").map_err(StoreError::from))
            .collect()
    }

    /// Fetch a previously stored integration, if any exists under `id`.
    pub async fn get_integration(&self, id: &str) -> Result<Option<Integration>, StoreError> {
        let row = sqlx::query("SELECT body FROM integrations WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let body: String = row.try_get("body")?;
                Ok(Some(serde_json::from_str(&body)?))
            }
            None => Ok(None),
        }
    }

    /// Fetch a previously stored submission, if any exists under `id`. Used
    /// by the Manager to preserve `first_seen_at` across re-upserts.
    pub async fn get_submission(&self, id: &str) -> Result<Option<Submission>, StoreError> {
        let row = sqlx::query("SELECT body FROM submissions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let body: String = row.try_get("body")?;
                Ok(Some(serde_json::from_str(&body)?))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CodeforcesIntegration, CrawledSubmission, Problem, Verdict};
    use chrono::Utc;
    use futures::StreamExt;

    async fn memory_store() -> Store {
        Store::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn upsert_then_collected_ids_round_trips() {
        let store = memory_store().await;
        let integration =
            Integration::Codeforces(CodeforcesIntegration::new("tourist").unwrap());
        store.upsert_integration(&integration).await.unwrap();

        let crawled = CrawledSubmission::new(
            integration.clone(),
            Problem::new("https://codeforces.com/contest/4/problem/A"),
            Verdict::Accepted,
            None,
            None,
        );
        let submission = Submission::from_crawled(crawled, Utc::now());
        store
            .upsert_submission(integration.id(), &submission)
            .await
            .unwrap();

        let ids = store.collected_submission_ids(integration.id()).await.unwrap();
        assert_eq!(ids, vec![submission.id().to_string()]);
    }

    #[tokio::test]
    async fn upsert_is_idempotent_by_id() {
        let store = memory_store().await;
        let integration =
            Integration::Codeforces(CodeforcesIntegration::new("tourist").unwrap());
        store.upsert_integration(&integration).await.unwrap();
        store.upsert_integration(&integration).await.unwrap();

        let ids = store.fetch_all_integrations().await.unwrap();
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn integrations_stream_yields_every_row_each_lap() {
        let store = memory_store().await;
        let a = Integration::Codeforces(CodeforcesIntegration::new("alice").unwrap());
        let b = Integration::Codeforces(CodeforcesIntegration::new("burunduk1").unwrap());
        store.upsert_integration(&a).await.unwrap();
        store.upsert_integration(&b).await.unwrap();

        let first_lap: Vec<_> = store
            .integrations()
            .take(2)
            .map(|r| r.unwrap().id().to_string())
            .collect()
            .await;
        assert_eq!(first_lap.len(), 2);
        assert!(first_lap.contains(&a.id().to_string()));
        assert!(first_lap.contains(&b.id().to_string()));
    }
}
