use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnection, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::time::Duration;
use uuid::Uuid;

use crate::models::{AttemptStatus, AttemptSummary, MatchingAttempt, MatchingGroup};
use crate::services::ledger::{AttemptLedger, LedgerError};

/// How often a commit retries the per-event lock before giving up
#[derive(Debug, Clone, Copy)]
pub struct LockRetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl Default for LockRetryPolicy {
    fn default() -> Self {
        Self {
            retries: 5,
            delay: Duration::from_millis(50),
        }
    }
}

/// Ownership of one event's commit lock
///
/// Wraps the transaction holding `pg_advisory_xact_lock` for the event. The
/// lock is released when the transaction commits or rolls back, so it can
/// never outlive the write it protects.
pub struct EventCommitLock {
    event_id: String,
    tx: Transaction<'static, Postgres>,
}

impl EventCommitLock {
    pub fn event_id(&self) -> &str {
        &self.event_id
    }
}

/// PostgreSQL attempt ledger
///
/// Attempts and their groups live in `matching_attempts` and
/// `matching_groups`. A partial unique index keeps at most one committed
/// attempt per event even if two writers bypass the advisory lock.
pub struct PostgresLedger {
    pool: PgPool,
    lock_retry: LockRetryPolicy,
}

impl PostgresLedger {
    /// Create a new ledger from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, LedgerError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self {
            pool,
            lock_retry: LockRetryPolicy::default(),
        })
    }

    /// Create a new ledger from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, LedgerError> {
        tracing::info!("Connecting to PostgreSQL ledger");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }

    pub fn with_lock_retry(mut self, lock_retry: LockRetryPolicy) -> Self {
        self.lock_retry = lock_retry;
        self
    }

    /// Acquire the commit lock of an event
    ///
    /// Uses `pg_try_advisory_xact_lock` so a busy event never blocks a pool
    /// connection indefinitely; retries with linear backoff and reports
    /// `Conflict` once the retry budget is spent.
    pub async fn acquire_commit_lock(&self, event_id: &str) -> Result<EventCommitLock, LedgerError> {
        for attempt in 0..=self.lock_retry.retries {
            let mut tx = self.pool.begin().await?;

            let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_xact_lock(hashtextextended($1, 0))")
                .bind(event_id)
                .fetch_one(&mut *tx)
                .await?;

            if acquired {
                return Ok(EventCommitLock {
                    event_id: event_id.to_string(),
                    tx,
                });
            }

            tx.rollback().await?;

            if attempt < self.lock_retry.retries {
                tracing::debug!(
                    "Commit lock for event {} busy, retry {}/{}",
                    event_id,
                    attempt + 1,
                    self.lock_retry.retries
                );
                tokio::time::sleep(self.lock_retry.delay * (attempt + 1)).await;
            }
        }

        tracing::warn!("Gave up acquiring commit lock for event {}", event_id);
        Err(LedgerError::Conflict(event_id.to_string()))
    }

    /// Mark the event's committed attempt as superseded while holding its lock
    pub async fn supersede_committed(&self, lock: &mut EventCommitLock) -> Result<u64, LedgerError> {
        let query = r#"
            UPDATE matching_attempts
            SET status = 'superseded', superseded_at = NOW()
            WHERE event_id = $1 AND status = 'committed'
        "#;

        let result = sqlx::query(query)
            .bind(&lock.event_id)
            .execute(&mut *lock.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn load_groups(&self, attempt_id: Uuid) -> Result<Vec<MatchingGroup>, LedgerError> {
        let query = r#"
            SELECT table_number, member_ids, score
            FROM matching_groups
            WHERE attempt_id = $1
            ORDER BY table_number
        "#;

        let rows = sqlx::query(query).bind(attempt_id).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| -> Result<MatchingGroup, LedgerError> {
                let table_number: i32 = row.try_get("table_number")?;
                let member_ids: Json<Vec<String>> = row.try_get("member_ids")?;
                Ok(MatchingGroup {
                    table_number: table_number as u32,
                    member_ids: member_ids.0,
                    score: row.try_get("score")?,
                })
            })
            .collect()
    }
}

/// Insert an attempt row and its groups on an open connection
async fn insert_attempt(conn: &mut PgConnection, attempt: &MatchingAttempt) -> Result<(), LedgerError> {
    let query = r#"
        INSERT INTO matching_attempts (id, event_id, status, triggered_by, created_at, unmatched)
        VALUES ($1, $2, $3, $4, $5, $6)
    "#;

    sqlx::query(query)
        .bind(attempt.attempt_id)
        .bind(&attempt.event_id)
        .bind(attempt.status.as_str())
        .bind(&attempt.triggered_by)
        .bind(attempt.created_at)
        .bind(Json(&attempt.unmatched))
        .execute(&mut *conn)
        .await?;

    for group in &attempt.groups {
        sqlx::query(
            r#"
            INSERT INTO matching_groups (attempt_id, table_number, member_ids, score)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(attempt.attempt_id)
        .bind(group.table_number as i32)
        .bind(Json(&group.member_ids))
        .bind(group.score)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Map unique violations on the committed index to a commit conflict
fn conflict_on_unique(event_id: &str, err: LedgerError) -> LedgerError {
    match err {
        LedgerError::SqlxError(sqlx::Error::Database(ref db)) if db.is_unique_violation() => {
            LedgerError::Conflict(event_id.to_string())
        }
        other => other,
    }
}

#[async_trait]
impl AttemptLedger for PostgresLedger {
    async fn commit_attempt(&self, mut attempt: MatchingAttempt) -> Result<MatchingAttempt, LedgerError> {
        let mut lock = self.acquire_commit_lock(&attempt.event_id).await?;

        attempt.status = AttemptStatus::Committed;
        attempt.created_at = Utc::now();

        let superseded = self.supersede_committed(&mut lock).await?;

        insert_attempt(&mut lock.tx, &attempt)
            .await
            .map_err(|e| conflict_on_unique(&attempt.event_id, e))?;

        lock.tx
            .commit()
            .await
            .map_err(|e| conflict_on_unique(&attempt.event_id, e.into()))?;

        tracing::debug!(
            "Committed attempt {} for event {} ({} superseded)",
            attempt.attempt_id,
            attempt.event_id,
            superseded
        );

        Ok(attempt)
    }

    async fn record_preview(&self, attempt: &MatchingAttempt) -> Result<(), LedgerError> {
        let mut preview = attempt.clone();
        preview.status = AttemptStatus::Preview;

        let mut tx = self.pool.begin().await?;
        insert_attempt(&mut tx, &preview).await?;
        tx.commit().await?;

        Ok(())
    }

    async fn current_attempt_id(&self, event_id: &str) -> Result<Option<Uuid>, LedgerError> {
        let query = r#"
            SELECT id
            FROM matching_attempts
            WHERE event_id = $1 AND status = 'committed'
        "#;

        let row = sqlx::query(query).bind(event_id).fetch_optional(&self.pool).await?;

        Ok(match row {
            Some(row) => Some(row.try_get("id")?),
            None => None,
        })
    }

    async fn load_attempt(&self, attempt_id: Uuid) -> Result<Option<MatchingAttempt>, LedgerError> {
        let query = r#"
            SELECT id, event_id, status, triggered_by, created_at, unmatched
            FROM matching_attempts
            WHERE id = $1
        "#;

        let Some(row) = sqlx::query(query).bind(attempt_id).fetch_optional(&self.pool).await? else {
            return Ok(None);
        };

        let status: String = row.try_get("status")?;
        let status = status.parse::<AttemptStatus>().map_err(LedgerError::Corrupt)?;
        let unmatched: Json<Vec<String>> = row.try_get("unmatched")?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;

        Ok(Some(MatchingAttempt {
            attempt_id: row.try_get("id")?,
            event_id: row.try_get("event_id")?,
            created_at,
            triggered_by: row.try_get("triggered_by")?,
            status,
            groups: self.load_groups(attempt_id).await?,
            unmatched: unmatched.0,
        }))
    }

    async fn history(&self, event_id: &str) -> Result<Vec<AttemptSummary>, LedgerError> {
        let query = r#"
            SELECT
                a.id,
                a.status,
                a.triggered_by,
                a.created_at,
                jsonb_array_length(a.unmatched) AS unmatched_count,
                (SELECT COUNT(*) FROM matching_groups g WHERE g.attempt_id = a.id) AS group_count
            FROM matching_attempts a
            WHERE a.event_id = $1
            ORDER BY a.sequence DESC
        "#;

        let rows = sqlx::query(query).bind(event_id).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| -> Result<AttemptSummary, LedgerError> {
                let status: String = row.try_get("status")?;
                let unmatched_count: i32 = row.try_get("unmatched_count")?;
                let group_count: i64 = row.try_get("group_count")?;
                Ok(AttemptSummary {
                    attempt_id: row.try_get("id")?,
                    created_at: row.try_get("created_at")?,
                    status: status.parse().map_err(LedgerError::Corrupt)?,
                    triggered_by: row.try_get("triggered_by")?,
                    group_count: group_count as usize,
                    unmatched_count: unmatched_count as usize,
                })
            })
            .collect()
    }

    /// Health check for the database connection
    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}
