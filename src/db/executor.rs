use std::{future::Future, time::Duration};

use serde::Serialize;
use sqlx::{FromRow, PgPool, postgres::PgRow};
use tracing::{debug, error, warn};

use crate::db::{
    error::{DbError, DbFailure, DbResult},
    statement::Statement,
};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Codes reported when a managed database drops or suspends the connection
const RECONNECTABLE_CODES: &[&str] = &["ECONNRESET", "ENOTFOUND", "ETIMEDOUT"];

const RECONNECTABLE_FRAGMENTS: &[&str] = &[
    "connection terminated",
    "connection closed",
    "connection reset",
    "ssl",
    "timeout",
    "timed out",
];

/// Whether a failure looks like a dropped or suspended connection.
///
/// This is the only place that decides if a failure is worth retrying.
/// Constraint violations, syntax errors and permission errors never match.
pub fn is_reconnectable(failure: &DbFailure) -> bool {
    if let Some(code) = failure.code.as_deref() {
        if RECONNECTABLE_CODES.contains(&code) {
            return true;
        }
    }

    let message = failure.message.to_lowercase();
    RECONNECTABLE_FRAGMENTS
        .iter()
        .any(|fragment| message.contains(fragment))
}

/// Bounded exponential backoff for reconnectable failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Same backoff, different attempt budget
    pub fn with_budget(self, max_attempts: u32) -> Self {
        Self::new(max_attempts, self.base_delay)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait after failed attempt `attempt` (1-based): `base * 2^(attempt-1)`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.checked_mul(factor).unwrap_or(Duration::MAX)
    }

    /// Run `op` until it succeeds, fails with a non-reconnectable error, or
    /// the attempt budget is spent. Attempts are strictly sequential and the
    /// backoff sleep yields to the runtime.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> DbResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        let mut attempt = 1;

        loop {
            debug!(attempt, max_attempts = self.max_attempts, "Executing query");

            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let failure = DbFailure::from(&err);
            let reconnectable = is_reconnectable(&failure);

            if reconnectable && attempt < self.max_attempts {
                let delay = self.backoff_delay(attempt);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    code = failure.code.as_deref().unwrap_or("-"),
                    "Connection-class database failure, retrying: {}",
                    failure.message
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            error!(
                attempt,
                reconnectable,
                code = failure.code.as_deref().unwrap_or("-"),
                "Database query failed: {}",
                failure.message
            );

            return Err(DbError::Query {
                message: failure.message,
                code: failure.code,
                attempts: attempt,
            });
        }
    }
}

/// Rows returned by a successful statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rows<T> {
    pub data: Vec<T>,
    pub row_count: u64,
}

impl<T> Rows<T> {
    pub fn new(data: Vec<T>) -> Self {
        let row_count = data.len() as u64;
        Self { data, row_count }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_first(self) -> Option<T> {
        self.data.into_iter().next()
    }

    /// Treat zero rows as a domain "not found" rather than a success
    pub fn or_not_found(self, message: impl Into<String>) -> DbResult<Self> {
        if self.is_empty() {
            Err(DbError::NotFound(message.into()))
        } else {
            Ok(self)
        }
    }

    pub fn single_or_not_found(self, message: impl Into<String>) -> DbResult<T> {
        self.into_first()
            .ok_or_else(|| DbError::NotFound(message.into()))
    }
}

/// Runs statements against the shared pool through a [`RetryPolicy`].
///
/// Each call checks out a connection for one statement and returns it.
/// Nothing is shared between calls except the pool itself.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    pool: PgPool,
    policy: RetryPolicy,
}

impl QueryExecutor {
    pub fn new(pool: PgPool, policy: RetryPolicy) -> Self {
        Self { pool, policy }
    }

    pub async fn fetch<T>(&self, statement: &Statement) -> DbResult<Rows<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        self.fetch_with_budget(statement, self.policy.max_attempts())
            .await
    }

    pub async fn fetch_with_budget<T>(&self, statement: &Statement, budget: u32) -> DbResult<Rows<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let data = self
            .policy
            .with_budget(budget)
            .run(|| statement.query_as::<T>().fetch_all(&self.pool))
            .await?;

        Ok(Rows::new(data))
    }
}
