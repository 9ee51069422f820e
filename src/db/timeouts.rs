//! Database query timeout helpers
//!
//! Provides timeout wrappers for database operations to prevent indefinite hangs.

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use super::errors::{StorageError, StorageResult};

/// Default timeout for database queries (5 seconds)
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for transactions (10 seconds)
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Execute a storage operation with a deadline
///
/// Accepts either raw `sqlx` futures or futures that already produce
/// [`StorageError`].
///
/// # Example
///
/// ```no_run
/// use academy_tournaments::db::timeouts::{with_timeout, DEFAULT_QUERY_TIMEOUT};
/// # use sqlx::PgPool;
/// # async fn example(pool: &PgPool) -> Result<(), Box<dyn std::error::Error>> {
///
/// let row = with_timeout(
///     DEFAULT_QUERY_TIMEOUT,
///     sqlx::query("SELECT status FROM tournaments WHERE id = $1")
///         .bind(1_i64)
///         .fetch_optional(pool),
/// )
/// .await?;
///
/// # Ok(())
/// # }
/// ```
pub async fn with_timeout<F, T, E>(duration: Duration, future: F) -> StorageResult<T>
where
    F: Future<Output = Result<T, E>>,
    E: Into<StorageError>,
{
    match timeout(duration, future).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(StorageError::Timeout(duration)),
    }
}

/// Execute a single query with the default timeout (5 seconds)
pub async fn with_default_timeout<F, T, E>(future: F) -> StorageResult<T>
where
    F: Future<Output = Result<T, E>>,
    E: Into<StorageError>,
{
    with_timeout(DEFAULT_QUERY_TIMEOUT, future).await
}

/// Execute a multi-statement transaction with the transaction timeout (10 seconds)
pub async fn with_transaction_timeout<F, T, E>(future: F) -> StorageResult<T>
where
    F: Future<Output = Result<T, E>>,
    E: Into<StorageError>,
{
    with_timeout(DEFAULT_TRANSACTION_TIMEOUT, future).await
}
