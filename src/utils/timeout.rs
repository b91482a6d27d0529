//! Timeout constants and async wrappers.

use crate::error::{BankError, Result};
use std::future::Future;
use std::time::Duration;

/// Default timeout for connects and single round trips
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Close a connection after this long without a request
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// How long shutdown waits for connections to drain
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Run `fut` with a deadline, mapping expiry to `BankError::Timeout`
pub async fn with_timeout_error<F, T>(fut: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(duration, fut)
        .await
        .map_err(|_| BankError::Timeout)?
}
