//! Timeout constants and async wrappers.
//!
//! The constants feed the configuration defaults; the wrapper maps an
//! elapsed deadline onto [`ProtocolError::Timeout`].

use std::future::Future;
use std::time::Duration;

use crate::error::{ProtocolError, Result};

/// Default timeout for connects and blocking reads.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on graceful shutdown drains.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Run `fut` to completion or fail with [`ProtocolError::Timeout`].
pub async fn with_timeout<F, T>(duration: Duration, fut: F) -> Result<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, fut)
        .await
        .map_err(|_| ProtocolError::Timeout)
}
