use std::future::Future;
use std::time::Duration;

use super::types::HubError;

/// with_deadline bounds a control plane operation by the caller's RPC deadline
///
/// Writes the operation already committed stay committed when the deadline fires
pub async fn with_deadline<T, F>(deadline: Duration, operation: F) -> Result<T, HubError>
where
    F: Future<Output = Result<T, HubError>>,
{
    tokio::time::timeout(deadline, operation)
        .await
        .map_err(|_| HubError::DeadlineExceeded(format!("operation exceeded {:?}", deadline)))?
}
