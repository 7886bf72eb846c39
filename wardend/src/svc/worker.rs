use tracing::info;

use prople_warden_core::broker::types::QUEUE_NOTIFICATION;
use prople_warden_rpc::Provider;

use crate::errors::WardenError;

/// run_queue drains one queue in this process, `notification` runs the webhook dispatcher
pub async fn run_queue(provider: &Provider, queue: &str) -> Result<(), WardenError> {
    if queue == QUEUE_NOTIFICATION {
        let dispatcher = provider.dispatcher()?;
        let subscription = provider.notifications().await?;
        dispatcher.run(subscription).await;

        info!("notification dispatcher stopped");
        return Ok(());
    }

    let worker = provider.worker(queue)?;
    worker
        .run()
        .await
        .map_err(|err| WardenError::WorkerError(err.to_string()))
}
