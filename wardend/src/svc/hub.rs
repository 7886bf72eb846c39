use tracing::{error, info};

use prople_warden_core::broker::types::{
    QUEUE_ISSUE_CREDENTIAL, QUEUE_NOTIFICATION, QUEUE_PRESENT_PROOF,
};
use prople_warden_rpc::{Provider, WardenRPC};

use crate::errors::WardenError;

use super::resolver;
use super::router::Inbound;
use super::rpc::Rpc;
use super::worker;

/// Hub runs every component of the credential hub inside one process
pub struct Hub {
    rpc: Rpc,
    inbound: Inbound,
    provider: Provider,
}

impl Hub {
    pub fn new(warden: WardenRPC, provider: Provider) -> Self {
        Self {
            rpc: Rpc::new(warden, provider.clone()),
            inbound: Inbound::new(provider.clone()),
            provider,
        }
    }

    pub async fn serve(&self) -> Result<(), WardenError> {
        info!("starting hub");

        tokio::try_join!(
            self.rpc.serve(),
            self.inbound.serve(),
            worker::run_queue(&self.provider, QUEUE_ISSUE_CREDENTIAL),
            worker::run_queue(&self.provider, QUEUE_PRESENT_PROOF),
            worker::run_queue(&self.provider, QUEUE_NOTIFICATION),
            resolver::serve(&self.provider),
        )
        .map(|_| ())
        .inspect_err(|err| error!("hub stopped: {}", err))
    }
}
