use crate::coordinator::RoundCoordinator;
use crate::error::{FedError, Result};
use crate::protocol::{CollectiveReply, FederatedMessage};
use crate::types::StatusCode;
use std::sync::Arc;

/// Maps decoded request messages onto coordinator calls.
///
/// Transport-agnostic: the QUIC server feeds it messages, tests can call it
/// directly.
#[derive(Debug, Clone)]
pub struct FederatedService {
    coordinator: Arc<RoundCoordinator>,
}

impl FederatedService {
    pub fn new(coordinator: Arc<RoundCoordinator>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &Arc<RoundCoordinator> {
        &self.coordinator
    }

    /// Run the coordinator call for `request` until its round completes.
    /// Failures are turned into a `Status` reply.
    pub async fn dispatch(&self, request: &FederatedMessage) -> FederatedMessage {
        match self.handle(request).await {
            Ok(receive_buffer) => FederatedMessage::Reply(CollectiveReply { receive_buffer }),
            Err(e) => {
                tracing::debug!("{} failed: {e}", request.name());
                FederatedMessage::status(e.status_code(), e.to_string())
            }
        }
    }

    /// Run [`dispatch`](Self::dispatch) as its own task.
    ///
    /// Dropping the returned future does not cancel the call: a rank the
    /// coordinator has counted still takes its reply and lets the round retire.
    pub async fn call(&self, request: FederatedMessage) -> FederatedMessage {
        let service = self.clone();
        match tokio::spawn(async move { service.dispatch(&request).await }).await {
            Ok(reply) => reply,
            Err(e) => FederatedMessage::status(
                StatusCode::Internal,
                format!("coordinator task failed: {e}"),
            ),
        }
    }

    async fn handle(&self, request: &FederatedMessage) -> Result<Vec<u8>> {
        match request {
            FederatedMessage::Allgather(r) => self.coordinator.allgather(r).await,
            FederatedMessage::Allreduce(r) => self.coordinator.allreduce(r).await,
            FederatedMessage::Broadcast(r) => self.coordinator.broadcast(r).await,
            other => Err(FedError::invalid_argument(format!(
                "{} is not a request",
                other.name()
            ))),
        }
    }
}
