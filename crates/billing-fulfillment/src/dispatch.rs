//! Fire-and-forget fulfillment dispatch
//!
//! The payment path hands jobs to a channel and returns immediately. A
//! background task drains the channel and runs the worker one job at a time.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::worker::{FulfillmentJob, FulfillmentWorker};

/// Sending half of the fulfillment queue
#[derive(Clone)]
pub struct FulfillmentDispatcher {
    sender: mpsc::UnboundedSender<FulfillmentJob>,
}

impl FulfillmentDispatcher {
    /// Start the background processor
    ///
    /// The task ends once every dispatcher clone has been dropped and the
    /// queue is drained.
    pub fn spawn(worker: Arc<FulfillmentWorker>) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(process_jobs(worker, receiver));
        (Self { sender }, handle)
    }

    /// Queue a job without waiting for it
    ///
    /// Returns `false` if the processor has stopped; the job is then lost
    /// and logged for manual follow-up.
    pub fn dispatch(&self, job: FulfillmentJob) -> bool {
        let order_id = job.order_id;
        let domains = job.items.len();

        match self.sender.send(job) {
            Ok(()) => {
                tracing::info!(order_id = %order_id, domains, "Fulfillment queued");
                true
            }
            Err(mpsc::error::SendError(job)) => {
                tracing::error!(
                    order_id = %job.order_id,
                    client_id = %job.client_id,
                    gateway_order = job.gateway_order_ref.as_deref().unwrap_or("-"),
                    "Fulfillment processor stopped, job dropped"
                );
                false
            }
        }
    }
}

async fn process_jobs(worker: Arc<FulfillmentWorker>, mut receiver: mpsc::UnboundedReceiver<FulfillmentJob>) {
    tracing::debug!("Fulfillment processor started");

    while let Some(job) = receiver.recv().await {
        let report = worker.fulfill(&job).await;
        tracing::debug!(
            order_id = %report.order_id,
            completed = report.order_completed,
            failures = report.failures().count(),
            "Fulfillment job finished"
        );
    }

    tracing::debug!("Fulfillment processor stopped");
}
