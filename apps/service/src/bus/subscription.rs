use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::RedeliveryPolicy;
use super::handler::TransitionHandler;
use crate::monitoring::types::TransitionEvent;

/// Handle to a registered subscriber and its consumer task.
///
/// Dropping the handle leaves the subscriber running.
pub struct Subscription {
    name: String,
    handle: JoinHandle<()>,
}

impl Subscription {
    pub(super) fn spawn(
        name: String,
        receiver: mpsc::Receiver<Arc<TransitionEvent>>,
        handler: Arc<dyn TransitionHandler>,
        policy: RedeliveryPolicy,
    ) -> Self {
        let handle = tokio::spawn(consume(name.clone(), receiver, handler, policy));
        Self { name, handle }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop the consumer task immediately, abandoning queued events
    pub fn unsubscribe(self) {
        debug!(subscriber = %self.name, "unsubscribing");
        self.handle.abort();
    }

    /// Wait until the consumer has drained its queue after the bus closed
    pub async fn stopped(self) {
        if let Err(e) = self.handle.await {
            warn!(subscriber = %self.name, "subscriber task ended abnormally: {}", e);
        }
    }
}

async fn consume(
    name: String,
    mut receiver: mpsc::Receiver<Arc<TransitionEvent>>,
    handler: Arc<dyn TransitionHandler>,
    policy: RedeliveryPolicy,
) {
    while let Some(event) = receiver.recv().await {
        deliver(&name, &event, handler.as_ref(), &policy).await;
    }
    debug!(subscriber = %name, "subscriber queue closed");
}

/// Hand one event to the handler, redelivering on failure until the policy
/// runs out of attempts. Returns whether the handler eventually succeeded.
async fn deliver(
    name: &str,
    event: &TransitionEvent,
    handler: &dyn TransitionHandler,
    policy: &RedeliveryPolicy,
) -> bool {
    let mut attempt = 1;
    loop {
        let failure = match AssertUnwindSafe(handler.handle(event)).catch_unwind().await {
            Ok(Ok(())) => return true,
            Ok(Err(e)) => format!("{e:#}"),
            Err(_) => "handler panicked".to_string(),
        };

        if attempt >= policy.max_attempts {
            error!(
                subscriber = %name,
                event_id = %event.id,
                site_id = event.site.id,
                attempts = attempt,
                error = %failure,
                "giving up on transition delivery"
            );
            return false;
        }

        let delay = policy.jittered_backoff(attempt);
        warn!(
            subscriber = %name,
            event_id = %event.id,
            attempt,
            ?delay,
            error = %failure,
            "transition delivery failed, redelivering"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
