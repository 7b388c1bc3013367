//! Transition bus - fire-and-forget fan-out of transition events.
//!
//! Every subscriber owns a bounded queue drained by its own task, so a slow
//! or failing handler never reaches back into the publisher or into other
//! subscribers. Failed deliveries are retried per [`RedeliveryPolicy`],
//! which makes delivery at-least-once.

pub mod handler;
pub mod notification;
mod subscription;

pub use handler::{HandlerFn, TransitionHandler, handler_fn};
pub use notification::{NOTIFICATION_SUBSCRIBER, NotificationHandler, register_notification};
pub use subscription::Subscription;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::error::BusError;
use crate::monitoring::types::TransitionEvent;

/// Exponential backoff between redeliveries of a failed event.
///
/// A subscriber handles its queue in order, so an event that keeps failing
/// holds back every later event for that subscriber until it succeeds or its
/// attempts run out. With the defaults (100 attempts, backoff capped at five
/// minutes) that is roughly eight hours; lower `max_attempts` or
/// `max_backoff` when later alerts must not wait that long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeliveryPolicy {
    /// Total attempts per event and subscriber, the first delivery included
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RedeliveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 100,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(300),
        }
    }
}

impl RedeliveryPolicy {
    /// Delay after the given failed attempt (1-based), without jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Backoff plus up to 10% random jitter
    fn jittered_backoff(&self, attempt: u32) -> Duration {
        let base = self.backoff(attempt);
        let spread = (base.as_millis() / 10) as u64;
        if spread == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
    }
}

#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Per-subscriber queue length
    pub queue_capacity: usize,
    pub redelivery: RedeliveryPolicy,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { queue_capacity: 64, redelivery: RedeliveryPolicy::default() }
    }
}

struct Subscriber {
    name: String,
    sender: mpsc::Sender<Arc<TransitionEvent>>,
}

pub struct TransitionBus {
    config: BusConfig,
    subscribers: RwLock<Vec<Subscriber>>,
    closed: AtomicBool,
}

impl TransitionBus {
    pub fn new(config: BusConfig) -> Self {
        Self { config, subscribers: RwLock::new(Vec::new()), closed: AtomicBool::new(false) }
    }

    fn read_subscribers(&self) -> RwLockReadGuard<'_, Vec<Subscriber>> {
        self.subscribers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_subscribers(&self) -> RwLockWriteGuard<'_, Vec<Subscriber>> {
        self.subscribers.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a handler under a unique name and start its consumer task.
    ///
    /// Only events published after this call are delivered to it.
    pub fn subscribe(
        &self,
        name: impl Into<String>,
        handler: impl TransitionHandler + 'static,
    ) -> Result<Subscription, BusError> {
        let name = name.into();

        // Checked under the lock so a concurrent `close` cannot miss this subscriber
        let mut subscribers = self.write_subscribers();
        if self.is_closed() {
            return Err(BusError::Closed);
        }
        subscribers.retain(|s| !s.sender.is_closed());
        if subscribers.iter().any(|s| s.name == name) {
            return Err(BusError::DuplicateSubscriber(name));
        }

        let (sender, receiver) = mpsc::channel(self.config.queue_capacity.max(1));
        let subscription = Subscription::spawn(
            name.clone(),
            receiver,
            Arc::new(handler),
            self.config.redelivery.clone(),
        );
        subscribers.push(Subscriber { name: name.clone(), sender });

        info!(subscriber = %name, "transition subscriber registered");
        Ok(subscription)
    }

    /// Enqueue an event for every live subscriber without waiting on any
    /// handler. Returns how many subscribers the event was queued for.
    ///
    /// A subscriber whose queue is full gets the event from a background
    /// send instead of having it dropped.
    pub fn publish(&self, event: TransitionEvent) -> Result<usize, BusError> {
        let event = Arc::new(event);
        let mut queued = 0;
        let mut stale = false;

        let subscribers = self.read_subscribers();
        if self.is_closed() {
            return Err(BusError::Closed);
        }
        for subscriber in subscribers.iter() {
            match subscriber.sender.try_send(event.clone()) {
                Ok(()) => queued += 1,
                Err(TrySendError::Full(event)) => {
                    warn!(
                        subscriber = %subscriber.name,
                        event_id = %event.id,
                        "subscriber queue full, deferring delivery"
                    );
                    let sender = subscriber.sender.clone();
                    let name = subscriber.name.clone();
                    tokio::spawn(async move {
                        if sender.send(event).await.is_err() {
                            warn!(subscriber = %name, "subscriber stopped before deferred delivery");
                        }
                    });
                    queued += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subscriber = %subscriber.name, "skipping stopped subscriber");
                    stale = true;
                }
            }
        }

        drop(subscribers);
        if stale {
            self.write_subscribers().retain(|s| !s.sender.is_closed());
        }

        debug!(event_id = %event.id, site_id = event.site.id, up = event.up, queued, "transition published");
        Ok(queued)
    }

    /// Stop accepting events. Consumers finish what is already queued and exit.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.write_subscribers().clear();
            info!("transition bus closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Names of the live subscribers, in registration order
    pub fn subscriber_names(&self) -> Vec<String> {
        self.read_subscribers()
            .iter()
            .filter(|s| !s.sender.is_closed())
            .map(|s| s.name.clone())
            .collect()
    }
}
