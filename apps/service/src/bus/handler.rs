use std::future::Future;

use anyhow::Result;
use async_trait::async_trait;

use crate::monitoring::types::TransitionEvent;

/// Consumer of transition events.
///
/// Delivery is at-least-once: the same event (same `id`) may be handed to
/// `handle` again after a failure, so implementations must tolerate
/// duplicates. Returning `Err` or panicking schedules a redelivery.
#[async_trait]
pub trait TransitionHandler: Send + Sync {
    async fn handle(&self, event: &TransitionEvent) -> Result<()>;
}

/// Adapter turning an async closure into a [`TransitionHandler`]
pub struct HandlerFn<F>(F);

pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(TransitionEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    HandlerFn(f)
}

#[async_trait]
impl<F, Fut> TransitionHandler for HandlerFn<F>
where
    F: Fn(TransitionEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn handle(&self, event: &TransitionEvent) -> Result<()> {
        (self.0)(event.clone()).await
    }
}
