//! Built-in subscriber that turns transitions into human-readable log lines.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use super::TransitionBus;
use super::handler::TransitionHandler;
use super::subscription::Subscription;
use crate::error::BusError;
use crate::monitoring::types::TransitionEvent;

pub const NOTIFICATION_SUBSCRIBER: &str = "notification";

/// Render the alert text for a transition
pub fn notification_text(event: &TransitionEvent) -> String {
    let state = if event.up { "back up." } else { "down!" };
    format!("{} is {}", event.site.url, state)
}

/// Logs every transition. Logging twice on redelivery is acceptable.
pub struct NotificationHandler;

#[async_trait]
impl TransitionHandler for NotificationHandler {
    async fn handle(&self, event: &TransitionEvent) -> Result<()> {
        let text = notification_text(event);
        if event.up {
            info!(site_id = event.site.id, event_id = %event.id, "{text}");
        } else {
            warn!(site_id = event.site.id, event_id = %event.id, "{text}");
        }
        Ok(())
    }
}

/// Register the logging subscriber under its well-known name
pub fn register_notification(bus: &TransitionBus) -> Result<Subscription, BusError> {
    bus.subscribe(NOTIFICATION_SUBSCRIBER, NotificationHandler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Site;
    use chrono::Utc;

    #[test]
    fn test_notification_text() {
        let site = Site::new(1, "https://example.com");
        let down = TransitionEvent::new(site.clone(), false, Utc::now());
        let up = TransitionEvent::new(site, true, Utc::now());

        assert_eq!(notification_text(&down), "https://example.com is down!");
        assert_eq!(notification_text(&up), "https://example.com is back up.");
    }

    #[tokio::test]
    async fn test_register_notification_uses_reserved_name() {
        let bus = TransitionBus::new(Default::default());
        let subscription = register_notification(&bus).unwrap();
        assert_eq!(subscription.name(), NOTIFICATION_SUBSCRIBER);
        assert!(matches!(register_notification(&bus), Err(BusError::DuplicateSubscriber(_))));
    }
}
