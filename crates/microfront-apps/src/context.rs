use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use microfront_bus::{BusError, BusEvent, BusResult, Delivery, EventBus, Listener};
use microfront_core::config::DEFAULT_NOTIFICATION_TTL_MS;

use crate::permissions::TopicPermissions;

/// A remote's view of the shared bus, restricted to the topics its manifest
/// declares.
#[derive(Clone)]
pub struct AppContext {
    app: String,
    bus: Arc<EventBus>,
    permissions: TopicPermissions,
    notification_ttl: Duration,
}

impl AppContext {
    pub fn new(app: &str, bus: Arc<EventBus>, permissions: TopicPermissions) -> Self {
        Self {
            app: app.to_string(),
            bus,
            permissions,
            notification_ttl: Duration::from_millis(DEFAULT_NOTIFICATION_TTL_MS),
        }
    }

    pub fn with_notification_ttl(mut self, ttl: Duration) -> Self {
        self.notification_ttl = ttl;
        self
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn notification_ttl(&self) -> Duration {
        self.notification_ttl
    }

    pub fn emit(&self, event: &BusEvent) -> BusResult<Delivery> {
        let topic = event.topic();
        if !self.permissions.allows_emit(topic) {
            return Err(self.forbidden(topic, "emit"));
        }
        self.bus.emit(event)
    }

    /// Registers `listener` and records the registration so `Subscriptions::clear`
    /// can undo it.
    pub fn on(&self, topic: &str, listener: Listener, subs: &mut Subscriptions) -> BusResult<()> {
        if !self.permissions.allows_listen(topic) {
            return Err(self.forbidden(topic, "listen on"));
        }
        self.bus.on(topic, &listener);
        subs.entries.push((topic.to_string(), listener));
        Ok(())
    }

    fn forbidden(&self, topic: &str, action: &'static str) -> BusError {
        tracing::warn!(app = %self.app, topic, action, "bus access denied");
        BusError::Forbidden {
            app: self.app.clone(),
            topic: topic.to_string(),
            action,
        }
    }
}

/// Listeners a mounted app holds on the bus.
#[derive(Default)]
pub struct Subscriptions {
    entries: Vec<(String, Listener)>,
}

impl Subscriptions {
    pub fn clear(&mut self, bus: &EventBus) {
        for (topic, listener) in self.entries.drain(..) {
            bus.off(&topic, &listener);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A remote application mounted into the host.
pub trait MicroApp: Send {
    fn name(&self) -> &str;

    /// Subscribes to the app's topics. Mounting an already mounted app
    /// replaces the previous subscriptions.
    fn mount(&mut self, ctx: AppContext) -> BusResult<()>;

    /// Drops every subscription made by `mount`.
    fn unmount(&mut self);

    fn render(&self, now: Instant) -> String;

    /// Runs one user command. `input` is the rest of the command line after
    /// the remote's name, untouched.
    fn handle_command(&mut self, input: &str) -> anyhow::Result<()>;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Transient banner shown at the top of an app until it expires.
#[derive(Debug, Clone, Default)]
pub struct NotificationSlot {
    current: Option<(String, Instant)>,
}

impl NotificationSlot {
    pub fn raise(&mut self, text: &str, ttl: Duration, now: Instant) {
        self.current = Some((text.to_string(), now + ttl));
    }

    pub fn active(&self, now: Instant) -> Option<&str> {
        match &self.current {
            Some((text, expires_at)) if now < *expires_at => Some(text.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use microfront_bus::{EmailSend, OpenChat, EMAIL_SEND, OPEN_CHAT};

    fn chat_ctx(bus: &Arc<EventBus>) -> AppContext {
        AppContext::new(
            "chat",
            bus.clone(),
            TopicPermissions::new(&[EMAIL_SEND], &[OPEN_CHAT]),
        )
    }

    #[test]
    fn emit_outside_permissions_is_forbidden() {
        let bus = Arc::new(EventBus::new());
        let ctx = chat_ctx(&bus);

        assert!(ctx.emit(&BusEvent::EmailSend(EmailSend::default())).is_ok());
        let err = ctx
            .emit(&BusEvent::OpenChat(OpenChat::default()))
            .expect_err("chat may not emit open-chat");
        assert!(matches!(err, BusError::Forbidden { action: "emit", .. }));
    }

    #[test]
    fn subscriptions_are_undone_on_clear() {
        let bus = Arc::new(EventBus::new());
        let ctx = chat_ctx(&bus);
        let mut subs = Subscriptions::default();

        ctx.on(OPEN_CHAT, Listener::new(|_| Ok(())), &mut subs)
            .expect("allowed");
        assert!(ctx
            .on(EMAIL_SEND, Listener::new(|_| Ok(())), &mut subs)
            .is_err());
        assert_eq!(subs.len(), 1);
        assert_eq!(bus.listener_count(OPEN_CHAT), 1);

        subs.clear(&bus);
        assert!(subs.is_empty());
        assert_eq!(bus.listener_count(OPEN_CHAT), 0);
    }

    #[test]
    fn notification_expires() {
        let now = Instant::now();
        let mut slot = NotificationSlot::default();
        assert_eq!(slot.active(now), None);

        slot.raise("hello", Duration::from_secs(3), now);
        assert_eq!(slot.active(now + Duration::from_secs(2)), Some("hello"));
        assert_eq!(slot.active(now + Duration::from_secs(3)), None);
    }
}
