//! Event bus implementation and the process-wide instance.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use microfront_core::{format_error_chain, BusSettings};

use crate::error::{BusError, BusResult};
use crate::events::BusEvent;

type HandlerFn = dyn Fn(&BusEvent) -> anyhow::Result<()> + Send + Sync;

/// A registered callback. Clones share identity: keep a clone around to
/// unregister the listener later.
#[derive(Clone)]
pub struct Listener(Arc<HandlerFn>);

impl Listener {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&BusEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self(Arc::new(handler))
    }

    fn call(&self, event: &BusEvent) -> anyhow::Result<()> {
        (self.0)(event)
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", self.addr())
    }
}

/// What happens when a listener returns an error mid-delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeliveryPolicy {
    /// Stop at the first failure and hand it to the emitter. Listeners after
    /// the failing one do not see the event.
    #[default]
    AbortOnError,
    /// Log each failure and keep going.
    ContinueOnError,
}

#[derive(Debug, Clone, Default)]
pub struct BusConfig {
    pub policy: DeliveryPolicy,
}

impl From<&BusSettings> for BusConfig {
    fn from(settings: &BusSettings) -> Self {
        let policy = if settings.continue_on_error {
            DeliveryPolicy::ContinueOnError
        } else {
            DeliveryPolicy::AbortOnError
        };
        Self { policy }
    }
}

/// Outcome of one `emit`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Listeners that returned `Ok`.
    pub delivered: usize,
    /// Listeners that returned `Err`. Always zero under `AbortOnError`.
    pub failed: usize,
}

/// Topic-keyed publish/subscribe registry.
///
/// `emit` copies the listener list for its topic before calling anything, so
/// listeners may re-enter the bus. A listener added during a delivery misses
/// that delivery; one removed during a delivery still receives it.
pub struct EventBus {
    listeners: Mutex<HashMap<String, Vec<Listener>>>,
    config: BusConfig,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    pub fn with_config(config: BusConfig) -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Delivers `event` to every listener of its topic, in registration
    /// order, before returning. An unknown topic reaches nobody and is not an
    /// error. A `Custom` event on a typed topic is retyped first.
    pub fn emit(&self, event: &BusEvent) -> BusResult<Delivery> {
        let event = event.canonical()?;
        let topic = event.topic();
        let snapshot = match self.listeners.lock().get(topic) {
            Some(list) => list.clone(),
            None => Vec::new(),
        };
        tracing::debug!(topic, listeners = snapshot.len(), "emitting");

        let mut delivery = Delivery::default();
        for (position, listener) in snapshot.iter().enumerate() {
            match listener.call(&event) {
                Ok(()) => delivery.delivered += 1,
                Err(source) => match self.config.policy {
                    DeliveryPolicy::AbortOnError => {
                        return Err(BusError::Listener {
                            topic: topic.to_string(),
                            position,
                            source,
                        });
                    }
                    DeliveryPolicy::ContinueOnError => {
                        tracing::warn!(
                            topic,
                            position,
                            error = %format_error_chain(&*source),
                            "listener failed"
                        );
                        delivery.failed += 1;
                    }
                },
            }
        }
        Ok(delivery)
    }

    /// Untyped entry point: `detail` is parsed into the payload type of
    /// `topic` when the topic is a known one.
    pub fn emit_json(&self, topic: &str, detail: serde_json::Value) -> BusResult<Delivery> {
        let event = BusEvent::from_json(topic, detail)?;
        self.emit(&event)
    }

    /// Registers `listener` for future emissions on `topic`. Registering the
    /// same listener twice on one topic has no effect.
    pub fn on(&self, topic: &str, listener: &Listener) {
        let mut listeners = self.listeners.lock();
        let list = listeners.entry(topic.to_string()).or_default();
        if list.contains(listener) {
            return;
        }
        list.push(listener.clone());
        tracing::debug!(topic, "listening");
    }

    /// Unregisters `listener` from `topic`. Unknown listeners are ignored.
    pub fn off(&self, topic: &str, listener: &Listener) {
        let mut listeners = self.listeners.lock();
        if let Some(list) = listeners.get_mut(topic) {
            if let Some(index) = list.iter().position(|l| l == listener) {
                list.remove(index);
                tracing::debug!(topic, "listener removed");
            }
            if list.is_empty() {
                listeners.remove(topic);
            }
        }
    }

    pub fn listener_count(&self, topic: &str) -> usize {
        self.listeners.lock().get(topic).map_or(0, Vec::len)
    }

    /// Topics with at least one listener, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.listeners.lock().keys().cloned().collect();
        topics.sort();
        topics
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("topics", &self.topics())
            .field("config", &self.config)
            .finish()
    }
}

static EVENT_BUS: OnceLock<Arc<EventBus>> = OnceLock::new();

/// The process-wide bus. The first caller creates it; every later caller,
/// from any crate linked into the process, gets the same instance.
pub fn event_bus() -> Arc<EventBus> {
    EVENT_BUS
        .get_or_init(|| {
            tracing::debug!("creating process-wide event bus");
            Arc::new(EventBus::new())
        })
        .clone()
}

/// Installs a configured process-wide bus. Fails with the rejected config if
/// the bus already exists.
pub fn init_event_bus(config: BusConfig) -> Result<(), BusConfig> {
    EVENT_BUS
        .set(Arc::new(EventBus::with_config(config)))
        .map_err(|bus| bus.config.clone())
}
