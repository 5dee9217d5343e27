//! Hot-reload event bus.
//!
//! Single-topic publish/subscribe between the filesystem mirror (the only
//! publisher) and live preview connections. Each subscriber gets its own
//! unbounded channel; events arrive in publish order, at most once, with
//! no history — a subscriber connecting after an event never sees it.

use crossbeam::channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// A reload directive pushed to preview clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HotReloadEvent {
    /// A section template changed; only the named instances need swapping
    Section {
        /// Changed template key, e.g. `sections/header.liquid`
        key: String,
        /// Section instance names referencing the changed section type
        names: Vec<String>,
    },
    /// No targeted patch is possible; the client must fully reload
    Other { key: String },
}

impl HotReloadEvent {
    /// The changed asset key, whichever variant.
    pub fn key(&self) -> &str {
        match self {
            Self::Section { key, .. } | Self::Other { key } => key,
        }
    }

    /// Serialize to JSON for the push channel.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| format!(r#"{{"type":"other","key":{:?}}}"#, self.key()))
    }
}

/// In-process event bus. The mirror is the single writer; every live
/// preview connection holds a receiver that terminates cleanly on
/// disconnect.
pub struct ReloadBus {
    subscribers: Mutex<Vec<Sender<HotReloadEvent>>>,
}

impl ReloadBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Register a new subscriber. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> Receiver<HotReloadEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver an event to every live subscriber, pruning dead ones.
    pub fn publish(&self, event: &HotReloadEvent) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of live subscribers (after the last publish pruned).
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl Default for ReloadBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(key: &str, names: &[&str]) -> HotReloadEvent {
        HotReloadEvent::Section {
            key: key.into(),
            names: names.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_events_arrive_in_publish_order() {
        let bus = ReloadBus::new();
        let rx = bus.subscribe();

        bus.publish(&section("sections/header.liquid", &["hero"]));
        bus.publish(&HotReloadEvent::Other {
            key: "assets/theme.css".into(),
        });

        assert_eq!(rx.recv().unwrap().key(), "sections/header.liquid");
        assert_eq!(rx.recv().unwrap().key(), "assets/theme.css");
    }

    #[test]
    fn test_late_subscriber_sees_nothing() {
        let bus = ReloadBus::new();
        bus.publish(&HotReloadEvent::Other { key: "a".into() });

        let rx = bus.subscribe();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_disconnect_does_not_affect_other_subscribers() {
        let bus = ReloadBus::new();
        let gone = bus.subscribe();
        let alive = bus.subscribe();
        drop(gone);

        bus.publish(&HotReloadEvent::Other { key: "a".into() });
        assert_eq!(alive.recv().unwrap().key(), "a");
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_json_shape() {
        let json = section("sections/header.liquid", &["hero", "footer-header"]).to_json();
        assert!(json.contains(r#""type":"section""#));
        assert!(json.contains(r#""names":["hero","footer-header"]"#));

        let other = HotReloadEvent::Other { key: "x".into() }.to_json();
        assert!(other.contains(r#""type":"other""#));
    }
}
