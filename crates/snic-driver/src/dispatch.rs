//! Routing unsolicited indications to observers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use snic_protocol::{IndicationKind, Message};

/// Callback invoked on the reader thread for each routed indication.
///
/// The message borrows the receive buffer; copy anything that must
/// outlive the call. Observers must not block or issue requests.
pub type IndicationObserver = Arc<dyn Fn(&Message<'_>) + Send + Sync>;

/// Observer table keyed by (category, sub-kind).
#[derive(Default)]
pub struct IndicationDispatcher {
    observers: RwLock<HashMap<(u8, u8), IndicationObserver>>,
}

impl IndicationDispatcher {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `(category, sub_kind)` to `observer`, replacing any previous one.
    pub fn register<F>(&self, category: u8, sub_kind: u8, observer: F)
    where
        F: Fn(&Message<'_>) + Send + Sync + 'static,
    {
        self.observers
            .write()
            .insert(key(category, sub_kind), Arc::new(observer));
    }

    /// Route a catalogued indication kind.
    pub fn register_kind<F>(&self, kind: IndicationKind, observer: F)
    where
        F: Fn(&Message<'_>) + Send + Sync + 'static,
    {
        let (category, sub_kind) = kind.key();
        self.register(category, sub_kind, observer);
    }

    /// Remove the observer for `(category, sub_kind)`. Returns whether one was registered.
    pub fn unregister(&self, category: u8, sub_kind: u8) -> bool {
        self.observers
            .write()
            .remove(&key(category, sub_kind))
            .is_some()
    }

    /// Whether an observer is registered for `(category, sub_kind)`.
    pub fn is_registered(&self, category: u8, sub_kind: u8) -> bool {
        self.observers
            .read()
            .contains_key(&key(category, sub_kind))
    }

    /// Deliver `message` to its observer. Returns false if none is registered.
    pub fn dispatch(&self, message: &Message<'_>) -> bool {
        // Release the lock before calling out so observers may re-register.
        let observer = self
            .observers
            .read()
            .get(&key(message.category(), message.sub_kind()))
            .cloned();
        match observer {
            Some(observer) => {
                observer(message);
                true
            }
            None => false,
        }
    }
}

fn key(category: u8, sub_kind: u8) -> (u8, u8) {
    (category & 0x7F, sub_kind & 0x7F)
}

#[cfg(test)]
mod tests {
    use super::*;
    use snic_protocol::{CMD_ID_GEN, CMD_ID_WIFI, GEN_PWR_UP_IND, WIFI_SCAN_RESULT_IND};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_dispatch_to_registered_observer() {
        let dispatcher = IndicationDispatcher::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        dispatcher.register(CMD_ID_WIFI, WIFI_SCAN_RESULT_IND, move |message| {
            assert_eq!(message.content(), &[1, 2]);
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let bytes = [WIFI_SCAN_RESULT_IND, 0, 1, 2];
        assert!(dispatcher.dispatch(&Message::parse(CMD_ID_WIFI, &bytes).unwrap()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregistered_kind_is_dropped() {
        let dispatcher = IndicationDispatcher::new();
        let bytes = [GEN_PWR_UP_IND, 0, 0, 0];
        assert!(!dispatcher.dispatch(&Message::parse(CMD_ID_GEN, &bytes).unwrap()));
    }

    #[test]
    fn test_register_replaces() {
        let dispatcher = IndicationDispatcher::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let f = first.clone();
        dispatcher.register_kind(IndicationKind::PowerUp, move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });
        let s = second.clone();
        dispatcher.register_kind(IndicationKind::PowerUp, move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        });

        let bytes = [GEN_PWR_UP_IND, 0];
        dispatcher.dispatch(&Message::parse(CMD_ID_GEN, &bytes).unwrap());
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregister() {
        let dispatcher = IndicationDispatcher::new();
        dispatcher.register(CMD_ID_GEN, GEN_PWR_UP_IND, |_| {});
        assert!(dispatcher.is_registered(CMD_ID_GEN, GEN_PWR_UP_IND));
        assert!(dispatcher.unregister(CMD_ID_GEN, GEN_PWR_UP_IND));
        assert!(!dispatcher.unregister(CMD_ID_GEN, GEN_PWR_UP_IND));
        assert!(!dispatcher.is_registered(CMD_ID_GEN, GEN_PWR_UP_IND));
    }

    #[test]
    fn test_observer_may_reregister() {
        let dispatcher = Arc::new(IndicationDispatcher::new());
        let inner = dispatcher.clone();
        dispatcher.register(CMD_ID_GEN, GEN_PWR_UP_IND, move |_| {
            inner.unregister(CMD_ID_GEN, GEN_PWR_UP_IND);
        });

        let bytes = [GEN_PWR_UP_IND, 0];
        assert!(dispatcher.dispatch(&Message::parse(CMD_ID_GEN, &bytes).unwrap()));
        assert!(!dispatcher.is_registered(CMD_ID_GEN, GEN_PWR_UP_IND));
    }
}
