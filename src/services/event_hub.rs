/*
    Push event subscriptions. A view acquires one handler per event kind when it mounts and
    releases them when it unmounts. The hub itself refuses to hold two handlers for the same
    kind: subscribing again replaces the previous handler, and the stale handle's release is
    then a no-op, so remounting never stacks handlers.
*/
use super::reconciler::ReconcileController;
use crate::models::{
    error::ReconcileError,
    message::{EventKind, PushEvent, RawEvent},
};
use serde_json::Value;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, Weak},
};
use uuid::Uuid;

pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

struct Slot {
    token: Uuid,
    handler: EventHandler,
}

type Slots = Mutex<HashMap<EventKind, Slot>>;

#[derive(Clone, Default)]
pub struct EventHub {
    slots: Arc<Slots>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        kind: EventKind,
        handler: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle, ReconcileError> {
        let token = Uuid::new_v4();
        let mut slots = self.slots.lock()?;
        let slot = Slot {
            token,
            handler: Arc::new(handler),
        };
        if slots.insert(kind, slot).is_some() {
            tracing::warn!(
                %kind,
                "Replacing an active handler, the previous subscription was never released"
            );
        }
        Ok(SubscriptionHandle {
            kind,
            token,
            slots: Arc::downgrade(&self.slots),
        })
    }

    pub fn is_subscribed(&self, kind: EventKind) -> bool {
        self.slots
            .lock()
            .map(|slots| slots.contains_key(&kind))
            .unwrap_or(false)
    }

    /// Number of live handlers, at most one per kind.
    pub fn active(&self) -> usize {
        self.slots.lock().map(|slots| slots.len()).unwrap_or(0)
    }

    /// Hand a transport event to its handler. Returns whether anyone received it.
    /// Events arrive here in transport order and are delivered synchronously, which keeps
    /// delivery FIFO per kind.
    pub fn dispatch(&self, event: &RawEvent) -> Result<bool, ReconcileError> {
        let kind = event.event.parse::<EventKind>()?;
        // don't hold the lock while the handler runs; it may subscribe or release
        let handler = self
            .slots
            .lock()?
            .get(&kind)
            .map(|slot| Arc::clone(&slot.handler));
        match handler {
            Some(handler) => {
                handler(&event.payload);
                Ok(true)
            }
            None => {
                tracing::trace!(%kind, "No handler mounted, event dropped");
                Ok(false)
            }
        }
    }
}

/// Proof of a live subscription. Releasing (or dropping) it detaches the handler, unless a
/// newer subscription has already taken the slot.
pub struct SubscriptionHandle {
    kind: EventKind,
    token: Uuid,
    slots: Weak<Slots>,
}

impl SubscriptionHandle {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn release(self) {
        // Drop does the work
    }

    fn detach(&self) {
        let Some(slots) = self.slots.upgrade() else {
            return;
        };
        let mut slots = match slots.lock() {
            Ok(slots) => slots,
            Err(e) => {
                tracing::error!("Unable to release {} subscription: {e}", self.kind);
                return;
            }
        };
        if slots.get(&self.kind).is_some_and(|slot| slot.token == self.token) {
            slots.remove(&self.kind);
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Lets late async work check whether the view that started it is still mounted.
#[derive(Clone, Debug)]
pub struct Liveness(Weak<()>);

impl Liveness {
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

/// The subscriptions a mounted view holds: one handler per event kind, each decoding the
/// payload and queueing it on the reconciler. Unmounting (or dropping) releases all of them.
pub struct MountedView {
    handles: Vec<SubscriptionHandle>,
    alive: Arc<()>,
}

impl MountedView {
    pub fn mount(hub: &EventHub, controller: &ReconcileController) -> Result<Self, ReconcileError> {
        let mut handles = Vec::with_capacity(EventKind::ALL.len());
        for kind in EventKind::ALL {
            let controller = controller.clone();
            let handle = hub.subscribe(kind, move |payload| {
                let queued = match PushEvent::decode(kind, payload) {
                    Ok(event) => controller.push_event(event),
                    Err(e) => controller.report(e),
                };
                if let Err(e) = queued {
                    tracing::debug!(%kind, "Event arrived after the reconciler stopped: {e}");
                }
            })?;
            handles.push(handle);
        }
        tracing::debug!(handlers = handles.len(), "View mounted");
        Ok(Self {
            handles,
            alive: Arc::new(()),
        })
    }

    pub fn liveness(&self) -> Liveness {
        Liveness(Arc::downgrade(&self.alive))
    }

    pub fn unmount(self) {
        tracing::debug!(handlers = self.handles.len(), "View unmounted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&Value) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        (count, move |_: &Value| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn status_event() -> RawEvent {
        RawEvent::new(EventKind::NodeStatus, json!(["a", "Idle"]))
    }

    #[test]
    fn released_handler_gets_nothing() {
        let hub = EventHub::new();
        let (count, handler) = counter();
        let handle = hub.subscribe(EventKind::NodeStatus, handler).unwrap();

        assert!(hub.dispatch(&status_event()).unwrap());
        handle.release();
        assert!(!hub.dispatch(&status_event()).unwrap());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(hub.active(), 0);
    }

    #[test]
    fn remounting_never_stacks_handlers() {
        let hub = EventHub::new();
        let (first, handler) = counter();
        let stale = hub.subscribe(EventKind::NodeStatus, handler).unwrap();
        let (second, handler) = counter();
        let current = hub.subscribe(EventKind::NodeStatus, handler).unwrap();

        hub.dispatch(&status_event()).unwrap();
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        // releasing the superseded handle must not detach the live one
        stale.release();
        assert!(hub.is_subscribed(EventKind::NodeStatus));
        drop(current);
        assert!(!hub.is_subscribed(EventKind::NodeStatus));
    }

    #[test]
    fn unknown_event_names_are_malformed() {
        let hub = EventHub::new();
        let event = RawEvent {
            event: "render_progress".into(),
            payload: Value::Null,
        };
        assert!(matches!(
            hub.dispatch(&event),
            Err(ReconcileError::MalformedPayload { .. })
        ));
    }

    #[test]
    fn handler_may_release_itself() {
        let hub = EventHub::new();
        let slot: Arc<Mutex<Option<SubscriptionHandle>>> = Arc::default();
        let inner = slot.clone();
        let handle = hub
            .subscribe(EventKind::FileDrop, move |_| {
                inner.lock().unwrap().take();
            })
            .unwrap();
        *slot.lock().unwrap() = Some(handle);

        assert!(hub.dispatch(&RawEvent::new(EventKind::FileDrop, json!([]))).unwrap());
        assert!(!hub.is_subscribed(EventKind::FileDrop));
    }

    #[test]
    fn handles_outliving_the_hub_are_harmless() {
        let hub = EventHub::new();
        let (_, handler) = counter();
        let handle = hub.subscribe(EventKind::NodeDiscover, handler).unwrap();
        drop(hub);
        handle.release();
    }
}
