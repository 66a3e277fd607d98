//! Local listener table.
//!
//! Event name → ordered listener list. Emission takes a snapshot of the
//! list before invoking anything, and no map lock is held while a handler
//! runs, so handlers may subscribe, unsubscribe or post re-entrantly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

/// Handler invoked with the positional arguments of an emission.
pub type Handler = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Identifies one subscription so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Clone)]
struct Listener {
    id: ListenerId,
    once: bool,
    handler: Handler,
}

/// Per-channel map of event name to listeners.
#[derive(Default)]
pub struct ListenerTable {
    listeners: DashMap<String, Vec<Listener>>,
    next_id: AtomicU64,
}

impl ListenerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to every emission of `event`. Listeners run in
    /// subscription order.
    pub fn subscribe<F>(&self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.insert(event, Arc::new(handler), false)
    }

    /// Subscribe for a single emission. The listener is removed before it runs.
    pub fn subscribe_once<F>(&self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.insert(event, Arc::new(handler), true)
    }

    /// Remove one subscription. Returns whether it was still registered.
    pub fn unsubscribe(&self, event: &str, id: ListenerId) -> bool {
        let removed = match self.listeners.get_mut(event) {
            Some(mut entry) => {
                let before = entry.len();
                entry.retain(|l| l.id != id);
                before != entry.len()
            }
            None => false,
        };
        self.listeners.remove_if(event, |_, list| list.is_empty());
        removed
    }

    /// Drop every listener for `event`, or for all events when `None`.
    pub fn remove_all_listeners(&self, event: Option<&str>) {
        match event {
            Some(event) => {
                self.listeners.remove(event);
            }
            None => self.listeners.clear(),
        }
    }

    /// Number of listeners currently subscribed to `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.get(event).map(|entry| entry.len()).unwrap_or(0)
    }

    /// Events with at least one listener, sorted.
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.listeners.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Invoke every listener registered for `event`, in registration order.
    /// Returns false (and does nothing) when there are none.
    pub fn emit_local(&self, event: &str, args: &[Value]) -> bool {
        let snapshot = match self.listeners.get(event) {
            Some(entry) if !entry.is_empty() => entry.value().clone(),
            _ => return false,
        };

        if snapshot.iter().any(|l| l.once) {
            let fired: Vec<ListenerId> =
                snapshot.iter().filter(|l| l.once).map(|l| l.id).collect();
            if let Some(mut entry) = self.listeners.get_mut(event) {
                entry.retain(|l| !fired.contains(&l.id));
            }
            self.listeners.remove_if(event, |_, list| list.is_empty());
        }

        for listener in &snapshot {
            (listener.handler)(args);
        }
        true
    }

    fn insert(&self, event: &str, handler: Handler, once: bool) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .entry(event.to_string())
            .or_default()
            .push(Listener { id, once, handler });
        id
    }
}

/// Local emission capability, composed by channel types around a
/// [`ListenerTable`]. Deliberately has no `emit`: local emission and
/// posting to the far side never share a name.
pub trait LocalEmitter {
    fn listener_table(&self) -> &ListenerTable;

    fn subscribe<F>(&self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.listener_table().subscribe(event, handler)
    }

    fn subscribe_once<F>(&self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.listener_table().subscribe_once(event, handler)
    }

    fn unsubscribe(&self, event: &str, id: ListenerId) -> bool {
        self.listener_table().unsubscribe(event, id)
    }

    fn remove_all_listeners(&self, event: Option<&str>) {
        self.listener_table().remove_all_listeners(event)
    }

    fn listener_count(&self, event: &str) -> usize {
        self.listener_table().listener_count(event)
    }

    fn event_names(&self) -> Vec<String> {
        self.listener_table().event_names()
    }

    fn emit_local(&self, event: &str, args: &[Value]) -> bool {
        self.listener_table().emit_local(event, args)
    }
}

impl LocalEmitter for ListenerTable {
    fn listener_table(&self) -> &ListenerTable {
        self
    }
}
