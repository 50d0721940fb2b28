//! Per-service dispatch table: command -> listeners.

use crate::lock;
use daemonlink_core::{Command, Message};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

pub(crate) type Handler = Arc<dyn Fn(&Value, &Message) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ListenerId(u64);

#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    table: HashMap<Command, Vec<(ListenerId, Handler)>>,
}

impl Listeners {
    pub(crate) fn add(&mut self, command: Command, handler: Handler) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.table.entry(command).or_default().push((id, handler));
        id
    }

    /// Remove one listener. Returns false if it was already gone.
    pub(crate) fn remove(&mut self, command: &Command, id: ListenerId) -> bool {
        let Some(handlers) = self.table.get_mut(command) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            self.table.remove(command);
        }
        removed
    }

    /// Snapshot of the handlers for `command`, so they can be invoked
    /// without holding the table lock.
    pub(crate) fn handlers(&self, command: &Command) -> Vec<Handler> {
        self.table
            .get(command)
            .map(|handlers| handlers.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn count(&self, command: &Command) -> usize {
        self.table.get(command).map_or(0, Vec::len)
    }
}

/// Handle to a registered listener.
///
/// Dropping the handle, or calling [`unsubscribe`](Self::unsubscribe),
/// removes exactly that listener. Use [`detach`](Self::detach) to keep it
/// for the life of the service.
#[must_use = "dropping a Subscription removes its listener"]
pub struct Subscription {
    listeners: Weak<Mutex<Listeners>>,
    command: Command,
    id: ListenerId,
    detached: bool,
}

impl Subscription {
    pub(crate) fn new(
        listeners: &Arc<Mutex<Listeners>>,
        command: Command,
        id: ListenerId,
    ) -> Self {
        Self {
            listeners: Arc::downgrade(listeners),
            command,
            id,
            detached: false,
        }
    }

    /// The command this listener was registered for.
    pub fn command(&self) -> &Command {
        &self.command
    }

    /// Remove the listener now.
    pub fn unsubscribe(self) {}

    /// Keep the listener registered after this handle is dropped.
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        if let Some(listeners) = self.listeners.upgrade() {
            lock(&listeners).remove(&self.command, self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("command", &self.command)
            .field("id", &self.id)
            .finish()
    }
}
