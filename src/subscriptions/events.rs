//! Broadcasting of manager changes to watchers.

use super::types::{EventHandle, ManagerEvent, WatcherId};
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Fans events out to watchers over bounded channels.
///
/// A watcher whose buffer is full, or whose receiver has been dropped, is
/// removed on the next broadcast.
pub struct EventBus {
    watchers: RwLock<HashMap<WatcherId, Sender<ManagerEvent>>>,
    next_id: AtomicU64,
    buffer_size: usize,
}

impl EventBus {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            watchers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer_size: buffer_size.max(1),
        }
    }

    pub fn watch(&self) -> EventHandle {
        let id = WatcherId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(self.buffer_size);
        self.watchers.write().insert(id, sender);
        EventHandle { id, receiver }
    }

    pub fn unwatch(&self, id: WatcherId) {
        self.watchers.write().remove(&id);
    }

    pub fn watcher_count(&self) -> usize {
        self.watchers.read().len()
    }

    /// Send `event` to every watcher, dropping those that cannot take it.
    pub fn broadcast(&self, event: ManagerEvent) {
        let mut to_remove = Vec::new();

        {
            let watchers = self.watchers.read();
            for (id, sender) in watchers.iter() {
                match sender.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                        to_remove.push(*id)
                    }
                }
            }
        }

        if !to_remove.is_empty() {
            let mut watchers = self.watchers.write();
            for id in to_remove {
                debug!(watcher = id.0, "dropping watcher");
                watchers.remove(&id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SubscriptionId;
    use std::time::Duration;

    fn event(n: u32) -> ManagerEvent {
        ManagerEvent::Subscribed {
            subscription_id: SubscriptionId(n.to_string()),
        }
    }

    #[test]
    fn test_watch_unwatch() {
        let bus = EventBus::new(8);
        let handle = bus.watch();
        assert_eq!(bus.watcher_count(), 1);

        bus.unwatch(handle.id);
        assert_eq!(bus.watcher_count(), 0);
    }

    #[test]
    fn test_broadcast_reaches_all_watchers() {
        let bus = EventBus::new(8);
        let a = bus.watch();
        let b = bus.watch();

        bus.broadcast(event(1));

        assert_eq!(a.recv_timeout(Duration::from_millis(100)).unwrap(), event(1));
        assert_eq!(b.recv_timeout(Duration::from_millis(100)).unwrap(), event(1));
    }

    #[test]
    fn test_drop_slow_watcher() {
        let bus = EventBus::new(2);
        let _slow = bus.watch();

        for i in 0..5 {
            bus.broadcast(event(i));
        }

        assert_eq!(bus.watcher_count(), 0);
    }

    #[test]
    fn test_drop_disconnected_watcher() {
        let bus = EventBus::new(8);
        drop(bus.watch());

        bus.broadcast(event(1));
        assert_eq!(bus.watcher_count(), 0);
    }
}
