use std::sync::Arc;

use obus_shared::BusEventDescriptor;

use super::listener::{ListenerKey, ListenerList, Phase};

type BusEventCallback = dyn Fn(&Arc<BusEventDescriptor>) + Send + Sync;

struct BusEventListener {
    phase: Phase,
    callback: Box<BusEventCallback>,
}

/// Fans bus events out to the listeners of one phase
#[derive(Default)]
pub struct BusEventNotifier {
    listeners: ListenerList<BusEventListener>,
}

impl BusEventNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, phase: Phase, callback: F) -> ListenerKey
    where
        F: Fn(&Arc<BusEventDescriptor>) + Send + Sync + 'static,
    {
        self.listeners.add(Arc::new(BusEventListener {
            phase,
            callback: Box::new(callback),
        }))
    }

    pub fn unregister(&self, key: ListenerKey) -> bool {
        self.listeners.remove(key)
    }

    pub(crate) fn notify(&self, bus_event: &Arc<BusEventDescriptor>, phase: Phase) {
        for listener in self.listeners.snapshot() {
            if listener.phase == phase {
                (listener.callback)(bus_event);
            }
        }
    }
}
