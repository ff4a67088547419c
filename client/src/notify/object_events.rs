use std::{
    collections::HashSet,
    sync::{Arc, Weak},
};

use obus_shared::{BusEventDescriptor, EventDescriptor, Object, ObjectDescriptor, ObjectEvent};

use super::listener::{ListenerKey, ListenerList, Phase};

/// Selects the object events a listener receives. The default filter
/// accepts every event of the class.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    object: Option<Weak<Object>>,
    events: Option<HashSet<u16>>,
}

impl EventFilter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Only events of this instance
    pub fn object(mut self, object: &Arc<Object>) -> Self {
        self.object = Some(Arc::downgrade(object));
        self
    }

    /// Only events of these types
    pub fn events<'a>(mut self, events: impl IntoIterator<Item = &'a Arc<EventDescriptor>>) -> Self {
        self.events = Some(events.into_iter().map(|event| event.uid()).collect());
        self
    }

    pub fn matches(&self, object: &Arc<Object>, event: &ObjectEvent) -> bool {
        if let Some(expected) = &self.object {
            if !std::ptr::eq(expected.as_ptr(), Arc::as_ptr(object)) {
                return false;
            }
        }
        match &self.events {
            Some(events) => events.contains(&event.uid()),
            None => true,
        }
    }
}

type ObjectEventCallback = dyn Fn(&Arc<Object>, &ObjectEvent, Option<&Arc<BusEventDescriptor>>) + Send + Sync;

struct ObjectEventListener {
    filter: EventFilter,
    phase: Phase,
    callback: Box<ObjectEventCallback>,
}

/// Fans the events of one object class out to filtered listeners
pub struct ObjectEventNotifier {
    descriptor: Arc<ObjectDescriptor>,
    listeners: ListenerList<ObjectEventListener>,
}

impl ObjectEventNotifier {
    pub fn new(descriptor: Arc<ObjectDescriptor>) -> Self {
        Self {
            descriptor,
            listeners: ListenerList::default(),
        }
    }

    pub fn descriptor(&self) -> &Arc<ObjectDescriptor> {
        &self.descriptor
    }

    /// Registers a listener. The bus event is `None` for events that were
    /// not part of a bus event.
    pub fn register<F>(&self, filter: EventFilter, phase: Phase, callback: F) -> ListenerKey
    where
        F: Fn(&Arc<Object>, &ObjectEvent, Option<&Arc<BusEventDescriptor>>) + Send + Sync + 'static,
    {
        self.listeners.add(Arc::new(ObjectEventListener {
            filter,
            phase,
            callback: Box::new(callback),
        }))
    }

    pub fn unregister(&self, key: ListenerKey) -> bool {
        self.listeners.remove(key)
    }

    pub(crate) fn notify(
        &self,
        object: &Arc<Object>,
        event: &ObjectEvent,
        bus_event: Option<&Arc<BusEventDescriptor>>,
        phase: Phase,
    ) {
        for listener in self.listeners.snapshot() {
            if listener.phase == phase && listener.filter.matches(object, event) {
                (listener.callback)(object, event, bus_event);
            }
        }
    }
}
