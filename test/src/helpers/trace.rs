use std::sync::Arc;

use parking_lot::Mutex;

use obus_client::{
    BusEventDescriptor, BusEventNotifier, EventFilter, ListenerKey, Object, ObjectEventNotifier,
    Phase, RegistryObserver,
};

/// Shared, ordered log of listener invocations.
///
/// Entries read like `bus-pre(connected)`, `registry-added(7)`,
/// `event-post(updated@7)` or `registry-removed(7)`.
#[derive(Clone, Default)]
pub struct TraceRecorder {
    entries: Arc<Mutex<Vec<String>>>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Records both phases of every bus event
    pub fn watch_bus_events(&self, notifier: &BusEventNotifier) -> [ListenerKey; 2] {
        [Phase::PreCommit, Phase::PostCommit].map(|phase| {
            let trace = self.clone();
            notifier.register(phase, move |bus_event: &Arc<BusEventDescriptor>| {
                trace.record(format!("bus-{}({})", phase_name(phase), bus_event.name()));
            })
        })
    }

    /// Records both phases of every event of the notifier's class
    pub fn watch_object_events(&self, notifier: &ObjectEventNotifier) -> [ListenerKey; 2] {
        [Phase::PreCommit, Phase::PostCommit].map(|phase| {
            let trace = self.clone();
            notifier.register(EventFilter::all(), phase, move |object, event, _| {
                trace.record(format!(
                    "event-{}({}@{})",
                    phase_name(phase),
                    event.name(),
                    object.handle()
                ));
            })
        })
    }

    /// A registry observer recording into this trace
    pub fn observer(&self) -> Arc<dyn RegistryObserver> {
        Arc::new(TraceObserver(self.clone()))
    }
}

fn phase_name(phase: Phase) -> &'static str {
    match phase {
        Phase::PreCommit => "pre",
        Phase::PostCommit => "post",
    }
}

struct TraceObserver(TraceRecorder);

impl RegistryObserver for TraceObserver {
    fn object_added(&self, object: &Arc<Object>, _bus_event: Option<&Arc<BusEventDescriptor>>) {
        self.0.record(format!("registry-added({})", object.handle()));
    }

    fn object_removed(&self, object: &Arc<Object>, _bus_event: Option<&Arc<BusEventDescriptor>>) {
        self.0.record(format!("registry-removed({})", object.handle()));
    }
}
