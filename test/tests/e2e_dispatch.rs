//! End-to-end tests of object, event and bus event dispatch
//!
//! Listener traces are checked against the two-phase order: bus pre-commit,
//! registry additions, event pre-commit, commit, event post-commit,
//! registry removals, bus post-commit.

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;

use obus_client::{
    AckKind, BusEventDescriptor, Client, ClientConfig, EventFilter, Object, ObjectEventNotifier,
    ObjectRegistry, ObusAddress, Phase, RegistryObserver,
};
use obus_shared::BusEvent;
use obus_test::{
    init_logging, u32_property, wait_until, LocalConnector, LocalPeer, PacketBuilder, TestBus,
    TraceRecorder, DEFAULT_TIMEOUT,
};

struct Harness {
    bus: TestBus,
    client: Client,
    trace: TraceRecorder,
    registry: Arc<ObjectRegistry<u16>>,
    events: Arc<ObjectEventNotifier>,
    peer: LocalPeer,
}

/// A connected client with a traced registry and event notifier for
/// `process`. The server publishes one process per `(handle, pid)`.
fn connected(published: &[(u16, u32)]) -> Harness {
    init_logging();
    let bus = TestBus::new();
    let objects: Vec<Arc<Object>> = published
        .iter()
        .map(|(handle, pid)| bus.process_object(*handle, *pid, 1))
        .collect();
    let config = ClientConfig {
        reconnect_delay: Duration::from_millis(20),
        ..ClientConfig::new("tester")
    };
    let client = Client::new(config, bus.descriptor.clone());
    let trace = TraceRecorder::new();
    trace.watch_bus_events(client.bus_events());

    let registry = Arc::new(ObjectRegistry::keyed(
        bus.process().clone(),
        |object: &Object| object.handle(),
    ));
    registry.add_observer(trace.observer());
    client.add_registry(registry.clone()).unwrap();

    let events = Arc::new(ObjectEventNotifier::new(bus.process().clone()));
    trace.watch_object_events(&events);
    client.add_object_events(events.clone()).unwrap();

    let connector = Arc::new(LocalConnector::new());
    client
        .start_with_connector(ObusAddress::inet("localhost", 5000), connector.clone())
        .unwrap();
    let mut peer = connector.accept(DEFAULT_TIMEOUT).expect("client did not connect");
    peer.recv(DEFAULT_TIMEOUT).expect("no connection request");
    peer.send(&PacketBuilder::accepted(&objects));
    assert!(wait_until(DEFAULT_TIMEOUT, || trace
        .entries()
        .contains(&"bus-post(connected)".to_string())));
    trace.clear();

    Harness {
        bus,
        client,
        trace,
        registry,
        events,
        peer,
    }
}

// ========== Solo Packets ==========

#[test]
fn test_add_then_event() {
    let harness = connected(&[]);
    let pcpu_seen = Arc::new(Mutex::new(Vec::new()));
    for phase in [Phase::PreCommit, Phase::PostCommit] {
        let pcpu_seen = pcpu_seen.clone();
        harness
            .events
            .register(EventFilter::all(), phase, move |object, _, bus_event| {
                assert!(bus_event.is_none());
                pcpu_seen.lock().push(u32_property(object, "pcpu"));
            });
    }

    let server_object = harness.bus.process_object(7, 42, 3);
    harness.peer.send(&PacketBuilder::add(&server_object));
    harness
        .peer
        .send(&PacketBuilder::event(harness.bus.updated_event(&server_object, 17)));

    assert!(wait_until(DEFAULT_TIMEOUT, || harness.trace.len() == 3));
    assert_eq!(
        harness.trace.entries(),
        vec![
            "registry-added(7)",
            "event-pre(updated@7)",
            "event-post(updated@7)"
        ]
    );
    assert_eq!(*pcpu_seen.lock(), vec![3, 17]);

    let object = harness.client.get_object(7).unwrap();
    assert_eq!(u32_property(&object, "pid"), 42);
    assert_eq!(u32_property(&object, "pcpu"), 17);
    harness.client.stop();
}

#[test]
fn test_remove_notifies_before_table_removal() {
    struct Lookup {
        client: Client,
        found: Arc<Mutex<Vec<bool>>>,
    }

    impl RegistryObserver for Lookup {
        fn object_added(&self, object: &Arc<Object>, _: Option<&Arc<BusEventDescriptor>>) {
            self.found
                .lock()
                .push(self.client.get_object(object.handle()).is_some());
        }

        fn object_removed(&self, object: &Arc<Object>, _: Option<&Arc<BusEventDescriptor>>) {
            self.found
                .lock()
                .push(self.client.get_object(object.handle()).is_some());
        }
    }

    let harness = connected(&[]);
    let found = Arc::new(Mutex::new(Vec::new()));
    harness.registry.add_observer(Arc::new(Lookup {
        client: harness.client.clone(),
        found: found.clone(),
    }));

    let server_object = harness.bus.process_object(5, 1, 0);
    harness.peer.send(&PacketBuilder::add(&server_object));
    harness.peer.send(&PacketBuilder::remove(&server_object));
    assert!(wait_until(DEFAULT_TIMEOUT, || found.lock().len() == 2));
    assert_eq!(*found.lock(), vec![true, true]);
    assert!(wait_until(DEFAULT_TIMEOUT, || harness
        .client
        .get_object(5)
        .is_none()));
    harness.client.stop();
}

#[test]
fn test_event_filters() {
    let harness = connected(&[(1, 10), (2, 20)]);
    let first = harness.client.get_object(1).unwrap();
    let renamed = harness.bus.process().event("renamed").unwrap().clone();

    let only_first = Arc::new(Mutex::new(0));
    let counter = only_first.clone();
    harness
        .events
        .register(EventFilter::all().object(&first), Phase::PostCommit, move |_, _, _| {
            *counter.lock() += 1;
        });
    let only_renamed = Arc::new(Mutex::new(0));
    let counter = only_renamed.clone();
    harness.events.register(
        EventFilter::all().events([&renamed]),
        Phase::PostCommit,
        move |_, _, _| {
            *counter.lock() += 1;
        },
    );

    for handle in [1, 2] {
        let server_object = harness.bus.process_object(handle, handle as u32 * 10, 0);
        harness
            .peer
            .send(&PacketBuilder::event(harness.bus.updated_event(&server_object, 5)));
    }
    assert!(wait_until(DEFAULT_TIMEOUT, || harness.trace.len() == 4));
    assert_eq!(*only_first.lock(), 1);
    assert_eq!(*only_renamed.lock(), 0);
    harness.client.stop();
}

// ========== Bus Events ==========

#[test]
fn test_bus_event_multi_op() {
    let harness = connected(&[(2, 200), (3, 300)]);
    let o2 = harness.bus.process_object(2, 200, 1);
    let o3 = harness.bus.process_object(3, 300, 1);

    // a call pending on o3 is aborted between its removal notice and the
    // end of the bus event
    let registered = harness.client.get_object(3).unwrap();
    let trace = harness.trace.clone();
    harness
        .client
        .call_bus_method(
            harness.bus.kill_call(&registered, 15),
            Some(Box::new(move |ack| trace.record(format!("ack({})", ack)))),
        )
        .unwrap();
    drop(registered);

    let mut bus_event = BusEvent::new(harness.bus.refresh());
    bus_event.add_register(harness.bus.process_object(1, 100, 0));
    bus_event.add_event(harness.bus.updated_event(&o2, 50));
    bus_event.add_unregister(o3);
    harness.peer.send(&PacketBuilder::bus_event(bus_event));

    assert!(wait_until(DEFAULT_TIMEOUT, || harness.trace.len() == 7));
    assert_eq!(
        harness.trace.entries(),
        vec![
            "bus-pre(refresh)",
            "registry-added(1)",
            "event-pre(updated@2)",
            "event-post(updated@2)",
            "registry-removed(3)",
            "ack(ABORTED)",
            "bus-post(refresh)"
        ]
    );

    assert!(harness.client.get_object(1).is_some());
    assert_eq!(u32_property(&harness.client.get_object(2).unwrap(), "pcpu"), 50);
    assert!(harness.client.get_object(3).is_none());
    let handles: Vec<u16> = harness.registry.all().iter().map(|object| object.handle()).collect();
    assert_eq!(handles, vec![1, 2]);
    harness.client.stop();
}

#[test]
fn test_bus_event_listener_sees_bus_event_type() {
    let harness = connected(&[(4, 40)]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    harness
        .events
        .register(EventFilter::all(), Phase::PreCommit, move |_, _, bus_event| {
            sink.lock().push(bus_event.map(|bus_event| bus_event.name().to_string()));
        });

    let server_object = harness.bus.process_object(4, 40, 0);
    let mut bus_event = BusEvent::new(harness.bus.refresh());
    bus_event.add_event(harness.bus.updated_event(&server_object, 1));
    harness.peer.send(&PacketBuilder::bus_event(bus_event));
    harness
        .peer
        .send(&PacketBuilder::event(harness.bus.updated_event(&server_object, 2)));

    assert!(wait_until(DEFAULT_TIMEOUT, || seen.lock().len() == 2));
    assert_eq!(*seen.lock(), vec![Some("refresh".to_string()), None]);
    harness.client.stop();
}

// ========== Calls ==========

#[test]
fn test_call_acknowledged() {
    let harness = connected(&[(7, 70)]);
    let mut peer = harness.peer;
    let object = harness.client.get_object(7).unwrap();
    let acks = Arc::new(Mutex::new(Vec::new()));
    let sink = acks.clone();
    let handle = harness
        .client
        .call_bus_method(
            harness.bus.kill_call(&object, 9),
            Some(Box::new(move |ack| sink.lock().push(ack))),
        )
        .unwrap();

    let raw = peer.recv(DEFAULT_TIMEOUT).expect("call not sent");
    // objUid, objHandle, methodUid, handle
    assert_eq!(&raw.payload()[..8], &[0, 1, 0, 7, 0, 10, 0, handle as u8]);
    peer.send(&PacketBuilder::ack(handle, AckKind::Acked));

    assert!(wait_until(DEFAULT_TIMEOUT, || acks.lock().len() == 1));
    assert_eq!(*acks.lock(), vec![AckKind::Acked]);
    assert_eq!(harness.client.pending_calls(), 0);
    harness.client.stop();
}
