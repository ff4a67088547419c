//! Property tests of the codec, the handle table and the dispatch order

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use parking_lot::Mutex;
use proptest::prelude::*;

use obus_client::{
    AckKind, Client, ClientConfig, DispatchMode, EventFilter, Object, ObjectEventNotifier,
    ObjectRegistry, ObusAddress, Phase,
};
use obus_shared::{
    Buffer, Bus, BusEvent, FieldDescriptor, FieldKind, FieldType, FieldValue, FrameDecoder,
    ObjectEvent, PacketType, Scalar, Struct, StructDescriptor,
};
use obus_test::{
    init_logging, u32_property, wait_until, LocalConnector, LocalPeer, PacketBuilder, TestBus,
    TraceRecorder, DEFAULT_TIMEOUT,
};

// ========== Codec ==========

fn mixed_struct() -> Arc<StructDescriptor> {
    Arc::new(
        StructDescriptor::new([
            FieldDescriptor::property("u8", 1, FieldType::scalar(FieldKind::U8)),
            FieldDescriptor::property("i16", 2, FieldType::scalar(FieldKind::I16)),
            FieldDescriptor::property("u32", 3, FieldType::scalar(FieldKind::U32)),
            FieldDescriptor::property("i64", 4, FieldType::scalar(FieldKind::I64)),
            FieldDescriptor::property("name", 5, FieldType::scalar(FieldKind::String)),
            FieldDescriptor::property("flag", 6, FieldType::scalar(FieldKind::Bool)),
            FieldDescriptor::property("ratio", 7, FieldType::scalar(FieldKind::F64)),
            FieldDescriptor::property("ports", 8, FieldType::array(FieldKind::U16)),
            FieldDescriptor::property("tags", 9, FieldType::array(FieldKind::String)),
        ])
        .unwrap(),
    )
}

#[derive(Debug, Clone)]
struct Mixed {
    u8: Option<u8>,
    i16: Option<i16>,
    u32: Option<u32>,
    i64: Option<i64>,
    name: Option<Option<String>>,
    flag: Option<bool>,
    ratio: Option<f64>,
    ports: Option<Vec<u16>>,
    tags: Option<Vec<String>>,
}

fn mixed() -> impl Strategy<Value = Mixed> {
    (
        (
            any::<Option<u8>>(),
            any::<Option<i16>>(),
            any::<Option<u32>>(),
            any::<Option<i64>>(),
        ),
        (
            proptest::option::of(proptest::option::of("[a-z ]{0,12}")),
            any::<Option<bool>>(),
            proptest::option::of(-1.0e9f64..1.0e9),
            proptest::option::of(proptest::collection::vec(any::<u16>(), 0..6)),
            proptest::option::of(proptest::collection::vec("[a-z]{0,5}", 0..4)),
        ),
    )
        .prop_map(|((u8, i16, u32, i64), (name, flag, ratio, ports, tags))| Mixed {
            u8,
            i16,
            u32,
            i64,
            name,
            flag,
            ratio,
            ports,
            tags,
        })
}

fn build(desc: &Arc<StructDescriptor>, input: &Mixed) -> Struct {
    fn put<T: FieldValue>(
        value: &mut Struct,
        desc: &StructDescriptor,
        name: &str,
        input: Option<T>,
    ) {
        if let Some(input) = input {
            value.set(desc.field(name).unwrap(), input).unwrap();
        }
    }

    let mut value = Struct::new(desc.clone());
    put(&mut value, desc, "u8", input.u8);
    put(&mut value, desc, "i16", input.i16);
    put(&mut value, desc, "u32", input.u32);
    put(&mut value, desc, "i64", input.i64);
    put(&mut value, desc, "name", input.name.clone());
    put(&mut value, desc, "flag", input.flag);
    put(&mut value, desc, "ratio", input.ratio);
    put(&mut value, desc, "ports", input.ports.clone());
    put(&mut value, desc, "tags", input.tags.clone());
    value
}

fn unknown_scalar() -> impl Strategy<Value = Scalar> {
    prop_oneof![
        any::<u8>().prop_map(Scalar::U8),
        any::<i16>().prop_map(Scalar::I16),
        any::<u32>().prop_map(Scalar::U32),
        any::<i64>().prop_map(Scalar::I64),
        any::<bool>().prop_map(Scalar::Bool),
        any::<f32>().prop_map(Scalar::F32),
        proptest::option::of("[a-z]{0,8}").prop_map(Scalar::String),
    ]
}

proptest! {
    #[test]
    fn prop_struct_survives_encoding(input in mixed()) {
        let desc = mixed_struct();
        let value = build(&desc, &input);
        let mut buffer = Buffer::new();
        value.encode(&mut buffer);
        buffer.finish();
        let mut received = Buffer::from_bytes(buffer.into_bytes());

        let decoded = Struct::decode(&desc, &mut received).unwrap();
        prop_assert!(!received.has_remaining());
        prop_assert_eq!(decoded.present_count(), value.present_count());
        for field in desc.fields() {
            prop_assert_eq!(decoded.value(field), value.value(field));
        }
    }

    #[test]
    fn prop_unknown_fields_are_skipped(
        pid in any::<u32>(),
        unknown in proptest::collection::vec((100u16..200, unknown_scalar()), 0..6),
        position in any::<prop::sample::Index>(),
    ) {
        init_logging();
        let desc = Arc::new(
            StructDescriptor::new([FieldDescriptor::property("pid", 1, FieldType::scalar(FieldKind::U32))])
                .unwrap(),
        );
        let known = position.index(unknown.len() + 1);

        let mut buffer = Buffer::new();
        buffer.write_u16(unknown.len() as u16 + 1);
        for index in 0..=unknown.len() {
            if index == known {
                buffer.write_u16(1);
                buffer.write_u8(FieldType::scalar(FieldKind::U32).to_byte());
                buffer.write_u32(pid);
            }
            if let Some((uid, scalar)) = unknown.get(index) {
                buffer.write_u16(*uid);
                buffer.write_u8(FieldType::scalar(scalar.kind()).to_byte());
                scalar.encode(&mut buffer);
            }
        }
        buffer.finish();
        let mut received = Buffer::from_bytes(buffer.into_bytes());

        let decoded = Struct::decode(&desc, &mut received).unwrap();
        prop_assert!(!received.has_remaining());
        prop_assert_eq!(decoded.present_count(), 1);
        prop_assert_eq!(decoded.get::<u32>(desc.field("pid").unwrap()), Ok(Some(pid)));
    }

    #[test]
    fn prop_frames_found_after_garbage(
        garbage in proptest::collection::vec(any::<u8>(), 0..64)
            .prop_filter("no magic", |bytes| !bytes.windows(4).any(|window| window == b"obus")),
        handles in proptest::collection::vec(1u16.., 1..4),
        split in any::<prop::sample::Index>(),
    ) {
        init_logging();
        let frames: Vec<u8> = handles
            .iter()
            .flat_map(|handle| PacketBuilder::ack(*handle, AckKind::Acked))
            .collect();
        let expected = FrameDecoder::new().decode(&frames);
        prop_assert_eq!(expected.len(), handles.len());

        let bytes = [garbage.clone(), frames].concat();
        let split = split.index(bytes.len() + 1);
        let mut decoder = FrameDecoder::new();
        let mut packets = decoder.decode(&bytes[..split]);
        packets.extend(decoder.decode(&bytes[split..]));

        prop_assert_eq!(&packets, &expected);
        prop_assert!(packets.iter().all(|raw| raw.packet_type() == PacketType::Ack));
        if garbage.is_empty() {
            prop_assert_eq!(decoder.bad_magic_count(), 0);
        } else {
            prop_assert!(decoder.bad_magic_count() >= 1);
            prop_assert!(decoder.bad_magic_count() <= garbage.len() as u64);
        }
    }
}

// ========== Objects and Handle Table ==========

proptest! {
    #[test]
    fn prop_commit_is_idempotent(pid in any::<u32>(), start in any::<u32>(), pcpu in any::<u32>()) {
        let bus = TestBus::new();
        let object = bus.process_object(1, pid, start);
        let mut event = bus.updated_event(&object, pcpu);

        event.commit();
        event.commit();
        prop_assert!(event.is_committed());
        prop_assert_eq!(u32_property(&object, "pcpu"), pcpu);
        prop_assert_eq!(u32_property(&object, "pid"), pid);

        // the same delta committed by a second event changes nothing
        let mut again = ObjectEvent::new(&object, bus.updated(), event.delta().clone()).unwrap();
        again.commit();
        prop_assert_eq!(u32_property(&object, "pcpu"), pcpu);
        prop_assert_eq!(object.properties().present_count(), 2);
    }

    #[test]
    fn prop_handles_stay_unique(operations in proptest::collection::vec((any::<bool>(), 0u16..16), 0..64)) {
        let test_bus = TestBus::new();
        let mut bus = Bus::new(test_bus.descriptor.clone());
        let mut registered: Vec<Arc<Object>> = Vec::new();

        for (add, handle) in operations {
            if add {
                let accepted = handle != 0 && registered.iter().all(|object| object.handle() != handle);
                let result = bus.register(test_bus.process_object(handle, 0, 0));
                prop_assert_eq!(result.is_ok(), accepted);
                if accepted {
                    registered.push(bus.find(handle).unwrap().clone());
                }
            } else if let Some(index) = registered.iter().position(|object| object.handle() == handle) {
                let object = registered.remove(index);
                prop_assert!(bus.unregister(&object).is_ok());
                prop_assert!(bus.unregister(&object).is_err());
            }

            prop_assert_eq!(bus.len(), registered.len());
            let handles: HashSet<u16> = bus.objects().iter().map(|object| object.handle()).collect();
            prop_assert_eq!(handles.len(), registered.len());
        }
    }
}

// ========== Dispatch ==========

struct ManualClient {
    bus: TestBus,
    client: Client,
    peer: LocalPeer,
    trace: TraceRecorder,
    registry: Arc<ObjectRegistry<u32>>,
}

impl ManualClient {
    /// A manual-dispatch client connected to a server publishing `handles`,
    /// with its listeners traced. Published processes use their handle as
    /// pid, the registry key.
    fn connect(handles: &[u16]) -> Self {
        init_logging();
        let bus = TestBus::new();
        let config = ClientConfig {
            dispatch: DispatchMode::Manual,
            reconnect_delay: Duration::from_millis(20),
            ..ClientConfig::new("tester")
        };
        let client = Client::new(config, bus.descriptor.clone());
        let trace = TraceRecorder::new();
        trace.watch_bus_events(client.bus_events());
        let registry = Arc::new(ObjectRegistry::keyed(bus.process().clone(), |object: &Object| {
            u32_property(object, "pid")
        }));
        registry.add_observer(trace.observer());
        client.add_registry(registry.clone()).unwrap();
        let events = Arc::new(ObjectEventNotifier::new(bus.process().clone()));
        trace.watch_object_events(&events);
        client.add_object_events(events).unwrap();

        let connector = Arc::new(LocalConnector::new());
        client
            .start_with_connector(ObusAddress::inet("localhost", 5000), connector.clone())
            .unwrap();
        let mut peer = connector.accept(DEFAULT_TIMEOUT).expect("client did not connect");
        assert!(client.process_events_timeout(DEFAULT_TIMEOUT) > 0);
        peer.recv(DEFAULT_TIMEOUT).expect("no connection request");
        let objects: Vec<Arc<Object>> = handles
            .iter()
            .map(|handle| bus.process_object(*handle, u32::from(*handle), 0))
            .collect();
        peer.send(&PacketBuilder::accepted(&objects));

        let harness = Self {
            bus,
            client,
            peer,
            trace,
            registry,
        };
        assert!(harness.pump_until(|| harness.client.is_connected()));
        harness.trace.clear();
        harness
    }

    fn pump_until(&self, mut done: impl FnMut() -> bool) -> bool {
        wait_until(DEFAULT_TIMEOUT, || {
            self.client.process_events_timeout(Duration::from_millis(5));
            done()
        })
    }
}

/// Position of a trace entry in the two-phase dispatch order
fn phase_rank(entry: &str) -> usize {
    const ORDER: [&str; 6] = [
        "bus-pre",
        "registry-added",
        "event-pre",
        "event-post",
        "registry-removed",
        "bus-post",
    ];
    ORDER
        .iter()
        .position(|prefix| entry.starts_with(&format!("{}(", prefix)))
        .unwrap_or_else(|| panic!("unexpected trace entry {}", entry))
}

#[derive(Debug, Clone, Copy)]
enum Change {
    Keep,
    Update,
    Remove,
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_bus_event_dispatch_order(
        added in 0usize..4,
        changes in proptest::collection::vec(
            prop_oneof![Just(Change::Keep), Just(Change::Update), Just(Change::Remove)],
            0..5,
        ),
    ) {
        let existing: Vec<u16> = (1..=changes.len() as u16).collect();
        let harness = ManualClient::connect(&existing);
        let bus = &harness.bus;

        let mut bus_event = BusEvent::new(bus.refresh());
        for index in 0..added {
            let handle = 100 + index as u16;
            bus_event.add_register(bus.process_object(handle, u32::from(handle), 0));
        }
        let mut updated = 0;
        let mut removed = BTreeSet::new();
        for (handle, change) in existing.iter().zip(&changes) {
            let server_object = bus.process_object(*handle, u32::from(*handle), 0);
            match change {
                Change::Keep => {}
                Change::Update => {
                    bus_event.add_event(bus.updated_event(&server_object, 9));
                    updated += 1;
                }
                Change::Remove => {
                    bus_event.add_unregister(server_object);
                    removed.insert(*handle);
                }
            }
        }
        harness.peer.send(&PacketBuilder::bus_event(bus_event));
        let done = "bus-post(refresh)".to_string();
        prop_assert!(harness.pump_until(|| harness.trace.entries().contains(&done)));

        let entries = harness.trace.entries();
        prop_assert_eq!(entries.len(), 2 + added + 2 * updated + removed.len());
        let ranks: Vec<usize> = entries.iter().map(|entry| phase_rank(entry)).collect();
        prop_assert!(ranks.windows(2).all(|pair| pair[0] <= pair[1]), "out of order: {:?}", entries);

        for handle in &existing {
            prop_assert_eq!(harness.client.get_object(*handle).is_none(), removed.contains(handle));
        }
        prop_assert_eq!(harness.client.all_objects().len(), existing.len() + added - removed.len());
        harness.client.stop();
    }

    #[test]
    fn prop_removal_aborts_every_pending_call(calls in 1usize..8) {
        let harness = ManualClient::connect(&[3]);
        let object = harness.client.get_object(3).unwrap();
        let acks = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for signal in 0..calls {
            let sink = acks.clone();
            let handle = harness
                .client
                .call_bus_method(
                    harness.bus.kill_call(&object, signal as u32),
                    Some(Box::new(move |ack| sink.lock().push(ack))),
                )
                .unwrap();
            handles.push(handle);
        }
        prop_assert_eq!(harness.client.pending_calls(), calls);

        harness.peer.send(&PacketBuilder::remove(&object));
        prop_assert!(harness.pump_until(|| harness.client.get_object(3).is_none()));

        prop_assert_eq!(acks.lock().clone(), vec![AckKind::Aborted; calls]);
        prop_assert_eq!(harness.client.pending_calls(), 0);
        let distinct: HashSet<u16> = handles.into_iter().collect();
        prop_assert_eq!(distinct.len(), calls);
        harness.client.stop();
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_registry_keeps_one_object_per_key(
        operations in proptest::collection::vec((any::<bool>(), 1u16..12, 0u32..4), 0..24),
    ) {
        let harness = ManualClient::connect(&[]);
        // handle -> pid on the server, pid -> handle in the registry
        let mut published: HashMap<u16, u32> = HashMap::new();
        let mut expected: HashMap<u32, u16> = HashMap::new();

        for (add, handle, pid) in operations {
            if add && !published.contains_key(&handle) {
                harness.peer.send(&PacketBuilder::add(&harness.bus.process_object(handle, pid, 0)));
                published.insert(handle, pid);
                expected.entry(pid).or_insert(handle);
            } else if !add {
                if let Some(pid) = published.remove(&handle) {
                    harness.peer.send(&PacketBuilder::remove(&harness.bus.process_object(handle, pid, 0)));
                    if expected.get(&pid) == Some(&handle) {
                        expected.remove(&pid);
                    }
                }
            }
        }
        // in-order delivery: once this one is seen, everything before it was
        harness.peer.send(&PacketBuilder::add(&harness.bus.process_object(1000, 1000, 0)));
        prop_assert!(harness.pump_until(|| harness.registry.get(&1000).is_some()));

        prop_assert_eq!(harness.registry.len(), expected.len() + 1);
        for (pid, handle) in &expected {
            prop_assert_eq!(harness.registry.get(pid).map(|object| object.handle()), Some(*handle));
        }
        prop_assert_eq!(harness.client.all_objects().len(), published.len() + 1);
        harness.client.stop();
    }
}

#[test]
fn test_second_event_notifier_is_rejected() {
    let harness = ManualClient::connect(&[5]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let notifier = Arc::new(ObjectEventNotifier::new(harness.bus.process().clone()));
    let sink = seen.clone();
    notifier.register(EventFilter::all(), Phase::PostCommit, move |object, event, _| {
        sink.lock().push((event.name().to_string(), u32_property(object, "pcpu")));
    });
    assert!(harness.client.add_object_events(notifier).is_err());

    let server_object = harness.bus.process_object(5, 5, 0);
    harness
        .peer
        .send(&PacketBuilder::event(harness.bus.updated_event(&server_object, 61)));
    assert!(harness.pump_until(|| harness.trace.len() == 2));
    assert!(seen.lock().is_empty());
    assert_eq!(u32_property(&harness.client.get_object(5).unwrap(), "pcpu"), 61);
    harness.client.stop();
}

#[test]
fn test_call_handles_wrap_to_one() {
    let harness = ManualClient::connect(&[1]);
    let object = harness.client.get_object(1).unwrap();
    let mut handles = Vec::with_capacity(usize::from(u16::MAX));
    for _ in 0..u16::MAX {
        handles.push(
            harness
                .client
                .call_bus_method(harness.bus.kill_call(&object, 0), None)
                .unwrap(),
        );
    }

    assert_eq!(handles[0], 2);
    assert_eq!(handles[usize::from(u16::MAX) - 2], u16::MAX);
    assert_eq!(handles[usize::from(u16::MAX) - 1], 1);
    assert!(!handles.contains(&0));
    assert_eq!(harness.client.pending_calls(), usize::from(u16::MAX));
    harness.client.stop();
}
