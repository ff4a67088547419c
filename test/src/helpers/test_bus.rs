use std::sync::Arc;

use obus_shared::{
    BusDescriptor, BusEventDescriptor, EventDescriptor, FieldDescriptor, FieldKind, FieldType,
    MethodCall, MethodDescriptor, Object, ObjectDescriptor, ObjectEvent, Struct,
};

/// Descriptor fixture of a `ps` bus publishing `process` objects.
///
/// `process` (uid 1) has `pid: u32` (1), `name: string` (2) and
/// `pcpu: u32` (5); events `updated` (1, updates pcpu) and `renamed`
/// (2, updates name); method `kill` (10) taking `signal: u32` (1).
/// The bus declares one application bus event, `refresh` (100).
pub struct TestBus {
    pub descriptor: Arc<BusDescriptor>,
}

impl Default for TestBus {
    fn default() -> Self {
        Self::new()
    }
}

impl TestBus {
    pub const CRC: u32 = 0x0B05_CAFE;

    pub fn new() -> Self {
        let process = ObjectDescriptor::builder("process", 1)
            .property("pid", 1, FieldType::scalar(FieldKind::U32))
            .property("name", 2, FieldType::scalar(FieldKind::String))
            .property("pcpu", 5, FieldType::scalar(FieldKind::U32))
            .event("updated", 1, &[5])
            .event("renamed", 2, &[2])
            .method(
                "kill",
                10,
                [FieldDescriptor::argument("signal", 1, FieldType::scalar(FieldKind::U32))],
            )
            .build()
            .unwrap();
        let descriptor = BusDescriptor::builder("ps", Self::CRC)
            .object(process)
            .bus_event("refresh", 100)
            .build()
            .unwrap();
        Self { descriptor }
    }

    pub fn process(&self) -> &Arc<ObjectDescriptor> {
        self.descriptor.object("process").unwrap()
    }

    pub fn field(&self, name: &str) -> &FieldDescriptor {
        self.process().field(name).unwrap()
    }

    pub fn updated(&self) -> Arc<EventDescriptor> {
        self.process().event("updated").unwrap().clone()
    }

    pub fn kill(&self) -> Arc<MethodDescriptor> {
        self.process().method("kill").unwrap().clone()
    }

    pub fn refresh(&self) -> Arc<BusEventDescriptor> {
        self.descriptor.bus_event("refresh").unwrap().clone()
    }

    /// A `process` object as the server publishes it
    pub fn process_object(&self, handle: u16, pid: u32, pcpu: u32) -> Arc<Object> {
        let mut properties = Struct::new(self.process().properties().clone());
        properties.set(self.field("pid"), pid).unwrap();
        properties.set(self.field("pcpu"), pcpu).unwrap();
        Arc::new(Object::new(self.process().clone(), handle, properties).unwrap())
    }

    /// An `updated` event setting the pcpu of `object`
    pub fn updated_event(&self, object: &Arc<Object>, pcpu: u32) -> ObjectEvent {
        let mut delta = Struct::new(self.process().properties().clone());
        delta.set(self.field("pcpu"), pcpu).unwrap();
        ObjectEvent::new(object, self.updated(), delta).unwrap()
    }

    /// A `kill` call on `object`
    pub fn kill_call(&self, object: &Arc<Object>, signal: u32) -> MethodCall {
        let mut call = MethodCall::new(object, &self.kill()).unwrap();
        call.set_argument("signal", signal).unwrap();
        call
    }
}

/// Reads a `u32` property, panicking when it is absent
pub fn u32_property(object: &Object, name: &str) -> u32 {
    object.get_by_name::<u32>(name).unwrap().unwrap()
}
