use std::{fmt, sync::Arc};

use log::error;

use obus_serde::Buffer;

use crate::{
    bus::{event::ObjectEvent, object::Object, table::Bus},
    connection::error::DecodeError,
    descriptor::bus::BusEventDescriptor,
};

/// A composite delivery: objects to register, objects to unregister and
/// events to commit, dispatched together.
#[derive(Debug)]
pub struct BusEvent {
    descriptor: Arc<BusEventDescriptor>,
    register: Vec<Arc<Object>>,
    unregister: Vec<Arc<Object>>,
    events: Vec<ObjectEvent>,
    dispatched: bool,
}

impl BusEvent {
    pub fn new(descriptor: Arc<BusEventDescriptor>) -> Self {
        Self {
            descriptor,
            register: Vec::new(),
            unregister: Vec::new(),
            events: Vec::new(),
            dispatched: false,
        }
    }

    pub fn descriptor(&self) -> &Arc<BusEventDescriptor> {
        &self.descriptor
    }

    pub fn uid(&self) -> u16 {
        self.descriptor.uid()
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn register_list(&self) -> &[Arc<Object>] {
        &self.register
    }

    pub fn unregister_list(&self) -> &[Arc<Object>] {
        &self.unregister
    }

    pub fn events(&self) -> &[ObjectEvent] {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut [ObjectEvent] {
        &mut self.events
    }

    pub fn add_register(&mut self, object: Arc<Object>) {
        self.register.push(object);
    }

    pub fn add_unregister(&mut self, object: Arc<Object>) {
        self.unregister.push(object);
    }

    pub fn add_event(&mut self, event: ObjectEvent) {
        self.events.push(event);
    }

    pub fn is_dispatched(&self) -> bool {
        self.dispatched
    }

    /// Flags the event as dispatched. Returns false if it already was.
    pub fn mark_dispatched(&mut self) -> bool {
        !std::mem::replace(&mut self.dispatched, true)
    }

    pub fn encode(&self, buffer: &mut Buffer) {
        buffer.write_u16(self.uid());
        buffer.write_u32(self.register.len() as u32);
        buffer.write_u32(self.unregister.len() as u32);
        buffer.write_u32(self.events.len() as u32);
        for object in &self.register {
            object.encode(buffer);
        }
        for object in &self.unregister {
            buffer.write_u16(object.uid());
            buffer.write_u16(object.handle());
        }
        for event in &self.events {
            event.encode(buffer);
        }
    }

    /// Decodes a bus event. Unregistrations that do not resolve to a
    /// registered object are logged and dropped.
    pub fn decode(bus: &Bus, buffer: &mut Buffer) -> Result<Self, DecodeError> {
        let uid = buffer.read_u16()?;
        let descriptor = bus
            .descriptor()
            .bus_event_by_uid(uid)
            .ok_or(DecodeError::UnknownBusEvent { uid })?
            .clone();
        let mut output = Self::new(descriptor);

        let register_count = buffer.read_u32()?;
        let unregister_count = buffer.read_u32()?;
        let event_count = buffer.read_u32()?;

        for _ in 0..register_count {
            if let Some(object) = Object::decode(bus.descriptor(), buffer)? {
                output.register.push(Arc::new(object));
            }
        }

        for _ in 0..unregister_count {
            let object_uid = buffer.read_u16()?;
            let handle = buffer.read_u16()?;
            match bus.resolve(object_uid, handle) {
                Ok(object) => output.unregister.push(object.clone()),
                Err(err) => error!("Bus event decode: {}", err),
            }
        }

        for _ in 0..event_count {
            if let Some(event) = ObjectEvent::decode(bus, buffer)? {
                output.events.push(event);
            }
        }

        Ok(output)
    }
}

impl fmt::Display for BusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ {} ({}) }}", self.name(), self.uid())
    }
}
