use std::{
    fmt,
    sync::{Arc, Weak},
};

use log::{error, warn};

use obus_serde::Buffer;

use crate::{
    bus::{decode_sized, error::BusError, object::Object, table::Bus},
    connection::error::DecodeError,
    descriptor::object::EventDescriptor,
    structure::obus_struct::Struct,
};

/// An event emitted by an object, carrying the property changes it applies.
///
/// The event only refers to its object weakly; the handle table keeps the
/// object alive.
#[derive(Debug)]
pub struct ObjectEvent {
    descriptor: Arc<EventDescriptor>,
    object: Weak<Object>,
    object_name: String,
    object_uid: u16,
    object_handle: u16,
    delta: Struct,
    committed: bool,
}

impl ObjectEvent {
    pub fn new(object: &Arc<Object>, descriptor: Arc<EventDescriptor>, delta: Struct) -> Result<Self, BusError> {
        let owned = object
            .descriptor()
            .event_by_uid(descriptor.uid())
            .map(|event| Arc::ptr_eq(event, &descriptor))
            .unwrap_or(false);
        if !owned {
            return Err(BusError::StructMismatch {
                owner: format!("{}.{}", object.name(), descriptor.name()),
            });
        }
        if !Arc::ptr_eq(object.descriptor().properties(), delta.descriptor()) {
            return Err(BusError::StructMismatch {
                owner: object.name().to_string(),
            });
        }
        Ok(Self {
            descriptor,
            object: Arc::downgrade(object),
            object_name: object.name().to_string(),
            object_uid: object.uid(),
            object_handle: object.handle(),
            delta,
            committed: false,
        })
    }

    pub fn descriptor(&self) -> &Arc<EventDescriptor> {
        &self.descriptor
    }

    pub fn uid(&self) -> u16 {
        self.descriptor.uid()
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// The object this event applies to, if it is still alive
    pub fn object(&self) -> Option<Arc<Object>> {
        self.object.upgrade()
    }

    pub fn object_handle(&self) -> u16 {
        self.object_handle
    }

    pub fn is_for(&self, object: &Arc<Object>) -> bool {
        std::ptr::eq(self.object.as_ptr(), Arc::as_ptr(object))
    }

    /// Changes carried by the event
    pub fn delta(&self) -> &Struct {
        &self.delta
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Merges the delta into the object's properties. Only the first call has
    /// an effect.
    pub fn commit(&mut self) {
        if self.committed {
            return;
        }
        self.committed = true;
        let Some(object) = self.object.upgrade() else {
            warn!("Event {} committed after its object was dropped", self);
            return;
        };
        if let Err(err) = object.merge(&self.delta) {
            error!("Event {} commit failed: {}", self, err);
        }
    }

    pub fn encode(&self, buffer: &mut Buffer) {
        buffer.write_u16(self.object_uid);
        buffer.write_u16(self.object_handle);
        buffer.write_u16(self.uid());
        let marker = buffer.prepare_size_marker();
        self.delta.encode(buffer);
        buffer.write_size_marker(marker);
    }

    /// Decodes an event against the objects currently registered in `bus`
    pub fn decode(bus: &Bus, buffer: &mut Buffer) -> Result<Option<Self>, DecodeError> {
        let object_uid = buffer.read_u16()?;
        let handle = buffer.read_u16()?;
        let uid = buffer.read_u16()?;
        decode_sized(buffer, "Event decode", |buffer| {
            let object = bus.resolve(object_uid, handle)?;
            let descriptor = object
                .descriptor()
                .event_by_uid(uid)
                .ok_or(DecodeError::UnknownEvent { object_uid, uid })?
                .clone();
            let delta = Struct::decode(object.descriptor().properties(), buffer)?;

            for (field, _) in delta.iter() {
                if !descriptor.allows(field) {
                    warn!(
                        "Event decode: event '{}' of object '{}' updates undeclared field '{}'",
                        descriptor.name(),
                        object.name(),
                        field.name()
                    );
                }
            }

            Ok(Self {
                descriptor,
                object: Arc::downgrade(object),
                object_name: object.name().to_string(),
                object_uid,
                object_handle: handle,
                delta,
                committed: false,
            })
        })
    }
}

impl fmt::Display for ObjectEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{} ({}), obj={{{}, handle={}}}, struct={}}}",
            self.name(),
            self.uid(),
            self.object_name,
            self.object_handle,
            self.delta
        )
    }
}
