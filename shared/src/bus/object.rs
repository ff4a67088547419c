use std::{fmt, sync::Arc};

use parking_lot::{RwLock, RwLockReadGuard};

use obus_serde::Buffer;

use crate::{
    bus::{decode_sized, error::BusError},
    connection::error::DecodeError,
    descriptor::{
        bus::BusDescriptor,
        enum_driver::{MethodState, WireEnum},
        field::FieldDescriptor,
        object::{MethodDescriptor, ObjectDescriptor},
    },
    structure::{error::StructError, obus_struct::Struct, value::FieldValue},
};

/// Local mirror of an object hosted by the peer.
///
/// Properties are only mutated by committing events, on the thread that
/// dispatches packets; any thread may read them.
#[derive(Debug)]
pub struct Object {
    descriptor: Arc<ObjectDescriptor>,
    handle: u16,
    properties: RwLock<Struct>,
}

impl Object {
    pub fn new(descriptor: Arc<ObjectDescriptor>, handle: u16, properties: Struct) -> Result<Self, BusError> {
        if !Arc::ptr_eq(descriptor.properties(), properties.descriptor()) {
            return Err(BusError::StructMismatch {
                owner: descriptor.name().to_string(),
            });
        }
        Ok(Self {
            descriptor,
            handle,
            properties: RwLock::new(properties),
        })
    }

    pub fn descriptor(&self) -> &Arc<ObjectDescriptor> {
        &self.descriptor
    }

    pub fn uid(&self) -> u16 {
        self.descriptor.uid()
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn handle(&self) -> u16 {
        self.handle
    }

    /// Read access to the whole property struct
    pub fn properties(&self) -> RwLockReadGuard<'_, Struct> {
        self.properties.read()
    }

    pub fn has(&self, field: &FieldDescriptor) -> bool {
        self.properties.read().has(field)
    }

    pub fn get<T: FieldValue>(&self, field: &FieldDescriptor) -> Result<Option<T>, StructError> {
        self.properties.read().get(field)
    }

    /// Looks a property up by name
    pub fn get_by_name<T: FieldValue>(&self, name: &str) -> Result<Option<T>, StructError> {
        let field = self
            .descriptor
            .field(name)
            .ok_or_else(|| StructError::FieldNotInStruct {
                name: name.to_string(),
                uid: 0,
            })?;
        self.get(field)
    }

    /// Current state of one of this object's methods
    pub fn method_state(&self, method: &MethodDescriptor) -> MethodState {
        let Some(field) = self.descriptor.method_state_field(method) else {
            return MethodState::NotSupported;
        };
        let init = field
            .driver()
            .map(|driver| driver.init_value())
            .unwrap_or(MethodState::INIT);
        self.properties
            .read()
            .get_enum::<MethodState>(field)
            .ok()
            .flatten()
            .or_else(|| MethodState::from_wire(init))
            .unwrap_or_default()
    }

    pub(crate) fn merge(&self, delta: &Struct) -> Result<(), StructError> {
        self.properties.write().merge(delta)
    }

    pub fn encode(&self, buffer: &mut Buffer) {
        buffer.write_u16(self.uid());
        buffer.write_u16(self.handle);
        let marker = buffer.prepare_size_marker();
        self.properties.read().encode(buffer);
        buffer.write_size_marker(marker);
    }

    /// Decodes an object; `Ok(None)` when its content was unusable and skipped
    pub fn decode(bus: &BusDescriptor, buffer: &mut Buffer) -> Result<Option<Self>, DecodeError> {
        let uid = buffer.read_u16()?;
        let handle = buffer.read_u16()?;
        decode_sized(buffer, "Object decode", |buffer| {
            let descriptor = bus
                .object_by_uid(uid)
                .ok_or(DecodeError::UnknownObject { uid })?;
            let properties = Struct::decode(descriptor.properties(), buffer)?;
            Ok(Self {
                descriptor: descriptor.clone(),
                handle,
                properties: RwLock::new(properties),
            })
        })
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}({}), handle={}, struct={}}}",
            self.name(),
            self.uid(),
            self.handle,
            self.properties.read()
        )
    }
}
