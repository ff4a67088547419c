use std::{
    fmt,
    sync::{Arc, Weak},
};

use obus_serde::Buffer;

use crate::{
    bus::{decode_sized, error::BusError, object::Object, table::Bus},
    connection::error::DecodeError,
    descriptor::object::MethodDescriptor,
    structure::{error::StructError, obus_struct::Struct, value::FieldValue},
};

/// Acknowledgement of a method call
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AckKind {
    Invalid = 0,
    Acked = 1,
    Aborted = 2,
    MethodDisabled = 3,
    MethodNotSupported = 4,
    InvalidArguments = 5,
    Refused = 6,
}

impl AckKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Invalid,
            1 => Self::Acked,
            2 => Self::Aborted,
            3 => Self::MethodDisabled,
            4 => Self::MethodNotSupported,
            5 => Self::InvalidArguments,
            6 => Self::Refused,
            _ => return None,
        })
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for AckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Invalid => "INVALID",
            Self::Acked => "ACKED",
            Self::Aborted => "ABORTED",
            Self::MethodDisabled => "METHOD_DISABLED",
            Self::MethodNotSupported => "METHOD_NOT_SUPPORTED",
            Self::InvalidArguments => "INVALID_ARGUMENTS",
            Self::Refused => "REFUSED",
        };
        f.write_str(name)
    }
}

/// Callback fired once with the acknowledgement of a call
pub type AckCallback = Box<dyn FnOnce(AckKind) + Send>;

/// Invocation of a method of an object.
///
/// The handle is 0 until the call is handed to a client, which assigns the
/// next call handle.
pub struct MethodCall {
    descriptor: Arc<MethodDescriptor>,
    object: Weak<Object>,
    object_name: String,
    object_uid: u16,
    object_handle: u16,
    arguments: Struct,
    handle: u16,
    ack: Option<AckKind>,
    callback: Option<AckCallback>,
}

impl MethodCall {
    pub fn new(object: &Arc<Object>, method: &Arc<MethodDescriptor>) -> Result<Self, BusError> {
        let owned = object
            .descriptor()
            .method_by_uid(method.uid())
            .map(|candidate| Arc::ptr_eq(candidate, method))
            .unwrap_or(false);
        if !owned {
            return Err(BusError::MethodNotInObject {
                method: method.name().to_string(),
                object: object.name().to_string(),
            });
        }
        Ok(Self {
            descriptor: method.clone(),
            object: Arc::downgrade(object),
            object_name: object.name().to_string(),
            object_uid: object.uid(),
            object_handle: object.handle(),
            arguments: Struct::new(method.arguments().clone()),
            handle: 0,
            ack: None,
            callback: None,
        })
    }

    pub fn descriptor(&self) -> &Arc<MethodDescriptor> {
        &self.descriptor
    }

    pub fn uid(&self) -> u16 {
        self.descriptor.uid()
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn object(&self) -> Option<Arc<Object>> {
        self.object.upgrade()
    }

    pub fn object_handle(&self) -> u16 {
        self.object_handle
    }

    pub fn is_for(&self, object: &Arc<Object>) -> bool {
        std::ptr::eq(self.object.as_ptr(), Arc::as_ptr(object))
    }

    pub fn arguments(&self) -> &Struct {
        &self.arguments
    }

    pub fn arguments_mut(&mut self) -> &mut Struct {
        &mut self.arguments
    }

    /// Sets an argument by name
    pub fn set_argument<T: FieldValue>(&mut self, name: &str, value: T) -> Result<(), StructError> {
        let descriptor = self.descriptor.arguments().clone();
        let field = descriptor
            .field(name)
            .ok_or_else(|| StructError::FieldNotInStruct {
                name: name.to_string(),
                uid: 0,
            })?;
        self.arguments.set(field, value)
    }

    pub fn handle(&self) -> u16 {
        self.handle
    }

    pub fn ack(&self) -> Option<AckKind> {
        self.ack
    }

    pub fn set_handle(&mut self, handle: u16) {
        self.handle = handle;
    }

    pub fn set_callback(&mut self, callback: Option<AckCallback>) {
        self.callback = callback;
    }

    /// Records the acknowledgement and fires the callback, once
    pub fn complete(&mut self, ack: AckKind) {
        self.ack = Some(ack);
        if let Some(callback) = self.callback.take() {
            callback(ack);
        }
    }

    pub fn encode(&self, buffer: &mut Buffer) {
        buffer.write_u16(self.object_uid);
        buffer.write_u16(self.object_handle);
        buffer.write_u16(self.uid());
        buffer.write_u16(self.handle);
        let marker = buffer.prepare_size_marker();
        self.arguments.encode(buffer);
        buffer.write_size_marker(marker);
    }

    /// Decodes a call against the objects registered in `bus`, as a peer
    /// hosting them does
    pub fn decode(bus: &Bus, buffer: &mut Buffer) -> Result<Option<Self>, DecodeError> {
        let object_uid = buffer.read_u16()?;
        let object_handle = buffer.read_u16()?;
        let uid = buffer.read_u16()?;
        let handle = buffer.read_u16()?;
        decode_sized(buffer, "Call decode", |buffer| {
            let object = bus.resolve(object_uid, object_handle)?;
            let descriptor = object
                .descriptor()
                .method_by_uid(uid)
                .ok_or(DecodeError::UnknownMethod { object_uid, uid })?
                .clone();
            let arguments = Struct::decode(descriptor.arguments(), buffer)?;
            Ok(Self {
                descriptor,
                object: Arc::downgrade(object),
                object_name: object.name().to_string(),
                object_uid,
                object_handle,
                arguments,
                handle,
                ack: None,
                callback: None,
            })
        })
    }
}

impl fmt::Debug for MethodCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodCall")
            .field("method", &self.name())
            .field("object", &self.object_name)
            .field("object_handle", &self.object_handle)
            .field("handle", &self.handle)
            .field("ack", &self.ack)
            .field("arguments", &self.arguments)
            .finish()
    }
}

impl fmt::Display for MethodCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ack = match self.ack {
            Some(ack) => ack.to_string(),
            None => "null".to_string(),
        };
        write!(
            f,
            "{{{} ({}), ack={}, obj={{{}, handle={}}}, struct={}}}",
            self.name(),
            self.uid(),
            ack,
            self.object_name,
            self.object_handle,
            self.arguments
        )
    }
}
