use std::{fmt, sync::Arc};

use log::warn;

use obus_serde::Buffer;

use crate::{
    connection::error::DecodeError,
    descriptor::{
        enum_driver::WireEnum,
        field::{FieldDescriptor, FieldKind, FieldType},
        structure::StructDescriptor,
    },
    structure::{
        error::StructError,
        value::{FieldValue, Scalar, Value},
    },
};

/// Sparse field store keyed by the dense index of each field.
///
/// A slot is either absent or holds a value whose type matches its field
/// descriptor. Absent slots are not encoded.
#[derive(Clone, Debug)]
pub struct Struct {
    descriptor: Arc<StructDescriptor>,
    values: Vec<Option<Value>>,
}

impl Struct {
    pub fn new(descriptor: Arc<StructDescriptor>) -> Self {
        let values = vec![None; descriptor.len()];
        Self { descriptor, values }
    }

    pub fn descriptor(&self) -> &Arc<StructDescriptor> {
        &self.descriptor
    }

    pub fn has(&self, field: &FieldDescriptor) -> bool {
        self.slot(field)
            .map(|index| self.values[index].is_some())
            .unwrap_or(false)
    }

    pub fn value(&self, field: &FieldDescriptor) -> Option<&Value> {
        let index = self.slot(field).ok()?;
        self.values[index].as_ref()
    }

    /// Reads a field as `T`, `Ok(None)` when the field is absent
    pub fn get<T: FieldValue>(&self, field: &FieldDescriptor) -> Result<Option<T>, StructError> {
        let index = self.slot(field)?;
        Self::check_type(field, T::FIELD_TYPE, || T::FIELD_TYPE.to_string())?;
        Ok(self.values[index].as_ref().and_then(T::from_value))
    }

    pub fn set<T: FieldValue>(&mut self, field: &FieldDescriptor, value: T) -> Result<(), StructError> {
        self.set_value(field, value.into_value())
    }

    pub fn set_value(&mut self, field: &FieldDescriptor, value: Value) -> Result<(), StructError> {
        let index = self.slot(field)?;
        if !value.matches(field.field_type()) {
            return Err(StructError::TypeMismatch {
                name: field.name().to_string(),
                expected: field.field_type(),
                found: value.type_name(),
            });
        }
        if let Some(invalid) = invalid_enum_value(field, &value) {
            return Err(StructError::InvalidEnumValue {
                name: field.name().to_string(),
                value: invalid,
            });
        }
        self.values[index] = Some(value);
        Ok(())
    }

    /// Marks a field as absent
    pub fn clear(&mut self, field: &FieldDescriptor) -> Result<(), StructError> {
        let index = self.slot(field)?;
        self.values[index] = None;
        Ok(())
    }

    pub fn get_enum<E: WireEnum>(&self, field: &FieldDescriptor) -> Result<Option<E>, StructError> {
        let index = self.slot(field)?;
        let expected = FieldType::scalar(FieldKind::Enum);
        Self::check_type(field, expected, || E::NAME.to_string())?;
        Ok(match &self.values[index] {
            Some(Value::Scalar(Scalar::Enum(value))) => E::from_wire(*value),
            _ => None,
        })
    }

    pub fn set_enum<E: WireEnum>(&mut self, field: &FieldDescriptor, value: E) -> Result<(), StructError> {
        self.set_value(field, Value::Scalar(Scalar::Enum(value.to_wire())))
    }

    pub fn present_count(&self) -> usize {
        self.values.iter().filter(|value| value.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.present_count() == 0
    }

    /// Present fields in descriptor order
    pub fn iter(&self) -> impl Iterator<Item = (&FieldDescriptor, &Value)> {
        self.descriptor
            .fields()
            .iter()
            .zip(self.values.iter())
            .filter_map(|(field, value)| value.as_ref().map(|value| (field, value)))
    }

    /// Copies every field present in `delta` into this struct
    pub fn merge(&mut self, delta: &Struct) -> Result<(), StructError> {
        if !Arc::ptr_eq(&self.descriptor, &delta.descriptor) {
            return Err(StructError::DescriptorMismatch);
        }
        for (slot, value) in self.values.iter_mut().zip(delta.values.iter()) {
            if let Some(value) = value {
                *slot = Some(value.clone());
            }
        }
        Ok(())
    }

    pub fn encode(&self, buffer: &mut Buffer) {
        buffer.write_u16(self.present_count() as u16);
        for (field, value) in self.iter() {
            buffer.write_u16(field.uid());
            buffer.write_u8(field.field_type().to_byte());
            value.encode(buffer);
        }
    }

    /// Decodes a struct against `descriptor`.
    ///
    /// Fields with an unknown uid, or whose transmitted type differs from the
    /// declared one, are skipped with a warning.
    pub fn decode(descriptor: &Arc<StructDescriptor>, buffer: &mut Buffer) -> Result<Self, DecodeError> {
        let mut output = Self::new(descriptor.clone());
        let count = buffer.read_u16()?;
        for _ in 0..count {
            let uid = buffer.read_u16()?;
            let type_byte = buffer.read_u8()?;
            let Some(field_type) = FieldType::from_byte(type_byte) else {
                return Err(DecodeError::InvalidFieldType {
                    uid,
                    type_byte,
                });
            };

            let Some(field) = descriptor.field_by_uid(uid) else {
                warn!("Struct decode: unknown field uid={} type={}, skipping", uid, field_type);
                Value::skip(field_type, buffer)?;
                continue;
            };

            if field.field_type() != field_type {
                warn!(
                    "Struct decode: field '{}' uid={} declared as {} but received as {}, skipping",
                    field.name(),
                    uid,
                    field.field_type(),
                    field_type
                );
                Value::skip(field_type, buffer)?;
                continue;
            }

            let value = Value::decode(field_type, buffer)?;
            if let Some(invalid) = invalid_enum_value(field, &value) {
                return Err(DecodeError::InvalidEnumValue {
                    field: field.name().to_string(),
                    value: invalid,
                });
            }
            output.values[field.index()] = Some(value);
        }
        Ok(output)
    }

    fn slot(&self, field: &FieldDescriptor) -> Result<usize, StructError> {
        if self.descriptor.contains(field) {
            Ok(field.index())
        } else {
            Err(StructError::FieldNotInStruct {
                name: field.name().to_string(),
                uid: field.uid(),
            })
        }
    }

    fn check_type(
        field: &FieldDescriptor,
        requested: FieldType,
        found: impl FnOnce() -> String,
    ) -> Result<(), StructError> {
        if field.field_type() == requested {
            Ok(())
        } else {
            Err(StructError::TypeMismatch {
                name: field.name().to_string(),
                expected: field.field_type(),
                found: found(),
            })
        }
    }
}

impl PartialEq for Struct {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.descriptor, &other.descriptor) && self.values == other.values
    }
}

fn invalid_enum_value(field: &FieldDescriptor, value: &Value) -> Option<i32> {
    let driver = field.driver()?;
    let items: &[Scalar] = match value {
        Value::Scalar(scalar) => std::slice::from_ref(scalar),
        Value::Array(items) => items,
    };
    items.iter().find_map(|scalar| match scalar {
        Scalar::Enum(value) if !driver.is_valid(*value) => Some(*value),
        _ => None,
    })
}

impl fmt::Display for Struct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (index, (field, value)) in self.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", field.name(), value)?;
        }
        f.write_str("}")
    }
}
