use std::fmt;

use obus_serde::{Buffer, BufferError};

use crate::descriptor::field::{FieldKind, FieldType};

/// One value of a scalar field family
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    Enum(i32),
    String(Option<String>),
    Bool(bool),
    F32(f32),
    F64(f64),
}

impl Scalar {
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::U8(_) => FieldKind::U8,
            Self::I8(_) => FieldKind::I8,
            Self::U16(_) => FieldKind::U16,
            Self::I16(_) => FieldKind::I16,
            Self::U32(_) => FieldKind::U32,
            Self::I32(_) => FieldKind::I32,
            Self::U64(_) => FieldKind::U64,
            Self::I64(_) => FieldKind::I64,
            Self::Enum(_) => FieldKind::Enum,
            Self::String(_) => FieldKind::String,
            Self::Bool(_) => FieldKind::Bool,
            Self::F32(_) => FieldKind::F32,
            Self::F64(_) => FieldKind::F64,
        }
    }

    pub fn encode(&self, buffer: &mut Buffer) {
        match self {
            Self::U8(value) => buffer.write_u8(*value),
            Self::I8(value) => buffer.write_i8(*value),
            Self::U16(value) => buffer.write_u16(*value),
            Self::I16(value) => buffer.write_i16(*value),
            Self::U32(value) => buffer.write_u32(*value),
            Self::I32(value) => buffer.write_i32(*value),
            Self::U64(value) => buffer.write_u64(*value),
            Self::I64(value) => buffer.write_i64(*value),
            Self::Enum(value) => buffer.write_i32(*value),
            Self::String(value) => buffer.write_string(value.as_deref()),
            Self::Bool(value) => buffer.write_bool(*value),
            Self::F32(value) => buffer.write_f32(*value),
            Self::F64(value) => buffer.write_f64(*value),
        }
    }

    pub fn decode(kind: FieldKind, buffer: &mut Buffer) -> Result<Self, BufferError> {
        Ok(match kind {
            FieldKind::U8 => Self::U8(buffer.read_u8()?),
            FieldKind::I8 => Self::I8(buffer.read_i8()?),
            FieldKind::U16 => Self::U16(buffer.read_u16()?),
            FieldKind::I16 => Self::I16(buffer.read_i16()?),
            FieldKind::U32 => Self::U32(buffer.read_u32()?),
            FieldKind::I32 => Self::I32(buffer.read_i32()?),
            FieldKind::U64 => Self::U64(buffer.read_u64()?),
            FieldKind::I64 => Self::I64(buffer.read_i64()?),
            FieldKind::Enum => Self::Enum(buffer.read_i32()?),
            FieldKind::String => Self::String(buffer.read_string()?),
            FieldKind::Bool => Self::Bool(buffer.read_bool()?),
            FieldKind::F32 => Self::F32(buffer.read_f32()?),
            FieldKind::F64 => Self::F64(buffer.read_f64()?),
        })
    }

    /// Moves past one encoded value without materialising it
    pub fn skip(kind: FieldKind, buffer: &mut Buffer) -> Result<(), BufferError> {
        match kind.fixed_size() {
            Some(size) => buffer.skip(size),
            None => {
                let size = buffer.read_u32()?;
                buffer.skip(size as usize)
            }
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8(value) => write!(f, "{}", value),
            Self::I8(value) => write!(f, "{}", value),
            Self::U16(value) => write!(f, "{}", value),
            Self::I16(value) => write!(f, "{}", value),
            Self::U32(value) => write!(f, "{}", value),
            Self::I32(value) => write!(f, "{}", value),
            Self::U64(value) => write!(f, "{}", value),
            Self::I64(value) => write!(f, "{}", value),
            Self::Enum(value) => write!(f, "{}", value),
            Self::String(Some(value)) => f.write_str(value),
            Self::String(None) => f.write_str("null"),
            Self::Bool(value) => write!(f, "{}", value),
            Self::F32(value) => write!(f, "{}", value),
            Self::F64(value) => write!(f, "{}", value),
        }
    }
}

/// Content of a struct slot: a scalar or a homogeneous array of scalars
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Array(Vec<Scalar>),
}

impl Value {
    /// Whether this value can be stored in a field of type `field_type`
    pub fn matches(&self, field_type: FieldType) -> bool {
        match self {
            Self::Scalar(scalar) => !field_type.is_array() && scalar.kind() == field_type.kind(),
            Self::Array(items) => {
                field_type.is_array() && items.iter().all(|item| item.kind() == field_type.kind())
            }
        }
    }

    /// Short description of the value's type, used in error messages
    pub fn type_name(&self) -> String {
        match self {
            Self::Scalar(scalar) => scalar.kind().name().to_string(),
            Self::Array(items) => match items.first() {
                Some(item) => format!("{}[]", item.kind().name()),
                None => "[]".to_string(),
            },
        }
    }

    pub fn encode(&self, buffer: &mut Buffer) {
        match self {
            Self::Scalar(scalar) => scalar.encode(buffer),
            Self::Array(items) => {
                buffer.write_u32(items.len() as u32);
                for item in items {
                    item.encode(buffer);
                }
            }
        }
    }

    pub fn decode(field_type: FieldType, buffer: &mut Buffer) -> Result<Self, BufferError> {
        if !field_type.is_array() {
            return Ok(Self::Scalar(Scalar::decode(field_type.kind(), buffer)?));
        }
        let count = buffer.read_u32()? as usize;
        // the count is untrusted, never reserve more than the bytes left
        let mut items = Vec::with_capacity(count.min(buffer.remaining()));
        for _ in 0..count {
            items.push(Scalar::decode(field_type.kind(), buffer)?);
        }
        Ok(Self::Array(items))
    }

    pub fn skip(field_type: FieldType, buffer: &mut Buffer) -> Result<(), BufferError> {
        if !field_type.is_array() {
            return Scalar::skip(field_type.kind(), buffer);
        }
        let count = buffer.read_u32()?;
        for _ in 0..count {
            Scalar::skip(field_type.kind(), buffer)?;
        }
        Ok(())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(scalar) => scalar.fmt(f),
            Self::Array(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    item.fmt(f)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Raw wire value of an enum field
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EnumValue(pub i32);

/// A Rust type that can be read from and written to a field of a fixed type
pub trait FieldValue: Sized {
    const FIELD_TYPE: FieldType;

    fn into_value(self) -> Value;
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! impl_field_value {
    ($t:ty, $variant:ident, $kind:ident) => {
        impl FieldValue for $t {
            const FIELD_TYPE: FieldType = FieldType::scalar(FieldKind::$kind);

            fn into_value(self) -> Value {
                Value::Scalar(Scalar::$variant(self))
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::Scalar(Scalar::$variant(inner)) => Some(*inner),
                    _ => None,
                }
            }
        }

        impl FieldValue for Vec<$t> {
            const FIELD_TYPE: FieldType = FieldType::array(FieldKind::$kind);

            fn into_value(self) -> Value {
                Value::Array(self.into_iter().map(Scalar::$variant).collect())
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::Array(items) => items
                        .iter()
                        .map(|item| match item {
                            Scalar::$variant(inner) => Some(*inner),
                            _ => None,
                        })
                        .collect(),
                    _ => None,
                }
            }
        }
    };
}

impl_field_value!(u8, U8, U8);
impl_field_value!(i8, I8, I8);
impl_field_value!(u16, U16, U16);
impl_field_value!(i16, I16, I16);
impl_field_value!(u32, U32, U32);
impl_field_value!(i32, I32, I32);
impl_field_value!(u64, U64, U64);
impl_field_value!(i64, I64, I64);
impl_field_value!(bool, Bool, Bool);
impl_field_value!(f32, F32, F32);
impl_field_value!(f64, F64, F64);

impl FieldValue for EnumValue {
    const FIELD_TYPE: FieldType = FieldType::scalar(FieldKind::Enum);

    fn into_value(self) -> Value {
        Value::Scalar(Scalar::Enum(self.0))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Scalar(Scalar::Enum(inner)) => Some(EnumValue(*inner)),
            _ => None,
        }
    }
}

impl FieldValue for Vec<EnumValue> {
    const FIELD_TYPE: FieldType = FieldType::array(FieldKind::Enum);

    fn into_value(self) -> Value {
        Value::Array(self.into_iter().map(|item| Scalar::Enum(item.0)).collect())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Scalar::Enum(inner) => Some(EnumValue(*inner)),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }
}

impl FieldValue for String {
    const FIELD_TYPE: FieldType = FieldType::scalar(FieldKind::String);

    fn into_value(self) -> Value {
        Value::Scalar(Scalar::String(Some(self)))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Scalar(Scalar::String(inner)) => inner.clone(),
            _ => None,
        }
    }
}

/// A string field that may hold the null string
impl FieldValue for Option<String> {
    const FIELD_TYPE: FieldType = FieldType::scalar(FieldKind::String);

    fn into_value(self) -> Value {
        Value::Scalar(Scalar::String(self))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Scalar(Scalar::String(inner)) => Some(inner.clone()),
            _ => None,
        }
    }
}

impl FieldValue for Vec<String> {
    const FIELD_TYPE: FieldType = FieldType::array(FieldKind::String);

    fn into_value(self) -> Value {
        Value::Array(
            self.into_iter()
                .map(|item| Scalar::String(Some(item)))
                .collect(),
        )
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Scalar::String(inner) => inner.clone(),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }
}
