use std::{fmt, sync::Arc};

use super::enum_driver::EnumDriver;

/// Bit set in a field type byte when the field is an array
pub const FIELD_ARRAY: u8 = 0x80;
/// Mask extracting the scalar kind from a field type byte
pub const FIELD_MASK: u8 = 0x7f;

/// Scalar family of a field, as transmitted in the low 7 bits of the type byte
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    U8 = 0,
    I8 = 1,
    U16 = 2,
    I16 = 3,
    U32 = 4,
    I32 = 5,
    U64 = 6,
    I64 = 7,
    Enum = 8,
    String = 9,
    Bool = 10,
    F32 = 11,
    F64 = 12,
}

impl FieldKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::U8,
            1 => Self::I8,
            2 => Self::U16,
            3 => Self::I16,
            4 => Self::U32,
            5 => Self::I32,
            6 => Self::U64,
            7 => Self::I64,
            8 => Self::Enum,
            9 => Self::String,
            10 => Self::Bool,
            11 => Self::F32,
            12 => Self::F64,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::U64 => "u64",
            Self::I64 => "i64",
            Self::Enum => "enum",
            Self::String => "string",
            Self::Bool => "bool",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }

    /// Encoded size of one value, `None` for strings
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            Self::U8 | Self::I8 | Self::Bool => Some(1),
            Self::U16 | Self::I16 => Some(2),
            Self::U32 | Self::I32 | Self::Enum | Self::F32 => Some(4),
            Self::U64 | Self::I64 | Self::F64 => Some(8),
            Self::String => None,
        }
    }
}

/// Complete type of a field: a scalar kind, optionally an array of it
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldType {
    kind: FieldKind,
    array: bool,
}

impl FieldType {
    pub const fn scalar(kind: FieldKind) -> Self {
        Self { kind, array: false }
    }

    pub const fn array(kind: FieldKind) -> Self {
        Self { kind, array: true }
    }

    /// Parses a wire type byte, `None` if the scalar kind is unknown
    pub fn from_byte(byte: u8) -> Option<Self> {
        let kind = FieldKind::from_u8(byte & FIELD_MASK)?;
        Some(Self {
            kind,
            array: byte & FIELD_ARRAY != 0,
        })
    }

    pub fn to_byte(&self) -> u8 {
        let base = self.kind as u8;
        if self.array {
            base | FIELD_ARRAY
        } else {
            base
        }
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn is_array(&self) -> bool {
        self.array
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.array {
            write!(f, "{}[]", self.kind.name())
        } else {
            f.write_str(self.kind.name())
        }
    }
}

/// What a field is used for inside its struct
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FieldRole {
    Property,
    MethodState,
    Argument,
}

/// Schema of one struct field.
///
/// The dense `index` is assigned when the field is added to a
/// [`StructDescriptor`](super::StructDescriptor); a standalone descriptor
/// reports index 0.
#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    name: String,
    uid: u16,
    field_type: FieldType,
    role: FieldRole,
    driver: Option<Arc<EnumDriver>>,
    index: usize,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, uid: u16, field_type: FieldType, role: FieldRole) -> Self {
        Self {
            name: name.into(),
            uid,
            field_type,
            role,
            driver: None,
            index: 0,
        }
    }

    pub fn property(name: impl Into<String>, uid: u16, field_type: FieldType) -> Self {
        Self::new(name, uid, field_type, FieldRole::Property)
    }

    pub fn argument(name: impl Into<String>, uid: u16, field_type: FieldType) -> Self {
        Self::new(name, uid, field_type, FieldRole::Argument)
    }

    /// Attaches the enum driver used to validate values of an enum field
    pub fn with_driver(mut self, driver: Arc<EnumDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uid(&self) -> u16 {
        self.uid
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn role(&self) -> FieldRole {
        self.role
    }

    pub fn driver(&self) -> Option<&Arc<EnumDriver>> {
        self.driver.as_ref()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }
}

impl PartialEq for FieldDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
            && self.index == other.index
            && self.field_type == other.field_type
            && self.name == other.name
    }
}
