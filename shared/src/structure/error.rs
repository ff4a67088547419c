use thiserror::Error;

use crate::descriptor::field::FieldType;

/// Errors raised when a struct is used with the wrong field or value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructError {
    /// The field descriptor does not belong to the struct's descriptor
    #[error("Field '{name}' (uid {uid}) is not part of this struct")]
    FieldNotInStruct { name: String, uid: u16 },

    /// The value or requested type does not match the field type
    #[error("Field '{name}' has type {expected}, got {found}")]
    TypeMismatch {
        name: String,
        expected: FieldType,
        found: String,
    },

    /// The value is not part of the field's enum driver
    #[error("Value {value} is not valid for enum field '{name}'")]
    InvalidEnumValue { name: String, value: i32 },

    /// Tried to merge structs built on different descriptors
    #[error("Cannot merge structs built on different descriptors")]
    DescriptorMismatch,
}
