pub mod error;
pub mod obus_struct;
pub mod value;
