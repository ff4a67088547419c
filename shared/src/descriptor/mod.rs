pub mod bus;
pub mod enum_driver;
pub mod error;
pub mod field;
pub mod object;
pub mod structure;
