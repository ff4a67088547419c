use thiserror::Error;

/// Errors that can occur while parsing a bus address
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The family prefix is neither `inet` nor `unix`
    #[error("Unknown address family in '{address}'. Expected 'inet:<host>:<port>' or 'unix:<path>'")]
    UnknownFamily { address: String },

    /// Wrong number of colon delimited tokens for the family
    #[error("Malformed address '{address}'")]
    Malformed { address: String },

    /// The port is not a valid u16
    #[error("Invalid port '{port}' in address '{address}'")]
    InvalidPort { address: String, port: String },

    /// Unix paths must start with '/' or '@/'
    #[error("Invalid unix path '{path}'. The path must start with '/' or '@/'")]
    InvalidUnixPath { path: String },
}
