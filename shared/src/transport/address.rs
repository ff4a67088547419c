use std::{fmt, str::FromStr};

use super::error::AddressError;

/// Where a bus server listens
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObusAddress {
    Inet { host: String, port: u16 },
    /// A path starting with `/`, or with `@/` for the abstract namespace
    Unix(String),
}

impl ObusAddress {
    pub fn inet(host: impl Into<String>, port: u16) -> Self {
        Self::Inet {
            host: host.into(),
            port,
        }
    }

    pub fn unix(path: impl Into<String>) -> Result<Self, AddressError> {
        let path = path.into();
        let start = usize::from(path.starts_with('@'));
        if path.len() < start + 2 || path.as_bytes()[start] != b'/' {
            return Err(AddressError::InvalidUnixPath { path });
        }
        Ok(Self::Unix(path))
    }

    /// True for unix addresses in the abstract namespace
    pub fn is_abstract(&self) -> bool {
        matches!(self, Self::Unix(path) if path.starts_with('@'))
    }
}

impl FromStr for ObusAddress {
    type Err = AddressError;

    fn from_str(address: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = address.split(':').collect();
        match tokens.as_slice() {
            ["inet", host, port] if !host.is_empty() => {
                let port = port.parse().map_err(|_| AddressError::InvalidPort {
                    address: address.to_string(),
                    port: port.to_string(),
                })?;
                Ok(Self::inet(*host, port))
            }
            ["inet", ..] => Err(AddressError::Malformed {
                address: address.to_string(),
            }),
            ["unix", path] => Self::unix(*path),
            ["unix", ..] => Err(AddressError::Malformed {
                address: address.to_string(),
            }),
            _ => Err(AddressError::UnknownFamily {
                address: address.to_string(),
            }),
        }
    }
}

impl fmt::Display for ObusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inet { host, port } => write!(f, "inet:{}:{}", host, port),
            Self::Unix(path) => write!(f, "unix:{}", path),
        }
    }
}
