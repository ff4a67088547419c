//! # Obus Client
//! A client that mirrors the objects published on an obus server, notifies
//! their changes to typed listeners and sends method calls back.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

#[macro_use]
extern crate cfg_if;

pub use obus_shared::{
    AckCallback, AckKind, BusDescriptor, BusEventDescriptor, MethodCall, Object, ObjectDescriptor,
    ObjectEvent, ObusAddress,
};

mod client;
mod client_config;
mod connection;
mod error;
mod notify;
mod transport;

pub use client::Client;
pub use client_config::{ClientConfig, DispatchMode};
pub use connection::state::ConnectionState;
pub use error::ClientError;
pub use notify::{
    bus_events::BusEventNotifier,
    listener::{ListenerKey, Phase},
    object_events::{EventFilter, ObjectEventNotifier},
    registry::{ObjectRegistry, RegistryObserver},
};
pub use transport::{Connector, Socket, SystemConnector};
