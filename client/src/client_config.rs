use std::{default::Default, time::Duration};

/// Where listeners of a client are run
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DispatchMode {
    /// A dedicated dispatcher thread, spawned by `start`
    Thread,
    /// The application drains events with `Client::process_events`
    Manual,
}

/// Contains Config properties which will be used by a Client
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Name sent to the server in the connection request
    pub name: String,
    /// Delay before reconnecting after a connection failed or was lost
    pub reconnect_delay: Duration,
    /// Size of the chunks read from the socket
    pub read_buffer_size: usize,
    /// Thread on which packets are dispatched and listeners run
    pub dispatch: DispatchMode,
    /// Log objects added and removed
    pub log_objects: bool,
    /// Log events and bus events
    pub log_events: bool,
    /// Log method calls and their acknowledgements
    pub log_calls: bool,
}

impl ClientConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: "obus-client".to_string(),
            reconnect_delay: Duration::from_secs(1),
            read_buffer_size: 1024,
            dispatch: DispatchMode::Thread,
            log_objects: false,
            log_events: false,
            log_calls: false,
        }
    }
}
