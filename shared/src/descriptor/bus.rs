use std::{collections::HashMap, sync::Arc};

use super::{error::DescriptorError, object::ObjectDescriptor};

/// Synthesised by the client when a connection is accepted
pub const BUS_EVENT_CONNECTED: u16 = 1;
/// Synthesised by the client when an established connection is lost
pub const BUS_EVENT_DISCONNECTED: u16 = 2;
/// Synthesised by the client when the peer refuses the connection
pub const BUS_EVENT_CONNECTION_REFUSED: u16 = 3;

const RESERVED_BUS_EVENTS: [(&str, u16); 3] = [
    ("connected", BUS_EVENT_CONNECTED),
    ("disconnected", BUS_EVENT_DISCONNECTED),
    ("connection_refused", BUS_EVENT_CONNECTION_REFUSED),
];

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BusEventDescriptor {
    name: String,
    uid: u16,
}

impl BusEventDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uid(&self) -> u16 {
        self.uid
    }

    pub fn is_reserved(&self) -> bool {
        RESERVED_BUS_EVENTS.iter().any(|(_, uid)| *uid == self.uid)
    }
}

/// Root of the descriptor tree of a bus
#[derive(Debug)]
pub struct BusDescriptor {
    name: String,
    crc: u32,
    objects: Vec<Arc<ObjectDescriptor>>,
    bus_events: Vec<Arc<BusEventDescriptor>>,
    object_uids: HashMap<u16, usize>,
    bus_event_uids: HashMap<u16, usize>,
}

impl BusDescriptor {
    pub fn builder(name: impl Into<String>, crc: u32) -> BusDescriptorBuilder {
        BusDescriptorBuilder {
            name: name.into(),
            crc,
            objects: Vec::new(),
            bus_events: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn crc(&self) -> u32 {
        self.crc
    }

    pub fn objects(&self) -> &[Arc<ObjectDescriptor>] {
        &self.objects
    }

    pub fn object_by_uid(&self, uid: u16) -> Option<&Arc<ObjectDescriptor>> {
        self.object_uids.get(&uid).map(|index| &self.objects[*index])
    }

    pub fn object(&self, name: &str) -> Option<&Arc<ObjectDescriptor>> {
        self.objects.iter().find(|object| object.name() == name)
    }

    /// All bus events, the three reserved ones first
    pub fn bus_events(&self) -> &[Arc<BusEventDescriptor>] {
        &self.bus_events
    }

    pub fn bus_event_by_uid(&self, uid: u16) -> Option<&Arc<BusEventDescriptor>> {
        self.bus_event_uids
            .get(&uid)
            .map(|index| &self.bus_events[*index])
    }

    pub fn bus_event(&self, name: &str) -> Option<&Arc<BusEventDescriptor>> {
        self.bus_events.iter().find(|event| event.name == name)
    }
}

pub struct BusDescriptorBuilder {
    name: String,
    crc: u32,
    objects: Vec<Arc<ObjectDescriptor>>,
    bus_events: Vec<(String, u16)>,
}

impl BusDescriptorBuilder {
    pub fn object(mut self, object: Arc<ObjectDescriptor>) -> Self {
        self.objects.push(object);
        self
    }

    pub fn bus_event(mut self, name: impl Into<String>, uid: u16) -> Self {
        self.bus_events.push((name.into(), uid));
        self
    }

    pub fn build(self) -> Result<Arc<BusDescriptor>, DescriptorError> {
        let mut object_uids = HashMap::new();
        for (index, object) in self.objects.iter().enumerate() {
            if object_uids.insert(object.uid(), index).is_some() {
                return Err(DescriptorError::DuplicateObjectUid {
                    bus: self.name,
                    name: object.name().to_string(),
                    uid: object.uid(),
                });
            }
        }

        let mut bus_events: Vec<Arc<BusEventDescriptor>> = RESERVED_BUS_EVENTS
            .iter()
            .map(|(name, uid)| {
                Arc::new(BusEventDescriptor {
                    name: name.to_string(),
                    uid: *uid,
                })
            })
            .collect();
        let mut bus_event_uids: HashMap<u16, usize> = bus_events
            .iter()
            .enumerate()
            .map(|(index, event)| (event.uid, index))
            .collect();

        for (name, uid) in self.bus_events {
            if RESERVED_BUS_EVENTS.iter().any(|(_, reserved)| *reserved == uid) {
                return Err(DescriptorError::ReservedBusEventUid { name, uid });
            }
            if bus_event_uids.insert(uid, bus_events.len()).is_some() {
                return Err(DescriptorError::DuplicateBusEventUid {
                    bus: self.name,
                    name,
                    uid,
                });
            }
            bus_events.push(Arc::new(BusEventDescriptor { name, uid }));
        }

        Ok(Arc::new(BusDescriptor {
            name: self.name,
            crc: self.crc,
            objects: self.objects,
            bus_events,
            object_uids,
            bus_event_uids,
        }))
    }
}
