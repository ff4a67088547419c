use std::{collections::HashMap, sync::Arc};

use super::{
    enum_driver::{EnumDriver, MethodState},
    error::DescriptorError,
    field::{FieldDescriptor, FieldKind, FieldRole, FieldType},
    structure::StructDescriptor,
};

/// Prefix of the struct field carrying the state of a method
pub const METHOD_STATE_PREFIX: &str = "method_state_";

/// Schema of an event emitted by an object
#[derive(Clone, Debug)]
pub struct EventDescriptor {
    name: String,
    uid: u16,
    updates: Vec<u16>,
}

impl EventDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uid(&self) -> u16 {
        self.uid
    }

    /// Uids of the object fields this event is allowed to mutate
    pub fn updates(&self) -> &[u16] {
        &self.updates
    }

    pub fn allows(&self, field: &FieldDescriptor) -> bool {
        self.updates.contains(&field.uid())
    }
}

/// Schema of a method offered by an object
#[derive(Clone, Debug)]
pub struct MethodDescriptor {
    name: String,
    uid: u16,
    object_uid: u16,
    arguments: Arc<StructDescriptor>,
}

impl MethodDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uid(&self) -> u16 {
        self.uid
    }

    /// Uid of the object class declaring this method
    pub fn object_uid(&self) -> u16 {
        self.object_uid
    }

    pub fn arguments(&self) -> &Arc<StructDescriptor> {
        &self.arguments
    }
}

/// Schema of an object class
#[derive(Debug)]
pub struct ObjectDescriptor {
    name: String,
    uid: u16,
    properties: Arc<StructDescriptor>,
    events: Vec<Arc<EventDescriptor>>,
    methods: Vec<Arc<MethodDescriptor>>,
    event_uids: HashMap<u16, usize>,
    method_uids: HashMap<u16, usize>,
}

impl ObjectDescriptor {
    pub fn builder(name: impl Into<String>, uid: u16) -> ObjectDescriptorBuilder {
        ObjectDescriptorBuilder {
            name: name.into(),
            uid,
            fields: Vec::new(),
            events: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uid(&self) -> u16 {
        self.uid
    }

    /// Struct shared by the object and all of its events
    pub fn properties(&self) -> &Arc<StructDescriptor> {
        &self.properties
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.properties.field(name)
    }

    pub fn events(&self) -> &[Arc<EventDescriptor>] {
        &self.events
    }

    pub fn event_by_uid(&self, uid: u16) -> Option<&Arc<EventDescriptor>> {
        self.event_uids.get(&uid).map(|index| &self.events[*index])
    }

    pub fn event(&self, name: &str) -> Option<&Arc<EventDescriptor>> {
        self.events.iter().find(|event| event.name == name)
    }

    pub fn methods(&self) -> &[Arc<MethodDescriptor>] {
        &self.methods
    }

    pub fn method_by_uid(&self, uid: u16) -> Option<&Arc<MethodDescriptor>> {
        self.method_uids.get(&uid).map(|index| &self.methods[*index])
    }

    pub fn method(&self, name: &str) -> Option<&Arc<MethodDescriptor>> {
        self.methods.iter().find(|method| method.name == name)
    }

    /// The `method_state_<name>` field of a method of this object
    pub fn method_state_field(&self, method: &MethodDescriptor) -> Option<&FieldDescriptor> {
        self.properties
            .field_by_uid(method.uid)
            .filter(|field| field.role() == FieldRole::MethodState)
    }
}

/// Collects the fields, events and methods of an object class, then
/// validates them in [`ObjectDescriptorBuilder::build`]
pub struct ObjectDescriptorBuilder {
    name: String,
    uid: u16,
    fields: Vec<FieldDescriptor>,
    events: Vec<(String, u16, Vec<u16>)>,
    methods: Vec<(String, u16, Vec<FieldDescriptor>)>,
}

impl ObjectDescriptorBuilder {
    pub fn property(mut self, name: impl Into<String>, uid: u16, field_type: FieldType) -> Self {
        self.fields
            .push(FieldDescriptor::property(name, uid, field_type));
        self
    }

    pub fn enum_property(
        mut self,
        name: impl Into<String>,
        uid: u16,
        driver: Arc<EnumDriver>,
    ) -> Self {
        self.fields.push(
            FieldDescriptor::property(name, uid, FieldType::scalar(FieldKind::Enum))
                .with_driver(driver),
        );
        self
    }

    pub fn event(mut self, name: impl Into<String>, uid: u16, updates: &[u16]) -> Self {
        self.events.push((name.into(), uid, updates.to_vec()));
        self
    }

    /// Declares a method and the `method_state_<name>` field that goes with it
    pub fn method(
        mut self,
        name: impl Into<String>,
        uid: u16,
        arguments: impl IntoIterator<Item = FieldDescriptor>,
    ) -> Self {
        self.methods
            .push((name.into(), uid, arguments.into_iter().collect()));
        self
    }

    pub fn build(self) -> Result<Arc<ObjectDescriptor>, DescriptorError> {
        let mut properties = StructDescriptor::default();
        for field in self.fields {
            properties.add_field(field)?;
        }

        let method_state_driver = Arc::new(EnumDriver::of::<MethodState>());
        let mut methods = Vec::with_capacity(self.methods.len());
        let mut method_uids = HashMap::new();
        for (name, uid, arguments) in self.methods {
            if method_uids.insert(uid, methods.len()).is_some() {
                return Err(DescriptorError::DuplicateMethodUid {
                    object: self.name,
                    name,
                    uid,
                });
            }
            properties.add_field(
                FieldDescriptor::new(
                    format!("{}{}", METHOD_STATE_PREFIX, name),
                    uid,
                    FieldType::scalar(FieldKind::Enum),
                    FieldRole::MethodState,
                )
                .with_driver(method_state_driver.clone()),
            )?;
            methods.push(Arc::new(MethodDescriptor {
                name,
                uid,
                object_uid: self.uid,
                arguments: Arc::new(StructDescriptor::new(arguments)?),
            }));
        }

        let mut events = Vec::with_capacity(self.events.len());
        let mut event_uids = HashMap::new();
        for (name, uid, updates) in self.events {
            if event_uids.insert(uid, events.len()).is_some() {
                return Err(DescriptorError::DuplicateEventUid {
                    object: self.name,
                    name,
                    uid,
                });
            }
            if let Some(missing) = updates
                .iter()
                .find(|update| properties.field_by_uid(**update).is_none())
            {
                return Err(DescriptorError::UnknownUpdateField {
                    object: self.name,
                    event: name,
                    uid: *missing,
                });
            }
            events.push(Arc::new(EventDescriptor { name, uid, updates }));
        }

        Ok(Arc::new(ObjectDescriptor {
            name: self.name,
            uid: self.uid,
            properties: Arc::new(properties),
            events,
            methods,
            event_uids,
            method_uids,
        }))
    }
}
