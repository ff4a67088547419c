use std::{collections::HashMap, sync::Arc};

use crate::{
    bus::{error::BusError, object::Object},
    connection::error::DecodeError,
    descriptor::{bus::BusDescriptor, object::ObjectDescriptor},
};

/// Handle table of the objects currently registered on a bus
#[derive(Debug)]
pub struct Bus {
    descriptor: Arc<BusDescriptor>,
    objects: HashMap<u16, Arc<Object>>,
}

impl Bus {
    pub fn new(descriptor: Arc<BusDescriptor>) -> Self {
        Self {
            descriptor,
            objects: HashMap::new(),
        }
    }

    pub fn descriptor(&self) -> &Arc<BusDescriptor> {
        &self.descriptor
    }

    pub fn register(&mut self, object: Arc<Object>) -> Result<(), BusError> {
        if object.handle() == 0 {
            return Err(BusError::InvalidHandle { uid: object.uid() });
        }
        if self.objects.contains_key(&object.handle()) {
            return Err(BusError::HandleInUse {
                uid: object.uid(),
                handle: object.handle(),
            });
        }
        self.objects.insert(object.handle(), object);
        Ok(())
    }

    /// Removes exactly this object from the table
    pub fn unregister(&mut self, object: &Arc<Object>) -> Result<Arc<Object>, BusError> {
        match self.objects.get(&object.handle()) {
            Some(registered) if Arc::ptr_eq(registered, object) => {}
            _ => {
                return Err(BusError::NotRegistered {
                    uid: object.uid(),
                    handle: object.handle(),
                })
            }
        }
        self.objects
            .remove(&object.handle())
            .ok_or(BusError::NotRegistered {
                uid: object.uid(),
                handle: object.handle(),
            })
    }

    pub fn find(&self, handle: u16) -> Option<&Arc<Object>> {
        self.objects.get(&handle)
    }

    /// Finds the object registered with `handle`, checking it is of class `uid`
    pub fn resolve(&self, uid: u16, handle: u16) -> Result<&Arc<Object>, DecodeError> {
        let object = self
            .objects
            .get(&handle)
            .ok_or(DecodeError::ObjectNotRegistered { uid, handle })?;
        if object.uid() != uid {
            return Err(DecodeError::ObjectUidMismatch {
                uid,
                handle,
                registered_uid: object.uid(),
            });
        }
        Ok(object)
    }

    /// All registered objects, ordered by handle
    pub fn objects(&self) -> Vec<Arc<Object>> {
        let mut objects: Vec<_> = self.objects.values().cloned().collect();
        objects.sort_by_key(|object| object.handle());
        objects
    }

    /// Registered objects of one class, ordered by handle
    pub fn objects_of(&self, descriptor: &ObjectDescriptor) -> Vec<Arc<Object>> {
        let mut objects: Vec<_> = self
            .objects
            .values()
            .filter(|object| object.uid() == descriptor.uid())
            .cloned()
            .collect();
        objects.sort_by_key(|object| object.handle());
        objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn clear(&mut self) -> Vec<Arc<Object>> {
        let objects = self.objects();
        self.objects.clear();
        objects
    }
}
