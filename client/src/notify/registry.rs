use std::{collections::HashMap, hash::Hash, sync::Arc};

use log::debug;
use parking_lot::Mutex;

use obus_shared::{BusEventDescriptor, Object, ObjectDescriptor};

use super::listener::{ListenerKey, ListenerList};

/// Observes objects entering and leaving a registry. The bus event is `None`
/// for objects added or removed outside of a bus event.
pub trait RegistryObserver: Send + Sync {
    fn object_added(&self, object: &Arc<Object>, bus_event: Option<&Arc<BusEventDescriptor>>);
    fn object_removed(&self, object: &Arc<Object>, bus_event: Option<&Arc<BusEventDescriptor>>);
}

/// Type-erased registry, as attached to a client
pub(crate) trait ClassRegistry: Send + Sync {
    fn descriptor(&self) -> &Arc<ObjectDescriptor>;
    fn add(&self, object: &Arc<Object>, bus_event: Option<&Arc<BusEventDescriptor>>);
    fn remove(&self, object: &Arc<Object>, bus_event: Option<&Arc<BusEventDescriptor>>);
}

type KeyExtractor<K> = Box<dyn Fn(&Object) -> K + Send + Sync>;

enum Store<K> {
    Singleton(Option<Arc<Object>>),
    Keyed(HashMap<K, Arc<Object>>),
}

/// Mirrored objects of one class, indexed by an application key.
///
/// A registry built without a key extractor holds at most one object. An
/// object whose key is already taken is not added.
pub struct ObjectRegistry<K> {
    descriptor: Arc<ObjectDescriptor>,
    extractor: Option<KeyExtractor<K>>,
    store: Mutex<Store<K>>,
    observers: ListenerList<dyn RegistryObserver>,
}

impl ObjectRegistry<()> {
    pub fn singleton(descriptor: Arc<ObjectDescriptor>) -> Self {
        Self {
            descriptor,
            extractor: None,
            store: Mutex::new(Store::Singleton(None)),
            observers: ListenerList::default(),
        }
    }
}

impl<K: Eq + Hash + Send + 'static> ObjectRegistry<K> {
    pub fn keyed<F>(descriptor: Arc<ObjectDescriptor>, extractor: F) -> Self
    where
        F: Fn(&Object) -> K + Send + Sync + 'static,
    {
        Self {
            descriptor,
            extractor: Some(Box::new(extractor)),
            store: Mutex::new(Store::Keyed(HashMap::new())),
            observers: ListenerList::default(),
        }
    }

    pub fn descriptor(&self) -> &Arc<ObjectDescriptor> {
        &self.descriptor
    }

    pub fn add_observer(&self, observer: Arc<dyn RegistryObserver>) -> ListenerKey {
        self.observers.add(observer)
    }

    pub fn remove_observer(&self, key: ListenerKey) -> bool {
        self.observers.remove(key)
    }

    pub fn get(&self, key: &K) -> Option<Arc<Object>> {
        match &*self.store.lock() {
            Store::Keyed(objects) => objects.get(key).cloned(),
            Store::Singleton(_) => None,
        }
    }

    /// The object of a registry without key extractor
    pub fn get_singleton(&self) -> Option<Arc<Object>> {
        match &*self.store.lock() {
            Store::Singleton(object) => object.clone(),
            Store::Keyed(_) => None,
        }
    }

    /// Every object, ordered by handle
    pub fn all(&self) -> Vec<Arc<Object>> {
        self.all_matching(|_| true)
    }

    pub fn all_matching(&self, filter: impl Fn(&Object) -> bool) -> Vec<Arc<Object>> {
        let mut objects: Vec<Arc<Object>> = match &*self.store.lock() {
            Store::Singleton(object) => object.iter().cloned().collect(),
            Store::Keyed(objects) => objects.values().cloned().collect(),
        };
        objects.retain(|object| filter(object));
        objects.sort_by_key(|object| object.handle());
        objects
    }

    pub fn get_by_handle(&self, handle: u16) -> Option<Arc<Object>> {
        self.all().into_iter().find(|object| object.handle() == handle)
    }

    pub fn len(&self) -> usize {
        match &*self.store.lock() {
            Store::Singleton(object) => usize::from(object.is_some()),
            Store::Keyed(objects) => objects.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, object: &Arc<Object>) -> bool {
        let mut store = self.store.lock();
        match (&mut *store, &self.extractor) {
            (Store::Singleton(slot), _) => {
                if slot.is_some() {
                    return false;
                }
                *slot = Some(object.clone());
                true
            }
            (Store::Keyed(objects), Some(extractor)) => {
                let key = extractor(object);
                if objects.contains_key(&key) {
                    return false;
                }
                objects.insert(key, object.clone());
                true
            }
            (Store::Keyed(_), None) => false,
        }
    }

    fn extract(&self, object: &Arc<Object>) -> bool {
        let mut store = self.store.lock();
        match (&mut *store, &self.extractor) {
            (Store::Singleton(slot), _) => match slot {
                Some(stored) if Arc::ptr_eq(stored, object) => {
                    *slot = None;
                    true
                }
                _ => false,
            },
            (Store::Keyed(objects), Some(extractor)) => {
                let key = extractor(object);
                match objects.get(&key) {
                    Some(stored) if Arc::ptr_eq(stored, object) => {
                        objects.remove(&key);
                        true
                    }
                    _ => false,
                }
            }
            (Store::Keyed(_), None) => false,
        }
    }
}

impl<K: Eq + Hash + Send + 'static> ClassRegistry for ObjectRegistry<K> {
    fn descriptor(&self) -> &Arc<ObjectDescriptor> {
        &self.descriptor
    }

    fn add(&self, object: &Arc<Object>, bus_event: Option<&Arc<BusEventDescriptor>>) {
        if !self.insert(object) {
            debug!("Registry '{}': object {} not added, key taken", self.descriptor.name(), object);
            return;
        }
        for observer in self.observers.snapshot() {
            observer.object_added(object, bus_event);
        }
    }

    fn remove(&self, object: &Arc<Object>, bus_event: Option<&Arc<BusEventDescriptor>>) {
        if !self.extract(object) {
            return;
        }
        for observer in self.observers.snapshot() {
            observer.object_removed(object, bus_event);
        }
    }
}
