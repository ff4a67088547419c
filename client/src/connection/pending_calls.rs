use std::{collections::HashMap, sync::Arc};

use obus_shared::{MethodCall, Object};

/// Calls sent to the server and not acknowledged yet, by call handle
pub struct PendingCalls {
    last_handle: u16,
    calls: HashMap<u16, MethodCall>,
}

impl Default for PendingCalls {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingCalls {
    pub fn new() -> Self {
        Self {
            last_handle: 1,
            calls: HashMap::new(),
        }
    }

    /// Next call handle, in 1..=65535. Handle 0 is never issued.
    pub fn next_handle(&mut self) -> u16 {
        self.last_handle = (self.last_handle % u16::MAX) + 1;
        self.last_handle
    }

    /// Assigns the next free handle to `call` and stores it. Handles still
    /// pending after a wrap are skipped. When all of them are pending, the
    /// call under the next handle is displaced and returned to the caller.
    pub fn insert(&mut self, mut call: MethodCall) -> (u16, Option<MethodCall>) {
        let mut handle = self.next_handle();
        for _ in 1..u16::MAX {
            if !self.calls.contains_key(&handle) {
                break;
            }
            handle = self.next_handle();
        }
        call.set_handle(handle);
        let displaced = self.calls.insert(handle, call);
        (handle, displaced)
    }

    pub fn get(&self, handle: u16) -> Option<&MethodCall> {
        self.calls.get(&handle)
    }

    pub fn take(&mut self, handle: u16) -> Option<MethodCall> {
        self.calls.remove(&handle)
    }

    /// Removes every call made on `object`, in handle order
    pub fn take_for(&mut self, object: &Arc<Object>) -> Vec<MethodCall> {
        let mut handles: Vec<u16> = self
            .calls
            .iter()
            .filter(|(_, call)| call.is_for(object))
            .map(|(handle, _)| *handle)
            .collect();
        handles.sort_unstable();
        handles
            .into_iter()
            .filter_map(|handle| self.calls.remove(&handle))
            .collect()
    }

    pub fn take_all(&mut self) -> Vec<MethodCall> {
        let mut calls: Vec<MethodCall> = self.calls.drain().map(|(_, call)| call).collect();
        calls.sort_by_key(|call| call.handle());
        calls
    }

    pub fn contains(&self, handle: u16) -> bool {
        self.calls.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}
