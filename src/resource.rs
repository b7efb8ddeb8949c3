//! Opaque resource handles.
//!
//! On the wire a resource is a `list<u8>` whose meaning belongs to the side
//! that issued it. [`SharedResourceTable`] issues 16-byte UUID handles for
//! local values and resolves them when they come back in a later invocation.
//!
//! ```
//! use wrpc_wire::resource::SharedResourceTable;
//!
//! let table = SharedResourceTable::new();
//! let handle = table.insert("connection #1");
//! assert_eq!(handle.len(), 16);
//! assert_eq!(table.get(&handle).unwrap(), Some("connection #1"));
//! assert_eq!(table.remove(&handle).unwrap(), Some("connection #1"));
//! assert_eq!(table.get(&handle).unwrap(), None);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use uuid::Uuid;

use crate::error::{Result, WireError};
use crate::invocation::lock;

/// Values shared with peers through opaque handles. Cheap to clone.
pub struct SharedResourceTable<T> {
    entries: Arc<Mutex<HashMap<Uuid, T>>>,
}

impl<T> Clone for SharedResourceTable<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<T> Default for SharedResourceTable<T> {
    fn default() -> Self {
        Self {
            entries: Arc::default(),
        }
    }
}

fn parse_handle(handle: &[u8]) -> Result<Uuid> {
    let bytes: [u8; 16] = handle.try_into().map_err(|_| {
        WireError::Malformed(format!(
            "invalid resource handle length {}, expected 16",
            handle.len()
        ))
    })?;
    Ok(Uuid::from_bytes_le(bytes))
}

impl<T> SharedResourceTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` and return the handle to send in its place.
    pub fn insert(&self, value: T) -> Bytes {
        let mut entries = lock(&self.entries);
        let mut id = Uuid::now_v7();
        while entries.contains_key(&id) {
            tracing::error!(?id, "duplicate resource ID generated");
            id = Uuid::new_v4();
        }
        tracing::trace!(?id, "store shared resource");
        entries.insert(id, value);
        Bytes::copy_from_slice(&id.to_bytes_le())
    }

    /// Take the value for `handle` out of the table (the resource is dropped
    /// or ownership moves back).
    pub fn remove(&self, handle: &[u8]) -> Result<Option<T>> {
        let id = parse_handle(handle)?;
        Ok(lock(&self.entries).remove(&id))
    }

    pub fn contains(&self, handle: &[u8]) -> Result<bool> {
        let id = parse_handle(handle)?;
        Ok(lock(&self.entries).contains_key(&id))
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }
}

impl<T: Clone> SharedResourceTable<T> {
    /// Look up the value for a borrowed handle.
    pub fn get(&self, handle: &[u8]) -> Result<Option<T>> {
        let id = parse_handle(handle)?;
        Ok(lock(&self.entries).get(&id).cloned())
    }
}
