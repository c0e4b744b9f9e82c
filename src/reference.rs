//! Identity keyed tables shared by the encoder.

use std::collections::HashMap;

use crate::value::{ObjectId, ObjectRef};

/// Maps object identity to the reference id it was given on first sight.
///
/// Ids are handed out in increasing order starting at zero and never change.
/// The table keeps every registered object alive so identities cannot be
/// reused while it exists.
#[derive(Debug, Default)]
pub struct ObjectPool {
    ids: HashMap<ObjectId, u32>,
    objects: Vec<ObjectRef>,
}

impl ObjectPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, object: &ObjectRef) -> bool {
        self.ids.contains_key(&object.id())
    }

    pub fn get(&self, object: &ObjectRef) -> Option<u32> {
        self.ids.get(&object.id()).copied()
    }

    /// Registers `object` and returns its new id.
    ///
    /// # Panics
    ///
    /// Panics if `object` already has an id.
    pub fn assign(&mut self, object: &ObjectRef) -> u32 {
        let id = self.objects.len() as u32;
        let previous = self.ids.insert(object.id(), id);
        assert!(previous.is_none(), "object {object:?} registered twice");
        self.objects.push(object.clone());
        id
    }
}

/// Positions of buffers in the caller's transfer list. Built once and only
/// queried during traversal.
#[derive(Debug, Default)]
pub struct TransferTable {
    indices: HashMap<ObjectId, u32>,
    buffers: Vec<ObjectRef>,
}

impl TransferTable {
    /// Repeated buffers keep the index of their first occurrence.
    pub fn new(transfer_list: &[ObjectRef]) -> Self {
        let mut table = Self::default();
        for (i, buffer) in transfer_list.iter().enumerate() {
            table.indices.entry(buffer.id()).or_insert(i as u32);
            table.buffers.push(buffer.clone());
        }
        table
    }

    pub fn get(&self, buffer: &ObjectRef) -> Option<u32> {
        self.indices.get(&buffer.id()).copied()
    }

    pub fn contains(&self, buffer: &ObjectRef) -> bool {
        self.indices.contains_key(&buffer.id())
    }

    /// The transfer list as given, duplicates included.
    pub fn buffers(&self) -> &[ObjectRef] {
        &self.buffers
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
