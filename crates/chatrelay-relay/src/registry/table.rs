//! Fixed-capacity table of live peer connections.
//!
//! Slots are reused lowest-index first. The table owns every connection it
//! holds, so releasing a slot or refusing a connection closes it.

use std::fmt;

/// Position of a connection in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotIndex(usize);

impl SlotIndex {
    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Every slot is occupied. The refused connection has already been closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("connection table full ({capacity} slots)")]
pub struct TableFull {
    pub capacity: usize,
}

/// Bounded registry of peer connections.
pub struct ConnectionTable<T> {
    slots: Box<[Option<T>]>,
}

impl<T> ConnectionTable<T> {
    /// Create an empty table. The capacity never changes afterwards.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Store a connection in the first free slot.
    ///
    /// When no slot is free the connection is dropped (and so closed) before
    /// returning [`TableFull`].
    pub fn acquire(&mut self, conn: T) -> Result<SlotIndex, TableFull> {
        let capacity = self.capacity();
        let Some((index, slot)) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.is_none())
        else {
            drop(conn);
            return Err(TableFull { capacity });
        };
        *slot = Some(conn);
        Ok(SlotIndex(index))
    }

    /// Clear a slot, closing its connection.
    ///
    /// Returns `false` if the slot was already free or out of range.
    pub fn release(&mut self, slot: SlotIndex) -> bool {
        self.slots
            .get_mut(slot.0)
            .and_then(Option::take)
            .is_some()
    }

    pub fn get(&self, slot: SlotIndex) -> Option<&T> {
        self.slots.get(slot.0).and_then(Option::as_ref)
    }

    /// Occupied slots in table order.
    pub fn iter_active(&self) -> impl Iterator<Item = (SlotIndex, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|conn| (SlotIndex(index), conn)))
    }

    /// Snapshot of the occupied slot indices, for servicing while mutating.
    pub fn active_slots(&self) -> Vec<SlotIndex> {
        self.iter_active().map(|(slot, _)| slot).collect()
    }
}
