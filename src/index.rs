//! Open-addressing hash index mapping 64-bit keys to 64-bit values
//!
//! Backs every lookup and uniqueness index in the record store: primary-key
//! offsets, email-hash lookups, and the has-voted presence set. Linear
//! probing over a power-of-two slot array with tombstone deletion; a full
//! rehash-and-grow drops tombstones whenever the combined occupied and
//! tombstone load would exceed 0.7.

use crate::{Error, Result};

/// Minimum slot-array capacity
const MIN_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Empty,
    Occupied,
    Tombstone,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    key: u64,
    value: u64,
    state: SlotState,
}

const EMPTY_SLOT: Slot = Slot {
    key: 0,
    value: 0,
    state: SlotState::Empty,
};

/// Fixed-growth-factor open-addressing map from u64 keys to u64 values
///
/// Capacity is always a power of two so probe positions reduce to a mask.
/// Deleted slots become tombstones rather than empties to preserve probe
/// chains for keys inserted past them; tombstones are reclaimed on insert
/// (first reusable slot) and dropped entirely on rehash.
#[derive(Debug, Clone)]
pub struct IndexedMap {
    slots: Vec<Slot>,
    occupied: usize,
    tombstones: usize,
}

impl IndexedMap {
    /// Create an empty map with the minimum capacity
    pub fn new() -> Self {
        Self {
            slots: vec![EMPTY_SLOT; MIN_CAPACITY],
            occupied: 0,
            tombstones: 0,
        }
    }

    /// Create an empty map sized for at least `capacity` slots
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let cap = capacity.max(MIN_CAPACITY).next_power_of_two();
        Ok(Self {
            slots: alloc_slots(cap)?,
            occupied: 0,
            tombstones: 0,
        })
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.occupied
    }

    /// Whether the map holds no live entries
    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    /// Insert or update a key
    ///
    /// Updates the value in place if the key is present. Triggers a
    /// rehash-and-grow first if the insertion would push the load factor
    /// (occupied plus tombstones) past 0.7.
    pub fn put(&mut self, key: u64, value: u64) -> Result<()> {
        if (self.occupied + self.tombstones + 1) * 10 >= self.slots.len() * 7 {
            self.rehash(self.slots.len() * 2)?;
        }

        let mask = self.slots.len() - 1;
        let mut idx = mix64(key) as usize & mask;
        let mut first_tombstone: Option<usize> = None;

        loop {
            match self.slots[idx].state {
                SlotState::Empty => {
                    let dest = first_tombstone.unwrap_or(idx);
                    if self.slots[dest].state == SlotState::Tombstone {
                        self.tombstones -= 1;
                    }
                    self.slots[dest] = Slot {
                        key,
                        value,
                        state: SlotState::Occupied,
                    };
                    self.occupied += 1;
                    return Ok(());
                }
                SlotState::Tombstone => {
                    if first_tombstone.is_none() {
                        first_tombstone = Some(idx);
                    }
                }
                SlotState::Occupied => {
                    if self.slots[idx].key == key {
                        self.slots[idx].value = value;
                        return Ok(());
                    }
                }
            }
            idx = (idx + 1) & mask;
        }
    }

    /// Look up a key; `None` on miss
    pub fn get(&self, key: u64) -> Option<u64> {
        let mask = self.slots.len() - 1;
        let mut idx = mix64(key) as usize & mask;

        loop {
            let slot = &self.slots[idx];
            match slot.state {
                SlotState::Empty => return None,
                SlotState::Occupied if slot.key == key => return Some(slot.value),
                // Tombstones and other keys do not terminate the probe
                _ => {}
            }
            idx = (idx + 1) & mask;
        }
    }

    /// Check whether a key is present
    pub fn contains(&self, key: u64) -> bool {
        self.get(key).is_some()
    }

    /// Delete a key, leaving a tombstone
    ///
    /// Fails with `NotFound` if the key is absent.
    pub fn delete(&mut self, key: u64) -> Result<()> {
        let mask = self.slots.len() - 1;
        let mut idx = mix64(key) as usize & mask;

        loop {
            let slot = &mut self.slots[idx];
            match slot.state {
                SlotState::Empty => return Err(Error::not_found(format!("key {key}"))),
                SlotState::Occupied if slot.key == key => {
                    slot.state = SlotState::Tombstone;
                    self.occupied -= 1;
                    self.tombstones += 1;
                    return Ok(());
                }
                _ => {}
            }
            idx = (idx + 1) & mask;
        }
    }

    /// Iterate over live (key, value) pairs in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.slots
            .iter()
            .filter(|s| s.state == SlotState::Occupied)
            .map(|s| (s.key, s.value))
    }

    /// Re-insert every occupied slot into a fresh table, dropping tombstones
    fn rehash(&mut self, new_capacity: usize) -> Result<()> {
        let new_slots = alloc_slots(new_capacity)?;
        let old_slots = std::mem::replace(&mut self.slots, new_slots);
        let mask = self.slots.len() - 1;

        self.tombstones = 0;
        for slot in &old_slots {
            if slot.state != SlotState::Occupied {
                continue;
            }
            // Fresh table has no tombstones, so probing stops at an empty
            let mut idx = mix64(slot.key) as usize & mask;
            while self.slots[idx].state == SlotState::Occupied {
                idx = (idx + 1) & mask;
            }
            self.slots[idx] = *slot;
        }
        Ok(())
    }
}

impl Default for IndexedMap {
    fn default() -> Self {
        Self::new()
    }
}

fn alloc_slots(capacity: usize) -> Result<Vec<Slot>> {
    let mut slots = Vec::new();
    slots
        .try_reserve_exact(capacity)
        .map_err(|_| Error::allocation("indexed map slot array"))?;
    slots.resize(capacity, EMPTY_SLOT);
    Ok(slots)
}

/// 64-bit avalanche mix (murmur-style fmix64)
fn mix64(mut x: u64) -> u64 {
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51afd7ed558ccd);
    x ^= x >> 33;
    x = x.wrapping_mul(0xc4ceb9fe1a85ec53);
    x ^= x >> 33;
    x
}
