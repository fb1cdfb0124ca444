//! Callback registry - bounded trampoline slot table
//!
//! One reader/writer lock guards the slot table, the free list, the index
//! cache (entry address → slot) and the dedup cache (identity → entry
//! address). Allocation and release take the write side; dispatch takes the
//! read side just long enough to clone the bound `Arc`.

use super::error::{CallbackError, Lookup};
use super::invoker::Binding;
use crate::logging::{log_callback_released, log_capacity_exhausted, log_invariant_violation};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

struct Slot {
    binding: Arc<Binding>,
    address: usize,
    identity: Option<usize>,
}

struct State {
    slots: Vec<Option<Slot>>,
    /// Holes in `slots`; pop order is not part of the contract
    free: Vec<usize>,
    by_address: HashMap<usize, usize>,
    by_identity: HashMap<usize, usize>,
}

impl State {
    /// Unbind `slot` and purge every cache entry pointing at it
    fn unbind(&mut self, slot: usize) -> Result<Slot, CallbackError> {
        let entry = self
            .slots
            .get_mut(slot)
            .and_then(Option::take)
            .ok_or(CallbackError::SlotNotBound { slot })?;
        self.by_address.remove(&entry.address);
        if let Some(identity) = entry.identity {
            self.by_identity.remove(&identity);
        }
        self.free.push(slot);
        Ok(entry)
    }
}

/// Result of [`Registry::allocate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub slot: usize,
    pub address: usize,
    /// The identity was already registered; no slot was consumed
    pub reused: bool,
}

/// Bounded table of callback slots
pub struct Registry {
    capacity: usize,
    state: RwLock<State>,
}

impl Registry {
    /// Create a registry with `capacity` free slots
    ///
    /// # Panics
    /// If `capacity` is zero; a table that can never hold a callback is a
    /// configuration error.
    pub fn with_capacity(capacity: usize) -> Self {
        if capacity == 0 {
            log_invariant_violation("callback capacity must be at least 1", "0");
            panic!("nativecall: callback capacity must be at least 1");
        }

        Self {
            capacity,
            state: RwLock::new(State {
                slots: (0..capacity).map(|_| None).collect(),
                free: (0..capacity).rev().collect(),
                by_address: HashMap::with_capacity(capacity),
                by_identity: HashMap::new(),
            }),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of bound slots
    pub fn live(&self) -> usize {
        self.capacity - self.state.read().free.len()
    }

    /// Bind `binding` to a free slot
    ///
    /// `entry` maps the chosen slot to its native entry address. With an
    /// `identity`, an existing registration for it wins and no slot is
    /// consumed.
    pub fn allocate(
        &self,
        binding: Binding,
        identity: Option<usize>,
        entry: impl FnOnce(usize) -> usize,
    ) -> Result<Allocation, CallbackError> {
        let mut state = self.state.write();

        if let Some(id) = identity {
            if let Some(&address) = state.by_identity.get(&id) {
                if let Some(&slot) = state.by_address.get(&address) {
                    return Ok(Allocation {
                        slot,
                        address,
                        reused: true,
                    });
                }
            }
        }

        let Some(slot) = state.free.pop() else {
            log_capacity_exhausted(self.capacity);
            return Err(CallbackError::CapacityExceeded {
                capacity: self.capacity,
            });
        };

        let address = entry(slot);
        state.slots[slot] = Some(Slot {
            binding: Arc::new(binding),
            address,
            identity,
        });
        state.by_address.insert(address, slot);
        if let Some(id) = identity {
            state.by_identity.insert(id, address);
        }

        Ok(Allocation {
            slot,
            address,
            reused: false,
        })
    }

    /// Unbind a slot directly
    ///
    /// Fails for a free slot, so a stale index can never release whatever
    /// was bound to it later.
    pub fn release(&self, slot: usize) -> Result<(), CallbackError> {
        let removed = self.state.write().unbind(slot)?;
        log_callback_released(slot, removed.address);
        // Captured state is dropped outside the lock.
        drop(removed);
        Ok(())
    }

    /// Unbind the slot behind a previously issued entry address
    pub fn release_address(&self, address: usize) -> Result<usize, CallbackError> {
        let (slot, removed) = {
            let mut state = self.state.write();
            let slot = *state
                .by_address
                .get(&address)
                .ok_or(CallbackError::CallbackNotFound(Lookup::Address(address)))?;
            (slot, state.unbind(slot)?)
        };
        log_callback_released(slot, address);
        drop(removed);
        Ok(slot)
    }

    /// Unbind the slot registered for a function identity
    pub fn release_identity(&self, identity: usize) -> Result<usize, CallbackError> {
        let (slot, removed) = {
            let mut state = self.state.write();
            let slot = state
                .by_identity
                .get(&identity)
                .and_then(|address| state.by_address.get(address))
                .copied()
                .ok_or(CallbackError::CallbackNotFound(Lookup::Identity(identity)))?;
            (slot, state.unbind(slot)?)
        };
        log_callback_released(slot, removed.address);
        drop(removed);
        Ok(slot)
    }

    pub fn lookup_by_address(&self, address: usize) -> Option<usize> {
        self.state.read().by_address.get(&address).copied()
    }

    /// Entry address previously issued for `identity`
    pub fn lookup_by_identity(&self, identity: usize) -> Option<usize> {
        self.state.read().by_identity.get(&identity).copied()
    }

    /// Clone out the binding of `slot` for dispatch
    #[inline]
    pub fn binding(&self, slot: usize) -> Option<Arc<Binding>> {
        self.state
            .read()
            .slots
            .get(slot)
            .and_then(|entry| entry.as_ref().map(|s| Arc::clone(&s.binding)))
    }
}

impl core::fmt::Debug for Registry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registry")
            .field("capacity", &self.capacity)
            .field("live", &self.live())
            .finish()
    }
}
