//! Callback backends
//!
//! Both backends honour the same four operations; they differ in who owns
//! slot bookkeeping and in capacity.

use super::compiler::{compile, EntryTable};
use super::error::{CallbackError, Lookup};
use super::func::{identity_of, Callback, SharedCallback};
use super::invoker::ArgBlock;
use super::registry::Registry;
use super::trampoline::{native_table, MAX_CALLBACKS};
use crate::config;
use crate::logging::log_callback_invoked;
use once_cell::sync::Lazy;
use std::sync::Arc;

/// Registration contract shared by every backend
pub trait CallbackBackend: Send + Sync {
    /// Register a callback, always consuming a fresh slot
    fn register(&self, callback: Callback) -> Result<usize, CallbackError>;

    /// Register by identity; the same `Arc` always yields the same address
    fn register_shared(&self, callback: &SharedCallback) -> Result<usize, CallbackError>;

    /// Release the registration behind an issued entry address
    fn unregister(&self, address: usize) -> Result<(), CallbackError>;

    /// Release the registration made for `callback`'s identity
    fn unregister_shared(&self, callback: &SharedCallback) -> Result<(), CallbackError>;

    fn capacity(&self) -> usize;

    /// Number of live registrations
    fn live(&self) -> usize;
}

/// Backend over the assembled trampoline table
#[derive(Debug)]
pub struct TrampolineBackend {
    registry: Registry,
    table: EntryTable,
}

static NATIVE: Lazy<TrampolineBackend> = Lazy::new(|| {
    let capacity = config::settings().callbacks.capacity.min(MAX_CALLBACKS);
    TrampolineBackend::new(native_table(), capacity)
});

impl TrampolineBackend {
    /// Detached backend over any table geometry
    ///
    /// Addresses it hands out are only callable when `table` describes real
    /// entries; otherwise use [`dispatch_address`](Self::dispatch_address).
    pub fn new(table: EntryTable, capacity: usize) -> Self {
        Self {
            registry: Registry::with_capacity(capacity),
            table,
        }
    }

    /// The process instance bound to the assembled table
    pub fn native() -> &'static Self {
        &NATIVE
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn table(&self) -> &EntryTable {
        &self.table
    }

    /// Run the callback bound to `slot` against `block`
    ///
    /// The registry lock is released before the callback runs.
    pub fn dispatch(&self, slot: usize, block: &ArgBlock<'_>) -> Result<Option<usize>, CallbackError> {
        let binding = self
            .registry
            .binding(slot)
            .ok_or(CallbackError::SlotNotBound { slot })?;
        log_callback_invoked(slot);
        Ok(binding.invoke(block))
    }

    /// Dispatch through an issued entry address, as a trampoline would
    pub fn dispatch_address(
        &self,
        address: usize,
        block: &ArgBlock<'_>,
    ) -> Result<Option<usize>, CallbackError> {
        let slot = self
            .registry
            .lookup_by_address(address)
            .ok_or(CallbackError::CallbackNotFound(Lookup::Address(address)))?;
        self.dispatch(slot, block)
    }
}

impl CallbackBackend for TrampolineBackend {
    fn register(&self, callback: Callback) -> Result<usize, CallbackError> {
        compile(&self.registry, &self.table, Arc::new(callback), None)
    }

    fn register_shared(&self, callback: &SharedCallback) -> Result<usize, CallbackError> {
        compile(
            &self.registry,
            &self.table,
            Arc::clone(callback),
            Some(identity_of(callback)),
        )
    }

    fn unregister(&self, address: usize) -> Result<(), CallbackError> {
        self.registry.release_address(address).map(drop)
    }

    fn unregister_shared(&self, callback: &SharedCallback) -> Result<(), CallbackError> {
        self.registry.release_identity(identity_of(callback)).map(drop)
    }

    fn capacity(&self) -> usize {
        self.registry.capacity()
    }

    fn live(&self) -> usize {
        self.registry.live()
    }
}
