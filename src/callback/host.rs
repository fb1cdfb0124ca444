//! Host-provided callback registration
//!
//! Some platforms hand out stable callback addresses themselves. The host
//! owns the slots and the dispatch path; this side only validates
//! signatures and keeps the dedup cache.

use super::backend::CallbackBackend;
use super::compiler::Signature;
use super::error::{CallbackError, Lookup};
use super::func::{identity_of, Callback, SharedCallback};
use super::invoker::Binding;
use crate::logging::{
    log_callback_deduplicated, log_callback_rejected, log_capacity_exhausted,
    log_host_callback_registered, log_host_callback_released,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Default capacity of host registration tables
pub const HOST_MAX_CALLBACKS: usize = 1024;

/// The host side of registration
///
/// A host receives validated bindings and answers with the native address it
/// will route to them. When native code calls that address the host builds
/// an argument block and calls [`Binding::invoke`].
pub trait HostRegistrar: Send + Sync {
    fn register(&self, binding: Arc<Binding>) -> Result<usize, CallbackError>;

    /// Must fail with `CallbackNotFound` for an address it never issued
    fn unregister(&self, address: usize) -> Result<(), CallbackError>;

    fn capacity(&self) -> usize {
        HOST_MAX_CALLBACKS
    }
}

/// Backend delegating slot bookkeeping to a [`HostRegistrar`]
pub struct HostBackend<H> {
    host: H,
    /// identity → issued address
    dedup: RwLock<HashMap<usize, usize>>,
    live: AtomicUsize,
}

impl<H: HostRegistrar> HostBackend<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            dedup: RwLock::new(HashMap::new()),
            live: AtomicUsize::new(0),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    fn bind(&self, callback: SharedCallback) -> Result<usize, CallbackError> {
        let signature = Signature::of(&callback).map_err(|err| {
            log_callback_rejected(&err);
            err
        })?;

        self.reserve()?;
        let address = self
            .host
            .register(Arc::new(Binding::new(callback, signature)))
            .map_err(|err| {
                self.live.fetch_sub(1, Ordering::AcqRel);
                err
            })?;
        log_host_callback_registered(address);
        Ok(address)
    }

    /// Claim one unit of capacity before the host sees the binding
    fn reserve(&self) -> Result<(), CallbackError> {
        let capacity = self.host.capacity();
        self.live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                (live < capacity).then_some(live + 1)
            })
            .map(drop)
            .map_err(|_| {
                log_capacity_exhausted(capacity);
                CallbackError::CapacityExceeded { capacity }
            })
    }

    fn release(&self, address: usize) -> Result<(), CallbackError> {
        self.host.unregister(address)?;
        self.live.fetch_sub(1, Ordering::AcqRel);
        log_host_callback_released(address);
        Ok(())
    }
}

impl<H: HostRegistrar> CallbackBackend for HostBackend<H> {
    fn register(&self, callback: Callback) -> Result<usize, CallbackError> {
        self.bind(Arc::new(callback))
    }

    fn register_shared(&self, callback: &SharedCallback) -> Result<usize, CallbackError> {
        let identity = identity_of(callback);
        if let Some(&address) = self.dedup.read().get(&identity) {
            log_callback_deduplicated(address);
            return Ok(address);
        }

        let mut dedup = self.dedup.write();
        if let Some(&address) = dedup.get(&identity) {
            log_callback_deduplicated(address);
            return Ok(address);
        }
        let address = self.bind(Arc::clone(callback))?;
        dedup.insert(identity, address);
        Ok(address)
    }

    fn unregister(&self, address: usize) -> Result<(), CallbackError> {
        self.release(address)?;
        self.dedup.write().retain(|_, issued| *issued != address);
        Ok(())
    }

    fn unregister_shared(&self, callback: &SharedCallback) -> Result<(), CallbackError> {
        let identity = identity_of(callback);
        let mut dedup = self.dedup.write();
        let address = *dedup
            .get(&identity)
            .ok_or(CallbackError::CallbackNotFound(Lookup::Identity(identity)))?;
        self.release(address)?;
        dedup.remove(&identity);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.host.capacity()
    }

    fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

impl<H> core::fmt::Debug for HostBackend<H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HostBackend")
            .field("live", &self.live.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
