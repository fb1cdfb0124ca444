//! Callbacks - Native entry points for managed functions
//!
//! Design: a bounded slot table behind fixed trampolines
//!
//! Architecture:
//! - `func.rs` - Managed callback values and typed closure conversion
//! - `error.rs` - Registration errors
//! - `registry.rs` - Slot table, index cache and dedup cache under one lock
//! - `compiler.rs` - Signature validation and slot binding
//! - `invoker.rs` - Argument block decoding and result encoding
//! - `trampoline.rs` - Assembled entry table and its dispatcher
//! - `backend.rs` - Backend contract and the trampoline backend
//! - `host.rs` - Backend delegating to host-provided registration

mod backend;
mod compiler;
mod error;
mod func;
mod host;
mod invoker;
mod registry;
mod trampoline;

pub use backend::{CallbackBackend, TrampolineBackend};
pub use compiler::{compile, EntryTable, Signature};
pub use error::{CallbackError, Lookup};
pub use func::{identity_of, Callback, CallbackArg, CallbackRet, IntoCallback, SharedCallback};
pub use host::{HostBackend, HostRegistrar, HOST_MAX_CALLBACKS};
pub use invoker::{ArgBlock, Binding};
pub use registry::{Allocation, Registry};
pub use trampoline::{native_table, MAX_CALLBACKS};

use crate::logging::log_backend_installed;
use once_cell::sync::OnceCell;

static BACKEND: OnceCell<&'static dyn CallbackBackend> = OnceCell::new();

/// Select the process-wide backend
///
/// Only possible before the first registration; afterwards the choice is
/// fixed and this fails with `BackendAlreadyInstalled`.
pub fn install_backend<B: CallbackBackend + 'static>(backend: B) -> Result<(), CallbackError> {
    if BACKEND.get().is_some() {
        return Err(CallbackError::BackendAlreadyInstalled);
    }
    let backend: &'static dyn CallbackBackend = Box::leak(Box::new(backend));
    BACKEND
        .set(backend)
        .map_err(|_| CallbackError::BackendAlreadyInstalled)?;
    log_backend_installed(backend.capacity());
    Ok(())
}

/// The process-wide backend; the trampoline backend unless one was installed
pub fn backend() -> &'static dyn CallbackBackend {
    *BACKEND.get_or_init(|| TrampolineBackend::native())
}

#[cfg(test)]
mod tests;
