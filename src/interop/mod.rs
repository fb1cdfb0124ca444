//! Interoperability - Call native functions through raw addresses
//!
//! Design: one mechanical gateway plus typed marshaling on top
//!
//! Architecture:
//! - `abi.rs` - Register counts, trampoline geometry, argument classification
//! - `types.rs` - Scalar kinds, host type descriptions, marshaled values
//! - `marshal.rs` - Word ↔ value conversions
//! - `call.rs` - Register frame gateway with inline assembly, typed calls
//! - `library.rs` - Dynamic library loading (dlopen)

pub mod abi;
mod call;
mod library;
pub mod marshal;
mod types;

pub use abi::{
    ArgClassifier, ArgLocation, CallingConvention, RegisterClass, FLOAT_REGISTER_COUNT,
    INT_REGISTER_COUNT, MAX_CALL_ARGS, MAX_FRAME_WORDS, TRAMPOLINE_ENTRY_STRIDE,
};
pub use call::{call_extern, call_frame, syscall15x, CallError, CallFrame, FunctionCall};
pub use library::{Library, LoadError, SymbolError, RTLD_GLOBAL, RTLD_LOCAL, RTLD_NOW};
pub use types::{ScalarKind, TypeDesc, Value};

use std::sync::atomic::{AtomicUsize, Ordering};

pub(crate) static CALLS_MADE: AtomicUsize = AtomicUsize::new(0);
pub(crate) static LIBRARIES_LOADED: AtomicUsize = AtomicUsize::new(0);
pub(crate) static SYMBOLS_RESOLVED: AtomicUsize = AtomicUsize::new(0);

/// Get interop statistics
pub fn stats() -> InteropStats {
    InteropStats {
        calls_made: CALLS_MADE.load(Ordering::Relaxed),
        libraries_loaded: LIBRARIES_LOADED.load(Ordering::Relaxed),
        symbols_resolved: SYMBOLS_RESOLVED.load(Ordering::Relaxed),
    }
}

/// Interop statistics for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteropStats {
    pub calls_made: usize,
    pub libraries_loaded: usize,
    pub symbols_resolved: usize,
}
