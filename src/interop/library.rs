//! Dynamic library loading and symbol resolution
//!
//! Thin wrapper around dlopen/dlsym. Resolved addresses are cached per
//! library so repeated lookups of the same symbol skip the loader.

use super::{LIBRARIES_LOADED, SYMBOLS_RESOLVED};
use crate::logging::{log_library_loaded, log_symbol_resolved};
use core::ffi::{c_char, c_int, c_void};
use core::ptr::NonNull;
use dashmap::DashMap;
use std::ffi::{CStr, CString};
use std::sync::atomic::Ordering;

/// Resolve all symbols when the library is opened
pub const RTLD_NOW: c_int = libc::RTLD_NOW;
/// Keep the library's symbols out of the global namespace
pub const RTLD_LOCAL: c_int = libc::RTLD_LOCAL;
/// Make the library's symbols available to later loads
pub const RTLD_GLOBAL: c_int = libc::RTLD_GLOBAL;

/// Handle to dynamically loaded library
pub struct Library {
    handle: NonNull<c_void>,
    name: String,
    symbols: DashMap<String, usize>,
}

impl Library {
    /// Load library by name or path with `RTLD_NOW | RTLD_LOCAL`
    pub fn open(name: &str) -> Result<Self, LoadError> {
        Self::open_with_flags(name, RTLD_NOW | RTLD_LOCAL)
    }

    /// Load library with explicit `dlopen` flags
    pub fn open_with_flags(name: &str, flags: c_int) -> Result<Self, LoadError> {
        let cname = CString::new(name).map_err(|_| LoadError::InvalidName)?;
        Self::open_raw(cname.as_ptr(), name, flags)
    }

    /// Handle to the running process image and everything it has loaded
    pub fn this() -> Result<Self, LoadError> {
        Self::open_raw(core::ptr::null(), "<self>", RTLD_NOW)
    }

    fn open_raw(cname: *const c_char, name: &str, flags: c_int) -> Result<Self, LoadError> {
        let handle = unsafe { libc::dlopen(cname, flags) };
        let handle = NonNull::new(handle).ok_or_else(|| LoadError::LoadFailed(last_dl_error()))?;

        LIBRARIES_LOADED.fetch_add(1, Ordering::Relaxed);
        log_library_loaded(name);

        Ok(Self {
            handle,
            name: name.to_string(),
            symbols: DashMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get function address by symbol name
    pub fn symbol(&self, name: &str) -> Result<usize, SymbolError> {
        if let Some(addr) = self.symbols.get(name) {
            return Ok(*addr);
        }

        let cname = CString::new(name).map_err(|_| SymbolError::InvalidName)?;
        let ptr = unsafe { libc::dlsym(self.handle.as_ptr(), cname.as_ptr()) };
        if ptr.is_null() {
            return Err(SymbolError::NotFound(name.to_string()));
        }

        let addr = ptr as usize;
        self.symbols.insert(name.to_string(), addr);
        SYMBOLS_RESOLVED.fetch_add(1, Ordering::Relaxed);
        log_symbol_resolved(&self.name, name, addr);
        Ok(addr)
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        unsafe {
            libc::dlclose(self.handle.as_ptr());
        }
    }
}

impl core::fmt::Debug for Library {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Library")
            .field("name", &self.name)
            .field("cached_symbols", &self.symbols.len())
            .finish()
    }
}

// Safety: dlopen handles may be used from any thread
unsafe impl Send for Library {}
unsafe impl Sync for Library {}

fn last_dl_error() -> String {
    unsafe {
        let err = libc::dlerror();
        if err.is_null() {
            "Unknown error".into()
        } else {
            CStr::from_ptr(err).to_string_lossy().into_owned()
        }
    }
}

/// Library loading errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    InvalidName,
    LoadFailed(String),
}

impl core::fmt::Display for LoadError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidName => write!(f, "Invalid library name"),
            Self::LoadFailed(msg) => write!(f, "Failed to load library: {}", msg),
        }
    }
}

impl std::error::Error for LoadError {}

/// Symbol lookup errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    InvalidName,
    NotFound(String),
}

impl core::fmt::Display for SymbolError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidName => write!(f, "Invalid symbol name"),
            Self::NotFound(name) => write!(f, "Symbol not found: {}", name),
        }
    }
}

impl std::error::Error for SymbolError {}
