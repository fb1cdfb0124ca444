//! nativecall - Call native code through raw addresses, and let native code
//! call back into Rust closures
//!
//! Two directions share one register model:
//! - outbound, [`call_native`] places up to 15 words in argument registers
//!   and stack slots and returns both result registers plus `errno`
//! - inbound, [`register_callback`] binds a closure to one of a fixed set of
//!   trampolines and hands out its entry address for native code to call
//!
//! ```no_run
//! let add = nativecall::register_callback(|a: i32, b: i32| a + b)?;
//! let (sum, _, _) = unsafe { nativecall::call_native(add, &[2, 3])? };
//! assert_eq!(sum as i32, 5);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod callback;
pub mod config;
pub mod interop;
pub mod logging;

pub use callback::{
    Callback, CallbackBackend, CallbackError, IntoCallback, SharedCallback, MAX_CALLBACKS,
};
pub use config::{Config, ConfigError};
pub use interop::{call_extern, CallError, FunctionCall, Library, ScalarKind, TypeDesc, Value};

/// Initialize logging from the process configuration
pub fn init() {
    logging::init_with_config(config::settings().logging.clone());
}

/// Install `config` and initialize logging with it
///
/// Must run before anything reads the configuration, i.e. before the first
/// native call or callback registration.
pub fn init_with_config(config: Config) -> Result<(), ConfigError> {
    let logging = config.logging.clone();
    config::install(config)?;
    logging::init_with_config(logging);
    Ok(())
}

/// Register a closure and return the native address that calls it
///
/// Every call consumes a slot, even for the same closure; use
/// [`register_callback_shared`] to deduplicate.
pub fn register_callback<Args, F: IntoCallback<Args>>(f: F) -> Result<usize, CallbackError> {
    callback::backend().register(Callback::new(f))
}

/// Register by identity: the same `Arc` always maps to the same address and
/// holds a single slot
pub fn register_callback_shared(callback: &SharedCallback) -> Result<usize, CallbackError> {
    callback::backend().register_shared(callback)
}

/// Release a callback by the address [`register_callback`] returned
pub fn unregister_callback(address: usize) -> Result<(), CallbackError> {
    callback::backend().unregister(address)
}

/// Release a callback registered with [`register_callback_shared`]
pub fn unregister_callback_shared(callback: &SharedCallback) -> Result<(), CallbackError> {
    callback::backend().unregister_shared(callback)
}

/// Call the native function at `address` with up to 15 word arguments
///
/// Returns `(r1, r2, errno)`. Missing arguments are passed as zero.
///
/// # Safety
/// `address` must be a native function that accepts the given words and is
/// safe to call on this thread.
pub unsafe fn call_native(address: usize, args: &[usize]) -> Result<(usize, usize, usize), CallError> {
    interop::syscall15x(address, args)
}

/// C entry point for embedders linking the static library
#[no_mangle]
pub extern "C" fn nativecall_init() {
    init();
}
