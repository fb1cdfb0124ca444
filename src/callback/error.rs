use crate::interop::TypeDesc;
use core::fmt;

/// What an unregistration was keyed by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Address(usize),
    Identity(usize),
}

/// Callback registration errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackError {
    /// Parameter `index` is outside the scalar domain
    UnsupportedArgumentType { index: usize, found: TypeDesc },
    UnsupportedReturnType { found: TypeDesc },
    /// More than one result
    UnsupportedReturnArity { count: usize },
    /// The arguments would not fit one argument block
    TooManyParameters { count: usize },
    CapacityExceeded { capacity: usize },
    CallbackNotFound(Lookup),
    SlotNotBound { slot: usize },
    BackendAlreadyInstalled,
    Host(String),
}

impl fmt::Display for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedArgumentType { index, found } => {
                write!(f, "Unsupported argument type for parameter {}: {}", index, found)
            }
            Self::UnsupportedReturnType { found } => {
                write!(f, "Unsupported return type: {}", found)
            }
            Self::UnsupportedReturnArity { count } => {
                write!(f, "Callbacks can return at most one value, found {}", count)
            }
            Self::TooManyParameters { count } => {
                write!(f, "{} parameters overflow the callback argument block", count)
            }
            Self::CapacityExceeded { capacity } => {
                write!(f, "The maximum number of callbacks ({}) has been reached", capacity)
            }
            Self::CallbackNotFound(Lookup::Address(addr)) => {
                write!(f, "Callback not found at address {:#x}", addr)
            }
            Self::CallbackNotFound(Lookup::Identity(id)) => {
                write!(f, "Callback not found for function identity {:#x}", id)
            }
            Self::SlotNotBound { slot } => write!(f, "Trampoline slot {} is not bound", slot),
            Self::BackendAlreadyInstalled => {
                write!(f, "A callback backend is already installed")
            }
            Self::Host(msg) => write!(f, "Host callback backend error: {}", msg),
        }
    }
}

impl std::error::Error for CallbackError {}
