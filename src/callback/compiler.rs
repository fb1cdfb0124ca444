//! Callback compiler - signature validation and slot binding
//!
//! Turns a [`Callback`] into a native entry address: checks that every
//! parameter and the result fit the scalar domain, binds a registry slot and
//! derives the slot's entry point from the trampoline table geometry.

use super::error::CallbackError;
use super::func::{Callback, SharedCallback};
use super::invoker::Binding;
use super::registry::Registry;
use crate::interop::{ArgClassifier, ScalarKind, MAX_FRAME_WORDS};
use crate::logging::{log_callback_deduplicated, log_callback_registered, log_callback_rejected};

/// A validated callback signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    params: Vec<ScalarKind>,
    ret: Option<ScalarKind>,
}

impl Signature {
    pub fn params(&self) -> &[ScalarKind] {
        &self.params
    }

    pub fn ret(&self) -> Option<ScalarKind> {
        self.ret
    }

    /// Validate a callback's declared parameter and result types
    pub fn of(callback: &Callback) -> Result<Self, CallbackError> {
        let params = callback
            .params()
            .iter()
            .enumerate()
            .map(|(index, &desc)| {
                desc.scalar()
                    .ok_or(CallbackError::UnsupportedArgumentType { index, found: desc })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let ret = match *callback.results() {
            [] => None,
            [desc] => match desc.scalar() {
                Some(kind) if kind.is_returnable() => Some(kind),
                _ => return Err(CallbackError::UnsupportedReturnType { found: desc }),
            },
            ref results => {
                return Err(CallbackError::UnsupportedReturnArity {
                    count: results.len(),
                })
            }
        };

        let mut classifier = ArgClassifier::default();
        let overflow = params
            .iter()
            .map(|kind| classifier.next(kind.register_class()).frame_index())
            .any(|index| index >= MAX_FRAME_WORDS);
        if overflow {
            return Err(CallbackError::TooManyParameters {
                count: params.len(),
            });
        }

        Ok(Self { params, ret })
    }
}

/// Geometry of a trampoline table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryTable {
    base: usize,
    stride: usize,
}

impl EntryTable {
    pub const fn new(base: usize, stride: usize) -> Self {
        Self { base, stride }
    }

    /// Native entry address of `slot`
    #[inline]
    pub const fn entry(&self, slot: usize) -> usize {
        self.base + slot * self.stride
    }

    pub const fn base(&self) -> usize {
        self.base
    }

    pub const fn stride(&self) -> usize {
        self.stride
    }
}

/// Register `callback` and return its entry address
///
/// With an `identity` the dedup cache is consulted first, and a hit returns
/// the address issued earlier without validating or consuming a slot.
pub fn compile(
    registry: &Registry,
    table: &EntryTable,
    callback: SharedCallback,
    identity: Option<usize>,
) -> Result<usize, CallbackError> {
    if let Some(address) = identity.and_then(|id| registry.lookup_by_identity(id)) {
        log_callback_deduplicated(address);
        return Ok(address);
    }

    let signature = Signature::of(&callback).map_err(|err| {
        log_callback_rejected(&err);
        err
    })?;

    let allocation = registry.allocate(Binding::new(callback, signature), identity, |slot| {
        table.entry(slot)
    })?;

    if allocation.reused {
        log_callback_deduplicated(allocation.address);
    } else {
        log_callback_registered(allocation.slot, allocation.address);
    }
    Ok(allocation.address)
}

