//! Callback invoker - the body behind every trampoline
//!
//! Native code arrives with an argument block laid out as the float argument
//! registers, then the integer argument registers, then the caller's stack
//! words. Parameters are pulled out of it in declaration order with the same
//! classification the native caller used to place them.

use super::compiler::Signature;
use super::func::SharedCallback;
use crate::interop::marshal::{from_word, to_result_word};
use crate::interop::{ArgClassifier, Value, MAX_FRAME_WORDS};
use crate::logging::{log_callback_result_dropped, log_invariant_violation};
use core::marker::PhantomData;

/// Read-only view of a callback argument block
///
/// The only place raw argument memory is read.
pub struct ArgBlock<'a> {
    base: *const usize,
    len: usize,
    _marker: PhantomData<&'a [usize]>,
}

impl<'a> ArgBlock<'a> {
    /// Block backed by ordinary memory, e.g. a host's saved registers
    pub fn from_words(words: &'a [usize]) -> Self {
        Self {
            base: words.as_ptr(),
            len: words.len(),
            _marker: PhantomData,
        }
    }

    /// Block spilled by a trampoline
    ///
    /// # Safety
    /// `base` must point to a trampoline argument block that stays live for
    /// `'a`. Only words covered by the callback's parameters are read.
    pub unsafe fn from_raw(base: *const usize) -> Self {
        Self {
            base,
            len: MAX_FRAME_WORDS,
            _marker: PhantomData,
        }
    }

    /// Word `index` of the block
    #[inline]
    pub fn word(&self, index: usize) -> usize {
        if index >= self.len {
            log_invariant_violation("argument block read out of range", "");
            panic!(
                "nativecall: argument word {} outside a {}-word block",
                index, self.len
            );
        }
        // Safety: in range per construction
        unsafe { self.base.add(index).read() }
    }
}

/// A registered callback together with its validated signature
#[derive(Debug)]
pub struct Binding {
    callback: SharedCallback,
    signature: Signature,
}

impl Binding {
    pub fn new(callback: SharedCallback, signature: Signature) -> Self {
        Self {
            callback,
            signature,
        }
    }

    pub fn callback(&self) -> &SharedCallback {
        &self.callback
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Decode the arguments in `block`, call the callback and encode its
    /// result word. `None` when the signature declares no result.
    ///
    /// String parameters dereference the pointer found in their word, so the
    /// block must come from a caller that honours the signature.
    pub fn invoke(&self, block: &ArgBlock<'_>) -> Option<usize> {
        let args = self.decode(block);
        let result = self.callback.call(args);

        match (self.signature.ret(), result) {
            (None, None) => None,
            (None, Some(value)) => {
                log_callback_result_dropped(value.kind().name());
                None
            }
            (Some(kind), Some(value)) if value.kind() == kind => Some(to_result_word(&value)),
            (Some(kind), other) => {
                log_invariant_violation("callback result does not match its signature", kind.name());
                panic!(
                    "nativecall: callback declared a {} result but produced {:?}",
                    kind, other
                );
            }
        }
    }

    /// Decode every declared parameter from `block`
    pub fn decode(&self, block: &ArgBlock<'_>) -> Vec<Value> {
        let mut classifier = ArgClassifier::default();
        self.signature
            .params()
            .iter()
            .map(|&kind| {
                let location = classifier.next(kind.register_class());
                // Safety: the native caller placed a value of `kind` here
                unsafe { from_word(kind, block.word(location.frame_index())) }
            })
            .collect()
    }
}
