//! Type marshaling - machine words ↔ typed values
//!
//! Every conversion here is a bit-pattern reinterpretation of one machine
//! word. Narrow integers take the low bits of the word; floats are read from
//! the low 32 or 64 bits of a float register or stack slot.

use super::call::CallError;
use super::types::{ScalarKind, Value};
use crate::logging::log_invariant_violation;
use core::ffi::{c_char, c_void};
use std::ffi::{CStr, CString};

/// Reinterpret a raw argument or result word as `kind`
///
/// # Safety
/// For [`ScalarKind::CString`] the word must be null or point to a
/// NUL-terminated byte sequence that stays valid for the duration of the
/// call. Every other kind is a plain bit reinterpretation.
pub unsafe fn from_word(kind: ScalarKind, word: usize) -> Value {
    match kind {
        ScalarKind::Bool => Value::Bool(word as u8 != 0),
        ScalarKind::I8 => Value::I8(word as i8),
        ScalarKind::I16 => Value::I16(word as i16),
        ScalarKind::I32 => Value::I32(word as i32),
        ScalarKind::I64 => Value::I64(word as i64),
        ScalarKind::Isize => Value::Isize(word as isize),
        ScalarKind::U8 => Value::U8(word as u8),
        ScalarKind::U16 => Value::U16(word as u16),
        ScalarKind::U32 => Value::U32(word as u32),
        ScalarKind::U64 => Value::U64(word as u64),
        ScalarKind::Usize => Value::Usize(word),
        ScalarKind::F32 => Value::F32(f32::from_bits(word as u32)),
        ScalarKind::F64 => Value::F64(f64::from_bits(word as u64)),
        ScalarKind::Pointer => Value::Pointer(word as *mut c_void),
        ScalarKind::CString => Value::CString(read_c_string(word as *const c_char)),
    }
}

/// Copy a native NUL-terminated string into an owned `String`
///
/// Null pointers decode to the empty string; invalid UTF-8 is replaced.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated byte sequence.
pub unsafe fn read_c_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}

/// Encode a callback result into the native result word
///
/// Booleans become exactly 0 or 1, signed integers are sign-extended to the
/// word, unsigned integers are zero-extended and pointers keep their bits.
///
/// # Panics
/// On float or string values. Registration rejects such result kinds, so
/// reaching this point means validation was bypassed.
pub fn to_result_word(value: &Value) -> usize {
    match *value {
        Value::Bool(b) => b as usize,
        Value::I8(v) => v as isize as usize,
        Value::I16(v) => v as isize as usize,
        Value::I32(v) => v as isize as usize,
        Value::I64(v) => v as isize as usize,
        Value::Isize(v) => v as usize,
        Value::U8(v) => v as usize,
        Value::U16(v) => v as usize,
        Value::U32(v) => v as usize,
        Value::U64(v) => v as usize,
        Value::Usize(v) => v,
        Value::Pointer(p) => p as usize,
        Value::F32(_) | Value::F64(_) | Value::CString(_) => {
            let kind = value.kind();
            log_invariant_violation("unsupported callback result kind", kind.name());
            panic!("nativecall: unsupported callback result kind: {}", kind);
        }
    }
}

/// Encode an outbound argument into a register or stack word
///
/// Strings are copied into `keep`, which must outlive the native call.
pub fn to_arg_word(value: &Value, keep: &mut Vec<CString>) -> Result<usize, CallError> {
    let word = match value {
        Value::Bool(b) => *b as usize,
        Value::I8(v) => *v as isize as usize,
        Value::I16(v) => *v as isize as usize,
        Value::I32(v) => *v as isize as usize,
        Value::I64(v) => *v as isize as usize,
        Value::Isize(v) => *v as usize,
        Value::U8(v) => *v as usize,
        Value::U16(v) => *v as usize,
        Value::U32(v) => *v as usize,
        Value::U64(v) => *v as usize,
        Value::Usize(v) => *v,
        Value::F32(v) => v.to_bits() as usize,
        Value::F64(v) => v.to_bits() as usize,
        Value::Pointer(p) => *p as usize,
        Value::CString(s) => {
            let owned = CString::new(s.as_str()).map_err(|_| CallError::InvalidString)?;
            let ptr = owned.as_ptr() as usize;
            keep.push(owned);
            ptr
        }
    };
    Ok(word)
}
