//! Type definitions for FFI interoperability
//!
//! The closed set of scalar kinds that can cross the native boundary, the
//! wider type descriptions a host may report for a function, and the values
//! flowing through the marshaler.

use super::abi::RegisterClass;
use core::ffi::c_void;
use core::fmt;

/// Scalar kinds supported by the marshaler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ScalarKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    Pointer,
    /// NUL-terminated native string, surfaced as an owned `String`
    CString,
}

impl ScalarKind {
    #[inline]
    pub const fn register_class(self) -> RegisterClass {
        match self {
            Self::F32 | Self::F64 => RegisterClass::Float,
            _ => RegisterClass::Integer,
        }
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Kinds a callback may hand back through the integer result register
    #[inline]
    pub const fn is_returnable(self) -> bool {
        !matches!(self, Self::F32 | Self::F64 | Self::CString)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::Isize => "isize",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::Usize => "usize",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Pointer => "pointer",
            Self::CString => "cstring",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type of a parameter or result as reported by the host
///
/// Only `Scalar` survives validation; the remaining variants exist so that a
/// host describing functions at runtime can hand over anything it sees and
/// get a precise rejection back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeDesc {
    Scalar(ScalarKind),
    I128,
    U128,
    Complex64,
    Complex128,
    Struct(&'static str),
    Array,
    Slice,
    Map,
    Function,
    Channel,
    Interface,
}

impl TypeDesc {
    /// The scalar kind, if this type is part of the supported domain
    #[inline]
    pub const fn scalar(self) -> Option<ScalarKind> {
        match self {
            Self::Scalar(kind) => Some(kind),
            _ => None,
        }
    }
}

impl From<ScalarKind> for TypeDesc {
    fn from(kind: ScalarKind) -> Self {
        Self::Scalar(kind)
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(kind) => write!(f, "{}", kind),
            Self::I128 => f.write_str("i128"),
            Self::U128 => f.write_str("u128"),
            Self::Complex64 => f.write_str("complex64"),
            Self::Complex128 => f.write_str("complex128"),
            Self::Struct(name) => write!(f, "struct {}", name),
            Self::Array => f.write_str("array"),
            Self::Slice => f.write_str("slice"),
            Self::Map => f.write_str("map"),
            Self::Function => f.write_str("function"),
            Self::Channel => f.write_str("channel"),
            Self::Interface => f.write_str("interface"),
        }
    }
}

/// A marshaled scalar
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Isize(isize),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Usize(usize),
    F32(f32),
    F64(f64),
    Pointer(*mut c_void),
    CString(String),
}

impl Value {
    #[inline]
    pub fn kind(&self) -> ScalarKind {
        match self {
            Self::Bool(_) => ScalarKind::Bool,
            Self::I8(_) => ScalarKind::I8,
            Self::I16(_) => ScalarKind::I16,
            Self::I32(_) => ScalarKind::I32,
            Self::I64(_) => ScalarKind::I64,
            Self::Isize(_) => ScalarKind::Isize,
            Self::U8(_) => ScalarKind::U8,
            Self::U16(_) => ScalarKind::U16,
            Self::U32(_) => ScalarKind::U32,
            Self::U64(_) => ScalarKind::U64,
            Self::Usize(_) => ScalarKind::Usize,
            Self::F32(_) => ScalarKind::F32,
            Self::F64(_) => ScalarKind::F64,
            Self::Pointer(_) => ScalarKind::Pointer,
            Self::CString(_) => ScalarKind::CString,
        }
    }
}

// Safety: pointer values are opaque addresses and are never dereferenced here
unsafe impl Send for Value {}
unsafe impl Sync for Value {}
