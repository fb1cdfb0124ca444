//! Managed callback values
//!
//! A [`Callback`] pairs a host-described signature with a type-erased body.
//! Typed Rust closures describe themselves through [`CallbackArg`] and
//! [`CallbackRet`]; hosts that only know a function's shape at runtime use
//! [`Callback::dynamic`] and let registration reject what does not fit.

use crate::interop::{ScalarKind, TypeDesc, Value};
use crate::logging::log_invariant_violation;
use core::ffi::c_void;
use std::sync::Arc;

type Body = Box<dyn Fn(Vec<Value>) -> Option<Value> + Send + Sync>;

/// Callback shared by identity
///
/// The address of the shared allocation is the dedup key for
/// identity-based registration.
pub type SharedCallback = Arc<Callback>;

/// A managed function that native code may call
pub struct Callback {
    params: Vec<TypeDesc>,
    results: Vec<TypeDesc>,
    body: Body,
}

impl Callback {
    /// Wrap a typed closure
    pub fn new<Args, F: IntoCallback<Args>>(f: F) -> Self {
        f.into_callback()
    }

    /// Describe a function at runtime
    ///
    /// `body` receives one decoded value per parameter and returns the single
    /// result, if any. Nothing is checked here; registration validates.
    pub fn dynamic<F>(params: Vec<TypeDesc>, results: Vec<TypeDesc>, body: F) -> Self
    where
        F: Fn(Vec<Value>) -> Option<Value> + Send + Sync + 'static,
    {
        Self {
            params,
            results,
            body: Box::new(body),
        }
    }

    /// Wrap for identity-based registration
    pub fn shared(self) -> SharedCallback {
        Arc::new(self)
    }

    pub fn params(&self) -> &[TypeDesc] {
        &self.params
    }

    pub fn results(&self) -> &[TypeDesc] {
        &self.results
    }

    /// Run the body with already decoded arguments
    #[inline]
    pub fn call(&self, args: Vec<Value>) -> Option<Value> {
        (self.body)(args)
    }
}

impl core::fmt::Debug for Callback {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Callback")
            .field("params", &self.params)
            .field("results", &self.results)
            .finish_non_exhaustive()
    }
}

/// Identity of a shared callback: the address of its allocation
#[inline]
pub fn identity_of(callback: &SharedCallback) -> usize {
    Arc::as_ptr(callback) as usize
}

/// Parameter types a typed closure may take
pub trait CallbackArg: Sized {
    const DESC: TypeDesc;

    fn from_value(value: Value) -> Self;
}

/// Result types a typed closure may return
pub trait CallbackRet {
    fn results() -> Vec<TypeDesc>;

    fn into_value(self) -> Option<Value>;
}

/// Conversion into a [`Callback`]
///
/// `Args` is the closure's parameter tuple; it only disambiguates impls.
pub trait IntoCallback<Args> {
    fn into_callback(self) -> Callback;
}

impl IntoCallback<Callback> for Callback {
    fn into_callback(self) -> Callback {
        self
    }
}

#[cold]
fn kind_mismatch(expected: TypeDesc, found: &Value) -> ! {
    log_invariant_violation("callback argument kind mismatch", found.kind().name());
    panic!(
        "nativecall: callback argument decoded as {}, closure expects {}",
        found.kind(),
        expected
    );
}

macro_rules! scalar_arg {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl CallbackArg for $ty {
                const DESC: TypeDesc = TypeDesc::Scalar(ScalarKind::$variant);

                #[inline]
                fn from_value(value: Value) -> Self {
                    match value {
                        Value::$variant(v) => v,
                        other => kind_mismatch(Self::DESC, &other),
                    }
                }
            }
        )*
    };
}

scalar_arg! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    isize => Isize,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    usize => Usize,
    f32 => F32,
    f64 => F64,
}

/// Native strings arrive as owned copies
impl CallbackArg for String {
    const DESC: TypeDesc = TypeDesc::Scalar(ScalarKind::CString);

    #[inline]
    fn from_value(value: Value) -> Self {
        match value {
            Value::CString(s) => s,
            other => kind_mismatch(Self::DESC, &other),
        }
    }
}

impl<T> CallbackArg for *mut T {
    const DESC: TypeDesc = TypeDesc::Scalar(ScalarKind::Pointer);

    #[inline]
    fn from_value(value: Value) -> Self {
        match value {
            Value::Pointer(p) => p.cast(),
            other => kind_mismatch(Self::DESC, &other),
        }
    }
}

impl<T> CallbackArg for *const T {
    const DESC: TypeDesc = TypeDesc::Scalar(ScalarKind::Pointer);

    #[inline]
    fn from_value(value: Value) -> Self {
        match value {
            Value::Pointer(p) => p.cast_const().cast(),
            other => kind_mismatch(Self::DESC, &other),
        }
    }
}

impl CallbackRet for () {
    fn results() -> Vec<TypeDesc> {
        Vec::new()
    }

    #[inline]
    fn into_value(self) -> Option<Value> {
        None
    }
}

macro_rules! scalar_ret {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl CallbackRet for $ty {
                fn results() -> Vec<TypeDesc> {
                    vec![TypeDesc::Scalar(ScalarKind::$variant)]
                }

                #[inline]
                fn into_value(self) -> Option<Value> {
                    Some(Value::$variant(self))
                }
            }
        )*
    };
}

scalar_ret! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    isize => Isize,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    usize => Usize,
}

impl<T> CallbackRet for *mut T {
    fn results() -> Vec<TypeDesc> {
        vec![TypeDesc::Scalar(ScalarKind::Pointer)]
    }

    #[inline]
    fn into_value(self) -> Option<Value> {
        Some(Value::Pointer(self.cast::<c_void>()))
    }
}

impl<T> CallbackRet for *const T {
    fn results() -> Vec<TypeDesc> {
        vec![TypeDesc::Scalar(ScalarKind::Pointer)]
    }

    #[inline]
    fn into_value(self) -> Option<Value> {
        Some(Value::Pointer(self.cast::<c_void>().cast_mut()))
    }
}

macro_rules! closure_callback {
    ($($arg:ident),*) => {
        impl<F, R, $($arg,)*> IntoCallback<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: CallbackRet,
            $($arg: CallbackArg,)*
        {
            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn into_callback(self) -> Callback {
                Callback {
                    params: vec![$($arg::DESC),*],
                    results: R::results(),
                    body: Box::new(move |args: Vec<Value>| {
                        let mut args = args.into_iter();
                        $(
                            let $arg = match args.next() {
                                Some(value) => $arg::from_value(value),
                                None => missing_argument(),
                            };
                        )*
                        (self)($($arg),*).into_value()
                    }),
                }
            }
        }
    };
}

#[cold]
fn missing_argument() -> ! {
    log_invariant_violation("callback invoked with too few arguments", "");
    panic!("nativecall: callback invoked with too few arguments");
}

closure_callback!();
closure_callback!(A1);
closure_callback!(A1, A2);
closure_callback!(A1, A2, A3);
closure_callback!(A1, A2, A3, A4);
closure_callback!(A1, A2, A3, A4, A5);
closure_callback!(A1, A2, A3, A4, A5, A6);
closure_callback!(A1, A2, A3, A4, A5, A6, A7);
closure_callback!(A1, A2, A3, A4, A5, A6, A7, A8);
closure_callback!(A1, A2, A3, A4, A5, A6, A7, A8, A9);
closure_callback!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10);
closure_callback!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11);
closure_callback!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12);
closure_callback!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12, A13);
closure_callback!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12, A13, A14);
closure_callback!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12, A13, A14, A15);
closure_callback!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12, A13, A14, A15, A16);
closure_callback!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12, A13, A14, A15, A16, A17);
closure_callback!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12, A13, A14, A15, A16, A17, A18);
closure_callback!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12, A13, A14, A15, A16, A17, A18, A19);
closure_callback!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12, A13, A14, A15, A16, A17, A18, A19, A20);
