//! Native call gateway
//!
//! A fixed register frame (15 integer words, 8 float words) is loaded into
//! the host calling convention by inline assembly and the target is called.
//! The gateway never inspects argument types; typed callers go through
//! [`FunctionCall`], which classifies values into the frame first.

use super::abi::{ArgClassifier, ArgLocation, INT_REGISTER_COUNT, MAX_CALL_ARGS};
use super::marshal::{from_word, to_arg_word};
use super::types::{ScalarKind, Value};
use super::CALLS_MADE;
use crate::logging::{log_native_call, log_native_return};
use std::sync::atomic::Ordering;

/// Float argument registers carried by the gateway frame
pub const FRAME_FLOAT_WORDS: usize = 8;

/// Register frame handed to the assembly gateway
///
/// `ints[..INT_REGISTER_COUNT]` go to integer argument registers and the rest
/// to the stack in order. `floats` go to the float argument registers. After
/// the call `r1`/`r2` hold the two integer result registers, `floats[0]` the
/// first float result register and `err` the captured `errno`.
#[repr(C)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallFrame {
    pub function: usize,
    pub ints: [usize; MAX_CALL_ARGS],
    pub floats: [usize; FRAME_FLOAT_WORDS],
    pub r1: usize,
    pub r2: usize,
    pub err: usize,
}

// The assembly below addresses fields by fixed byte offsets.
const _: () = assert!(core::mem::size_of::<CallFrame>() == 27 * 8);

impl CallFrame {
    #[inline]
    pub fn new(function: usize) -> Self {
        Self {
            function,
            ..Self::default()
        }
    }

    /// Frame for the untyped gateway: missing words are zero and the first
    /// eight words are mirrored into the float registers.
    pub fn with_args(function: usize, args: &[usize]) -> Result<Self, CallError> {
        if args.len() > MAX_CALL_ARGS {
            return Err(CallError::TooManyArgs { got: args.len() });
        }
        let mut frame = Self::new(function);
        frame.ints[..args.len()].copy_from_slice(args);
        frame.floats.copy_from_slice(&frame.ints[..FRAME_FLOAT_WORDS]);
        Ok(frame)
    }
}

/// Call `function` with up to 15 integer-sized arguments
///
/// Returns both integer result registers and the `errno` observed right
/// after the call (cleared beforehand when errno capture is enabled).
///
/// # Safety
/// `function` must be the address of a native function whose parameters are
/// satisfied by the given words, and which is safe to call on this thread.
pub unsafe fn syscall15x(function: usize, args: &[usize]) -> Result<(usize, usize, usize), CallError> {
    let mut frame = CallFrame::with_args(function, args)?;
    call_frame(&mut frame)?;
    Ok((frame.r1, frame.r2, frame.err))
}

/// Run a prepared frame through the gateway
///
/// # Safety
/// See [`syscall15x`].
pub unsafe fn call_frame(frame: &mut CallFrame) -> Result<(), CallError> {
    if frame.function == 0 {
        return Err(CallError::NullFunction);
    }

    let capture = crate::config::settings().gateway.capture_errno;
    log_native_call(frame.function);

    if capture {
        *errno_location() = 0;
    }
    raw_call(frame);
    frame.err = if capture { *errno_location() as usize } else { 0 };

    CALLS_MADE.fetch_add(1, Ordering::Relaxed);
    log_native_return(frame.function, frame.r1, frame.err);
    Ok(())
}

#[cfg(target_os = "linux")]
#[inline]
unsafe fn errno_location() -> *mut libc::c_int {
    libc::__errno_location()
}

#[cfg(target_os = "android")]
#[inline]
unsafe fn errno_location() -> *mut libc::c_int {
    libc::__errno()
}

#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
#[inline]
unsafe fn errno_location() -> *mut libc::c_int {
    libc::__error()
}

/// System V x86-64: RDI, RSI, RDX, RCX, R8, R9, then nine stack words;
/// XMM0-XMM7 for floats. Results in RAX, RDX and XMM0.
#[cfg(target_arch = "x86_64")]
#[inline(never)]
unsafe fn raw_call(frame: &mut CallFrame) {
    core::arch::asm!(
        "mov r13, rsp",
        "and rsp, -16",
        "sub rsp, 80",
        "mov rax, [r12 + 56]",
        "mov [rsp], rax",
        "mov rax, [r12 + 64]",
        "mov [rsp + 8], rax",
        "mov rax, [r12 + 72]",
        "mov [rsp + 16], rax",
        "mov rax, [r12 + 80]",
        "mov [rsp + 24], rax",
        "mov rax, [r12 + 88]",
        "mov [rsp + 32], rax",
        "mov rax, [r12 + 96]",
        "mov [rsp + 40], rax",
        "mov rax, [r12 + 104]",
        "mov [rsp + 48], rax",
        "mov rax, [r12 + 112]",
        "mov [rsp + 56], rax",
        "mov rax, [r12 + 120]",
        "mov [rsp + 64], rax",
        "movsd xmm0, qword ptr [r12 + 128]",
        "movsd xmm1, qword ptr [r12 + 136]",
        "movsd xmm2, qword ptr [r12 + 144]",
        "movsd xmm3, qword ptr [r12 + 152]",
        "movsd xmm4, qword ptr [r12 + 160]",
        "movsd xmm5, qword ptr [r12 + 168]",
        "movsd xmm6, qword ptr [r12 + 176]",
        "movsd xmm7, qword ptr [r12 + 184]",
        "mov rdi, [r12 + 8]",
        "mov rsi, [r12 + 16]",
        "mov rdx, [r12 + 24]",
        "mov rcx, [r12 + 32]",
        "mov r8, [r12 + 40]",
        "mov r9, [r12 + 48]",
        "mov r11, [r12]",
        // AL carries the vector register count for variadic callees
        "mov eax, 8",
        "call r11",
        "mov rsp, r13",
        "mov [r12 + 192], rax",
        "mov [r12 + 200], rdx",
        "movsd qword ptr [r12 + 128], xmm0",
        in("r12") frame as *mut CallFrame,
        out("r13") _,
        clobber_abi("C"),
    );
}

/// AAPCS64: X0-X7, then seven stack words; D0-D7 for floats.
/// Results in X0, X1 and D0.
#[cfg(target_arch = "aarch64")]
#[inline(never)]
unsafe fn raw_call(frame: &mut CallFrame) {
    core::arch::asm!(
        "mov x21, sp",
        "sub sp, sp, #64",
        "ldr x9, [x20, #72]",
        "str x9, [sp]",
        "ldr x9, [x20, #80]",
        "str x9, [sp, #8]",
        "ldr x9, [x20, #88]",
        "str x9, [sp, #16]",
        "ldr x9, [x20, #96]",
        "str x9, [sp, #24]",
        "ldr x9, [x20, #104]",
        "str x9, [sp, #32]",
        "ldr x9, [x20, #112]",
        "str x9, [sp, #40]",
        "ldr x9, [x20, #120]",
        "str x9, [sp, #48]",
        "ldp d0, d1, [x20, #128]",
        "ldp d2, d3, [x20, #144]",
        "ldp d4, d5, [x20, #160]",
        "ldp d6, d7, [x20, #176]",
        "ldp x0, x1, [x20, #8]",
        "ldp x2, x3, [x20, #24]",
        "ldp x4, x5, [x20, #40]",
        "ldp x6, x7, [x20, #56]",
        "ldr x16, [x20]",
        "blr x16",
        "mov sp, x21",
        "stp x0, x1, [x20, #192]",
        "str d0, [x20, #128]",
        in("x20") frame as *mut CallFrame,
        out("x21") _,
        clobber_abi("C"),
    );
}

/// Typed call descriptor
///
/// Arguments are classified with the same register bookkeeping the callback
/// invoker uses, so integer and float parameters may be freely interleaved.
#[derive(Debug, Clone)]
pub struct FunctionCall {
    ptr: usize,
    params: Vec<ScalarKind>,
    ret: Option<ScalarKind>,
}

impl FunctionCall {
    #[inline]
    pub fn new(ptr: usize, params: Vec<ScalarKind>, ret: Option<ScalarKind>) -> Self {
        Self { ptr, params, ret }
    }

    pub fn params(&self) -> &[ScalarKind] {
        &self.params
    }

    pub fn ret(&self) -> Option<ScalarKind> {
        self.ret
    }

    /// Call function with arguments
    ///
    /// # Safety
    /// Caller must ensure:
    /// - Function pointer is valid
    /// - Declared parameter and result kinds match the native function
    /// - A `CString` result, if declared, points to a valid string
    pub unsafe fn call(&self, args: &[Value]) -> Result<Option<Value>, CallError> {
        self.call_with_errno(args).map(|(value, _)| value)
    }

    /// Like [`call`](Self::call), also returning the captured `errno`
    ///
    /// # Safety
    /// See [`call`](Self::call).
    pub unsafe fn call_with_errno(&self, args: &[Value]) -> Result<(Option<Value>, usize), CallError> {
        if args.len() != self.params.len() {
            return Err(CallError::ArgCountMismatch {
                expected: self.params.len(),
                got: args.len(),
            });
        }

        let mut frame = CallFrame::new(self.ptr);
        let mut strings = Vec::new();
        let mut classifier = ArgClassifier::default();

        for (index, (value, &kind)) in args.iter().zip(&self.params).enumerate() {
            if value.kind() != kind {
                return Err(CallError::ArgKindMismatch {
                    index,
                    expected: kind,
                    got: value.kind(),
                });
            }
            let word = to_arg_word(value, &mut strings)?;
            match classifier.next(kind.register_class()) {
                ArgLocation::IntRegister(n) => frame.ints[n] = word,
                ArgLocation::FloatRegister(n) => frame.floats[n] = word,
                ArgLocation::Stack(n) => {
                    let slot = INT_REGISTER_COUNT + n;
                    if slot >= MAX_CALL_ARGS {
                        return Err(CallError::TooManyArgs { got: args.len() });
                    }
                    frame.ints[slot] = word;
                }
            }
        }

        call_frame(&mut frame)?;
        drop(strings);

        let value = self.ret.map(|kind| {
            let word = if kind.is_float() { frame.floats[0] } else { frame.r1 };
            from_word(kind, word)
        });
        Ok((value, frame.err))
    }
}

/// Function call errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    ArgCountMismatch { expected: usize, got: usize },
    ArgKindMismatch { index: usize, expected: ScalarKind, got: ScalarKind },
    TooManyArgs { got: usize },
    NullFunction,
    InvalidString,
}

impl core::fmt::Display for CallError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ArgCountMismatch { expected, got } => {
                write!(f, "Expected {} arguments, got {}", expected, got)
            }
            Self::ArgKindMismatch { index, expected, got } => {
                write!(f, "Argument {} should be {}, got {}", index, expected, got)
            }
            Self::TooManyArgs { got } => {
                write!(f, "{} arguments do not fit the {}-word call frame", got, MAX_CALL_ARGS)
            }
            Self::NullFunction => write!(f, "Function address is null"),
            Self::InvalidString => write!(f, "String argument contains an interior NUL byte"),
        }
    }
}

impl std::error::Error for CallError {}

/// High-level API: Call C function with typed arguments
///
/// # Safety
/// See `FunctionCall::call` safety requirements
#[inline]
pub unsafe fn call_extern(
    fn_ptr: usize,
    args: &[Value],
    return_type: Option<ScalarKind>,
) -> Result<Option<Value>, CallError> {
    let params = args.iter().map(Value::kind).collect();
    FunctionCall::new(fn_ptr, params, return_type).call(args)
}
