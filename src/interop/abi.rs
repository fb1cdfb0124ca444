//! ABI (Application Binary Interface) model
//!
//! Register counts and trampoline geometry for the host calling convention.
//! Everything that classifies arguments into register classes goes through
//! [`ArgClassifier`], so inbound and outbound marshaling agree on layout.

#[cfg(not(all(
    any(target_arch = "x86_64", target_arch = "aarch64"),
    any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "macos",
        target_os = "ios"
    )
)))]
compile_error!(
    "nativecall supports x86_64 and aarch64 on Linux, Android, FreeBSD and Apple platforms only"
);

/// Calling convention specification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CallingConvention {
    /// System V AMD64 ABI (Unix x86-64)
    SysV,
    /// ARM64 procedure call standard
    Aarch64,
}

impl CallingConvention {
    /// Convention of the build target
    #[cfg(target_arch = "x86_64")]
    pub const HOST: Self = Self::SysV;

    /// Convention of the build target
    #[cfg(target_arch = "aarch64")]
    pub const HOST: Self = Self::Aarch64;

    /// Integer argument registers
    #[inline]
    pub const fn int_registers(self) -> usize {
        match self {
            Self::SysV => 6,    // RDI, RSI, RDX, RCX, R8, R9
            Self::Aarch64 => 8, // X0-X7
        }
    }

    /// Floating-point argument registers
    #[inline]
    pub const fn float_registers(self) -> usize {
        match self {
            Self::SysV => 8,    // XMM0-XMM7
            Self::Aarch64 => 8, // D0-D7
        }
    }

    /// Bytes between two consecutive trampoline entry points
    #[inline]
    pub const fn entry_stride(self) -> usize {
        match self {
            // call rel32
            Self::SysV => 5,
            // adr + b
            Self::Aarch64 => 8,
        }
    }
}

impl Default for CallingConvention {
    #[inline]
    fn default() -> Self {
        Self::HOST
    }
}

pub const INT_REGISTER_COUNT: usize = CallingConvention::HOST.int_registers();
pub const FLOAT_REGISTER_COUNT: usize = CallingConvention::HOST.float_registers();
pub const TRAMPOLINE_ENTRY_STRIDE: usize = CallingConvention::HOST.entry_stride();

/// Integer argument words accepted by the native call gateway.
pub const MAX_CALL_ARGS: usize = 15;

/// Words in a callback argument block: float registers, integer registers,
/// then spilled stack words.
pub const MAX_FRAME_WORDS: usize = 64;

/// ABI bucket an argument is assigned to before falling back to the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterClass {
    Integer,
    Float,
}

/// Where a classified argument lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgLocation {
    IntRegister(usize),
    FloatRegister(usize),
    Stack(usize),
}

impl ArgLocation {
    /// Word index inside a callback argument block
    #[inline]
    pub const fn frame_index(self) -> usize {
        match self {
            Self::FloatRegister(n) => n,
            Self::IntRegister(n) => FLOAT_REGISTER_COUNT + n,
            Self::Stack(n) => FLOAT_REGISTER_COUNT + INT_REGISTER_COUNT + n,
        }
    }
}

/// Register allocation for one call
///
/// Integer and float counters advance independently; once either budget is
/// exhausted its arguments fall through to a single, shared stack counter.
#[derive(Debug, Clone)]
pub struct ArgClassifier {
    convention: CallingConvention,
    int_regs_used: usize,
    fp_regs_used: usize,
    stack_used: usize,
}

impl ArgClassifier {
    #[inline]
    pub const fn new(convention: CallingConvention) -> Self {
        Self {
            convention,
            int_regs_used: 0,
            fp_regs_used: 0,
            stack_used: 0,
        }
    }

    /// Classify the next argument
    #[inline]
    pub fn next(&mut self, class: RegisterClass) -> ArgLocation {
        match class {
            RegisterClass::Float if self.fp_regs_used < self.convention.float_registers() => {
                self.fp_regs_used += 1;
                ArgLocation::FloatRegister(self.fp_regs_used - 1)
            }
            RegisterClass::Integer if self.int_regs_used < self.convention.int_registers() => {
                self.int_regs_used += 1;
                ArgLocation::IntRegister(self.int_regs_used - 1)
            }
            _ => {
                self.stack_used += 1;
                ArgLocation::Stack(self.stack_used - 1)
            }
        }
    }

    /// Stack words consumed so far
    #[inline]
    pub fn stack_words(&self) -> usize {
        self.stack_used
    }
}

impl Default for ArgClassifier {
    fn default() -> Self {
        Self::new(CallingConvention::HOST)
    }
}
