//! Trampoline table
//!
//! `MAX_CALLBACKS` fixed entry points assembled into the text section. Each
//! entry only records where it was entered and jumps to a shared dispatcher,
//! which spills the argument registers next to the caller's stack arguments
//! and calls [`trampoline_entry`] with the marker and the block address.
//!
//! x86-64 entries are a 5-byte `call` into the dispatcher; the pushed return
//! address is the marker. AArch64 entries are `adr x9, .` followed by `b`,
//! 8 bytes each; x9 is the marker.

use super::backend::TrampolineBackend;
use super::compiler::EntryTable;
use super::invoker::ArgBlock;
use crate::interop::TRAMPOLINE_ENTRY_STRIDE;
use crate::logging::{log_dispatch_failed, log_invariant_violation};
use core::arch::global_asm;
use std::panic::{catch_unwind, AssertUnwindSafe};

macro_rules! max_callbacks {
    () => {
        2000
    };
}

/// Entries in the assembled trampoline table
pub const MAX_CALLBACKS: usize = max_callbacks!();

#[cfg(target_vendor = "apple")]
macro_rules! asm_symbol {
    ($name:literal) => {
        concat!("_", $name)
    };
}

#[cfg(not(target_vendor = "apple"))]
macro_rules! asm_symbol {
    ($name:literal) => {
        $name
    };
}

#[cfg(target_vendor = "apple")]
macro_rules! asm_hidden {
    ($name:literal) => {
        concat!(".private_extern ", asm_symbol!($name))
    };
}

#[cfg(not(target_vendor = "apple"))]
macro_rules! asm_hidden {
    ($name:literal) => {
        concat!(".hidden ", asm_symbol!($name))
    };
}

// Argument block, low to high: xmm0-xmm7, rdi, rsi, rdx, rcx, r8, r9, then
// the caller's stack arguments. r9 overwrites the caller's return address
// slot, which is kept in r10 and put back before returning.
#[cfg(target_arch = "x86_64")]
global_asm!(
    concat!(
        ".text\n",
        ".p2align 4\n",
        ".globl ", asm_symbol!("nativecall_trampoline_table"), "\n",
        asm_hidden!("nativecall_trampoline_table"), "\n",
        asm_symbol!("nativecall_trampoline_table"), ":\n",
        ".rept ", max_callbacks!(), "\n",
        "    call ", asm_symbol!("nativecall_trampoline_dispatch"), "\n",
        ".endr\n",
        "\n",
        asm_symbol!("nativecall_trampoline_dispatch"), ":\n",
        "    mov rax, [rsp]\n",
        "    mov r10, [rsp + 8]\n",
        "    add rsp, 8\n",
        "    sub rsp, 104\n",
        "    movsd qword ptr [rsp], xmm0\n",
        "    movsd qword ptr [rsp + 8], xmm1\n",
        "    movsd qword ptr [rsp + 16], xmm2\n",
        "    movsd qword ptr [rsp + 24], xmm3\n",
        "    movsd qword ptr [rsp + 32], xmm4\n",
        "    movsd qword ptr [rsp + 40], xmm5\n",
        "    movsd qword ptr [rsp + 48], xmm6\n",
        "    movsd qword ptr [rsp + 56], xmm7\n",
        "    mov [rsp + 64], rdi\n",
        "    mov [rsp + 72], rsi\n",
        "    mov [rsp + 80], rdx\n",
        "    mov [rsp + 88], rcx\n",
        "    mov [rsp + 96], r8\n",
        "    mov [rsp + 104], r9\n",
        "    mov rdi, rax\n",
        "    mov rsi, rsp\n",
        "    push r10\n",
        "    sub rsp, 8\n",
        "    call {entry}\n",
        "    add rsp, 8\n",
        "    pop r10\n",
        "    add rsp, 104\n",
        "    mov [rsp], r10\n",
        "    ret\n",
    ),
    entry = sym trampoline_entry,
);

// Argument block, low to high: d0-d7, x0-x7, then the caller's stack
// arguments, which start right where the block ends.
#[cfg(target_arch = "aarch64")]
global_asm!(
    concat!(
        ".text\n",
        ".p2align 3\n",
        ".globl ", asm_symbol!("nativecall_trampoline_table"), "\n",
        asm_hidden!("nativecall_trampoline_table"), "\n",
        asm_symbol!("nativecall_trampoline_table"), ":\n",
        ".rept ", max_callbacks!(), "\n",
        "    adr x9, .\n",
        "    b ", asm_symbol!("nativecall_trampoline_dispatch"), "\n",
        ".endr\n",
        "\n",
        asm_symbol!("nativecall_trampoline_dispatch"), ":\n",
        "    sub sp, sp, #128\n",
        "    stp d0, d1, [sp]\n",
        "    stp d2, d3, [sp, #16]\n",
        "    stp d4, d5, [sp, #32]\n",
        "    stp d6, d7, [sp, #48]\n",
        "    stp x0, x1, [sp, #64]\n",
        "    stp x2, x3, [sp, #80]\n",
        "    stp x4, x5, [sp, #96]\n",
        "    stp x6, x7, [sp, #112]\n",
        "    stp x29, x30, [sp, #-16]!\n",
        "    mov x29, sp\n",
        "    mov x0, x9\n",
        "    add x1, sp, #16\n",
        "    bl {entry}\n",
        "    ldp x29, x30, [sp], #16\n",
        "    add sp, sp, #128\n",
        "    ret\n",
    ),
    entry = sym trampoline_entry,
);

extern "C" {
    fn nativecall_trampoline_table();
}

/// Geometry of the assembled table
pub fn native_table() -> EntryTable {
    EntryTable::new(nativecall_trampoline_table as usize, TRAMPOLINE_ENTRY_STRIDE)
}

/// Slot index for the marker a trampoline entry left behind
#[inline]
fn slot_of(marker: usize, table: &EntryTable) -> usize {
    let offset = marker.wrapping_sub(table.base()) / table.stride();
    // The x86-64 marker is the return address, one entry past the one taken.
    if cfg!(target_arch = "x86_64") {
        offset.wrapping_sub(1)
    } else {
        offset
    }
}

/// Rust side of the dispatcher
///
/// Panics never cross back into native frames: an unbound slot or a panic
/// raised by the callback is logged and the process aborts.
extern "C" fn trampoline_entry(marker: usize, block: *const usize) -> usize {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let backend = TrampolineBackend::native();
        let slot = slot_of(marker, backend.table());
        // Safety: `block` is the argument block the dispatcher just spilled
        let block = unsafe { ArgBlock::from_raw(block) };
        backend.dispatch(slot, &block)
    }));

    match outcome {
        Ok(Ok(result)) => result.unwrap_or(0),
        Ok(Err(err)) => {
            log_dispatch_failed(&err);
            std::process::abort();
        }
        Err(_) => {
            log_invariant_violation("panic escaped a native callback", "");
            std::process::abort();
        }
    }
}
