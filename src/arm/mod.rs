//! Support for the classic (A- and R-profile, AArch32) ARM exception model.

pub mod exc;
pub mod exception;
pub mod gic;
pub mod reg;
pub mod table;

use core::sync::atomic::{self, Ordering};

/// CPSR bit that masks IRQ when set.
pub const CPSR_I: u32 = 1 << 7;
/// CPSR bit that masks FIQ when set.
pub const CPSR_F: u32 = 1 << 6;

/// Makes vector table writes visible to instruction fetch.
///
/// The table is data when we write it and code when the processor takes an
/// exception, so a plain store is not enough: it has to drain out of the
/// write buffer, stale copies have to leave the instruction cache, and
/// anything already in the pipeline has to be refetched.
#[inline]
pub fn sync_table() {
    // Data fence to ensure the write is not buffered (emits DMB).
    atomic::fence(Ordering::SeqCst);

    #[cfg(all(target_arch = "arm", target_feature = "v7"))]
    unsafe {
        core::arch::asm!(
            "dsb",
            "mcr p15, 0, {zero}, c7, c5, 0", // ICIALLU
            "dsb",
            "isb",
            zero = in(reg) 0u32,
            options(nostack, preserves_flags),
        );
    }

    // ARMv6 has no barrier instructions, only their CP15 operations.
    #[cfg(all(target_arch = "arm", not(target_feature = "v7")))]
    unsafe {
        core::arch::asm!(
            "mcr p15, 0, {zero}, c7, c10, 4", // DSB
            "mcr p15, 0, {zero}, c7, c5, 0",  // ICIALLU
            "mcr p15, 0, {zero}, c7, c10, 4", // DSB
            "mcr p15, 0, {zero}, c7, c5, 4",  // ISB (prefetch flush)
            zero = in(reg) 0u32,
            options(nostack, preserves_flags),
        );
    }
}

/// Orders a write to a controller register before anything that follows.
#[inline]
pub(crate) fn write_barrier() {
    // Data fence to ensure the write is not buffered (emits DMB).
    atomic::fence(Ordering::Release);
}

/// Runs `f` with IRQ and FIQ masked, restoring the previous mask afterwards.
///
/// Handler installation does not mask anything by itself.  A caller that
/// replaces a live vector must mask that exception class around the
/// replacement, and this is the usual way to do it.
///
/// Off-target (unit tests on the build host) there is nothing to mask and `f`
/// simply runs.
#[inline]
pub fn with_interrupts_masked<R, F: FnOnce() -> R>(f: F) -> R {
    let saved = mask_interrupts();
    let result = f();
    restore_interrupts(saved);
    result
}

#[cfg(target_arch = "arm")]
#[inline]
fn mask_interrupts() -> u32 {
    let cpsr: u32;
    unsafe {
        core::arch::asm!(
            "mrs {0}, cpsr",
            "cpsid if",
            out(reg) cpsr,
            options(nostack, preserves_flags),
        );
    }
    cpsr
}

#[cfg(target_arch = "arm")]
#[inline]
fn restore_interrupts(cpsr: u32) {
    let masked = cpsr & (CPSR_I | CPSR_F);
    unsafe {
        if masked & CPSR_I == 0 {
            core::arch::asm!("cpsie i", options(nostack, preserves_flags));
        }
        if masked & CPSR_F == 0 {
            core::arch::asm!("cpsie f", options(nostack, preserves_flags));
        }
    }
}

#[cfg(not(target_arch = "arm"))]
#[inline]
fn mask_interrupts() -> u32 {
    atomic::compiler_fence(Ordering::SeqCst);
    CPSR_I | CPSR_F
}

#[cfg(not(target_arch = "arm"))]
#[inline]
fn restore_interrupts(_cpsr: u32) {
    atomic::compiler_fence(Ordering::SeqCst);
}
