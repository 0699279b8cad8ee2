//! Support for the distributor of the ARM Generic Interrupt Controller,
//! version 2.
//!
//! Only the distributor is modeled, and only as much of it as answering "which
//! line fired" and masking individual lines requires.  Priorities, targets,
//! groups and the CPU interface belong to a full driver.

use core::cmp;
use core::sync::atomic::{self, Ordering};

use log::debug;

use crate::arm;
use crate::arm::exception::ArmException;
use crate::arm::reg::Reg;
use crate::error::{Error, Result};
use crate::irq::{InterruptController, LineState};

/// Interrupt IDs 1020 and up are special (spurious and reserved), whatever
/// `TYPER` claims.
pub const MAX_LINES: u32 = 1020;

#[repr(C)]
#[allow(dead_code)]
struct Registers {
    ctlr: Reg<u32>,
    /// Bits 4:0 (`ITLinesNumber`) give the number of implemented lines as
    /// `32 * (N + 1)`.
    typer: Reg<u32>,
    iidr: Reg<u32>,
    _reserved_after_iidr: [Reg<u32>; 29],

    igroupr: [Reg<u32>; 32],

    /// The Set-Enable Registers have one bit per line.  Writing ones enables
    /// the corresponding lines; others remain unchanged.
    isenabler: [Reg<u32>; 32],

    /// The Clear-Enable Registers have one bit per line.  Writing ones
    /// disables the corresponding lines; others remain unchanged.
    icenabler: [Reg<u32>; 32],

    /// The Set-Pending Registers read as one for each pending line.
    ispendr: [Reg<u32>; 32],
    icpendr: [Reg<u32>; 32],

    /// The Set-Active Registers read as one for each active line.
    isactiver: [Reg<u32>; 32],
    icactiver: [Reg<u32>; 32],
}

const _: () = assert!(size_of::<Registers>() == 0x400);

/// Triggered-state and masking for lines behind a GICv2 distributor.
pub struct Gic<'e> {
    exc: &'e ArmException,
    reg: *const Registers,
    lines: u32,
}

impl<'e> Gic<'e> {
    /// Attaches to the distributor at `dist_base`, reading how many lines it
    /// implements.  Handlers go through `exc`.
    ///
    /// # Safety
    ///
    /// `dist_base` must be the mapped base of a GICv2 distributor (or
    /// something laid out like one) that outlives the returned value.
    pub unsafe fn new(exc: &'e ArmException, dist_base: usize) -> Gic<'e> {
        let reg = dist_base as *const Registers;
        let it_lines = (*reg).typer.get() & 0x1f;
        let lines = cmp::min(32 * (it_lines + 1), MAX_LINES);
        debug!("GIC distributor at {:#x}: {} lines", dist_base, lines);
        Gic { exc, reg, lines }
    }

    /// Reads the pending and active bits for `irq`.  Lines the distributor
    /// doesn't implement read as empty.
    pub fn line_state(&self, irq: u32) -> LineState {
        let mut state = LineState::empty();
        if let Some((bank, bit)) = self.locate(irq) {
            let reg = self.reg();
            atomic::fence(Ordering::Acquire);
            state.set(LineState::PENDING, reg.ispendr[bank].get() & bit != 0);
            state.set(LineState::ACTIVE, reg.isactiver[bank].get() & bit != 0);
        }
        state
    }

    /// Lets `irq` be signaled to the CPU interface.
    pub fn enable(&self, irq: u32) -> Result<()> {
        let (bank, bit) = self.locate(irq).ok_or(Error::InvalidIrq(irq))?;
        self.reg().isenabler[bank].set(bit);
        arm::write_barrier();
        Ok(())
    }

    /// Stops `irq` from being signaled.  A handler for it that is already
    /// running is unaffected.
    pub fn disable(&self, irq: u32) -> Result<()> {
        let (bank, bit) = self.locate(irq).ok_or(Error::InvalidIrq(irq))?;
        self.reg().icenabler[bank].set(bit);
        arm::write_barrier();
        Ok(())
    }

    pub fn is_enabled(&self, irq: u32) -> bool {
        match self.locate(irq) {
            Some((bank, bit)) => self.reg().isenabler[bank].get() & bit != 0,
            None => false,
        }
    }

    fn locate(&self, irq: u32) -> Option<(usize, u32)> {
        if irq < self.lines {
            Some(((irq / 32) as usize, 1 << (irq % 32)))
        } else {
            None
        }
    }

    fn reg(&self) -> &Registers {
        unsafe { &*self.reg }
    }
}

impl<'e> InterruptController for Gic<'e> {
    fn exceptions(&self) -> &ArmException {
        self.exc
    }

    fn is_triggered(&self, irq: u32) -> bool {
        self.line_state(irq).is_triggered()
    }

    fn line_count(&self) -> u32 {
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm::exc::{ExceptionVector, Handler};
    use crate::arm::table::TestMemory;

    const ZERO: Reg<u32> = Reg::new(0);

    /// RAM stand-in for the distributor, with `TYPER` saying 64 lines.
    fn distributor() -> [Reg<u32>; 0x100] {
        let regs = [ZERO; 0x100];
        regs[1].set(1);
        regs
    }

    fn base(regs: &[Reg<u32>; 0x100]) -> usize {
        regs.as_ptr() as usize
    }

    #[test]
    fn line_count_comes_from_typer() {
        let mut mem = TestMemory::new();
        let exc = unsafe { ArmException::new(mem.base()) };
        let regs = distributor();
        let gic = unsafe { Gic::new(&exc, base(&regs)) };
        assert_eq!(gic.line_count(), 64);

        regs[1].set(0x1f);
        let gic = unsafe { Gic::new(&exc, base(&regs)) };
        assert_eq!(gic.line_count(), MAX_LINES);
    }

    #[test]
    fn triggered_follows_pending_and_active() {
        let mut mem = TestMemory::new();
        let exc = unsafe { ArmException::new(mem.base()) };
        let regs = distributor();
        let gic = unsafe { Gic::new(&exc, base(&regs)) };

        assert!(!gic.is_triggered(34));

        gic.reg().ispendr[1].set(1 << 2);
        assert_eq!(gic.line_state(34), LineState::PENDING);
        assert!(gic.is_triggered(34));
        assert!(!gic.is_triggered(2));

        gic.reg().ispendr[1].set(0);
        gic.reg().isactiver[1].set(1 << 2);
        assert_eq!(gic.line_state(34), LineState::ACTIVE);
        assert!(gic.is_triggered(34));

        gic.reg().isactiver[1].set(0);
        assert!(!gic.is_triggered(34));
        assert_eq!(gic.next_triggered(), None);
    }

    #[test]
    fn unimplemented_lines_are_never_triggered() {
        let mut mem = TestMemory::new();
        let exc = unsafe { ArmException::new(mem.base()) };
        let regs = distributor();
        let gic = unsafe { Gic::new(&exc, base(&regs)) };

        // Bank 2 exists in the register map but TYPER says it isn't wired.
        gic.reg().ispendr[2].set(!0);
        assert!(!gic.is_triggered(64));
        assert!(!gic.is_triggered(MAX_LINES));
        assert!(!gic.is_triggered(u32::MAX));
        assert_eq!(gic.enable(64), Err(Error::InvalidIrq(64)));
        assert_eq!(gic.disable(u32::MAX), Err(Error::InvalidIrq(u32::MAX)));
    }

    #[test]
    fn enable_and_disable_write_one_bit() {
        let mut mem = TestMemory::new();
        let exc = unsafe { ArmException::new(mem.base()) };
        let regs = distributor();
        let gic = unsafe { Gic::new(&exc, base(&regs)) };

        gic.enable(33).unwrap();
        assert_eq!(gic.reg().isenabler[1].get(), 1 << 1);
        assert!(gic.is_enabled(33));

        gic.disable(40).unwrap();
        assert_eq!(gic.reg().icenabler[1].get(), 1 << 8);
        assert_eq!(gic.reg().isenabler[0].get(), 0);
    }

    extern "C" fn irq_entry(_: ExceptionVector, _: usize) {}

    #[test]
    fn installs_through_the_exception_manager() {
        let mut mem = TestMemory::new();
        let exc = unsafe { ArmException::new(mem.base()) };
        let regs = distributor();
        let gic = unsafe { Gic::new(&exc, base(&regs)) };

        let h = Handler::bare(irq_entry);
        gic.install_handler(ExceptionVector::IRQ, h).unwrap();
        assert_eq!(exc.resolve(ExceptionVector::IRQ), Some(h.target()));
    }
}
