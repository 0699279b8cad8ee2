//! Interrupt support for the BCM2835.
//!
//! The BCM2835's ARM interrupt controller predates the GIC and works like a
//! classic PIC: plain pending bitmaps, write-one enable and disable
//! registers, and a single selectable FIQ source.  It has no notion of an
//! active state.
//!
//! Lines are numbered the way the FIQ source field numbers them:
//!
//! - 0..=63: GPU peripheral interrupts, from pending registers 1 and 2;
//! - 64..=71: ARM-side interrupts, from bits 0..=7 of basic pending.

use bitflags::bitflags;
use log::debug;

use crate::arm;
use crate::arm::exception::ArmException;
use crate::arm::reg::Reg;
use crate::error::{Error, Result};
use crate::irq::{InterruptController, LineState};

/// Address of the controller's register block.
pub const IRQ_ADDRESS: usize = super::PERIPHERAL_BASE + 0xb200;

/// Number of lines, GPU and ARM together.
pub const LINES: u32 = 72;

const GPU_LINES: u32 = 64;

#[repr(C)]
struct Registers {
    basic_pending: Reg<u32>,
    pending: [Reg<u32>; 2],
    fiq_control: Reg<u32>,
    enable: [Reg<u32>; 2],
    enable_basic: Reg<u32>,
    disable: [Reg<u32>; 2],
    disable_basic: Reg<u32>,
}

const _: () = assert!(size_of::<Registers>() == 0x28);

bitflags! {
    /// Contents of the basic pending register.
    pub struct BasicPending: u32 {
        const ARM_TIMER          = 1 << 0;
        const ARM_MAILBOX        = 1 << 1;
        const ARM_DOORBELL_0     = 1 << 2;
        const ARM_DOORBELL_1     = 1 << 3;
        const GPU_0_HALTED       = 1 << 4;
        const GPU_1_HALTED       = 1 << 5;
        const ILLEGAL_ACCESS_1   = 1 << 6;
        const ILLEGAL_ACCESS_0   = 1 << 7;
        /// Something in pending register 1 is set.
        const PENDING_1          = 1 << 8;
        /// Something in pending register 2 is set.
        const PENDING_2          = 1 << 9;
    }
}

/// `fiq_control` bit that routes the selected source to FIQ.
const FIQ_ENABLE: u32 = 1 << 7;
/// `fiq_control` bits 6:0 select the source.
const FIQ_SOURCE: u32 = 0x7f;

/// Driver for the BCM2835 ARM interrupt controller.
pub struct Bcm2835Irq<'e> {
    exc: &'e ArmException,
    reg: *const Registers,
}

/// Which register, and which bit in it, services a line.
enum Bank {
    Gpu(usize, u32),
    Basic(u32),
}

fn bank(irq: u32) -> Option<Bank> {
    if irq < GPU_LINES {
        Some(Bank::Gpu((irq / 32) as usize, 1 << (irq % 32)))
    } else if irq < LINES {
        Some(Bank::Basic(1 << (irq - GPU_LINES)))
    } else {
        None
    }
}

impl<'e> Bcm2835Irq<'e> {
    /// Attaches to the controller at `base` (normally `IRQ_ADDRESS`).
    ///
    /// # Safety
    ///
    /// `base` must be the mapped register block of this controller, or
    /// memory laid out like it, for as long as the returned value exists.
    pub unsafe fn new(exc: &'e ArmException, base: usize) -> Bcm2835Irq<'e> {
        debug!("BCM2835 interrupt controller at {:#x}", base);
        Bcm2835Irq { exc, reg: base as *const Registers }
    }

    pub fn basic_pending(&self) -> BasicPending {
        BasicPending::from_bits_truncate(self.reg().basic_pending.get())
    }

    /// Pending state of `irq`.  This controller never reports `ACTIVE`.
    pub fn line_state(&self, irq: u32) -> LineState {
        let reg = self.reg();
        let pending = match bank(irq) {
            Some(Bank::Gpu(n, bit)) => reg.pending[n].get() & bit != 0,
            Some(Bank::Basic(bit)) => reg.basic_pending.get() & bit != 0,
            None => false,
        };
        if pending { LineState::PENDING } else { LineState::empty() }
    }

    pub fn enable(&self, irq: u32) -> Result<()> {
        let reg = self.reg();
        match bank(irq) {
            Some(Bank::Gpu(n, bit)) => reg.enable[n].set(bit),
            Some(Bank::Basic(bit)) => reg.enable_basic.set(bit),
            None => return Err(Error::InvalidIrq(irq)),
        }
        arm::write_barrier();
        Ok(())
    }

    pub fn disable(&self, irq: u32) -> Result<()> {
        let reg = self.reg();
        match bank(irq) {
            Some(Bank::Gpu(n, bit)) => reg.disable[n].set(bit),
            Some(Bank::Basic(bit)) => reg.disable_basic.set(bit),
            None => return Err(Error::InvalidIrq(irq)),
        }
        arm::write_barrier();
        Ok(())
    }

    /// Routes `irq` to FIQ instead of IRQ, or with `None` stops routing
    /// anything to FIQ.  Only one line can be the FIQ source at a time.
    /// Reserved bits of the control register are preserved.
    pub fn route_fiq(&self, irq: Option<u32>) -> Result<()> {
        let value = match irq {
            Some(irq) if irq < LINES => FIQ_ENABLE | irq,
            Some(irq) => return Err(Error::InvalidIrq(irq)),
            None => 0,
        };
        self.reg().fiq_control.update(|c| (c & !(FIQ_ENABLE | FIQ_SOURCE)) | value);
        arm::write_barrier();
        Ok(())
    }

    /// The line currently routed to FIQ, if any.
    pub fn fiq_source(&self) -> Option<u32> {
        let control = self.reg().fiq_control.get();
        if control & FIQ_ENABLE != 0 {
            Some(control & FIQ_SOURCE)
        } else {
            None
        }
    }

    fn reg(&self) -> &Registers {
        unsafe { &*self.reg }
    }
}

impl<'e> InterruptController for Bcm2835Irq<'e> {
    fn exceptions(&self) -> &ArmException {
        self.exc
    }

    fn is_triggered(&self, irq: u32) -> bool {
        self.line_state(irq).is_triggered()
    }

    fn line_count(&self) -> u32 {
        LINES
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm::exc::{ExceptionVector, Handler};
    use crate::arm::table::TestMemory;

    const ZERO: Reg<u32> = Reg::new(0);

    #[test]
    fn register_block_address() {
        assert_eq!(IRQ_ADDRESS, 0x2000_b200);
    }

    #[test]
    fn triggered_reads_the_right_pending_register() {
        let mut mem = TestMemory::new();
        let exc = unsafe { ArmException::new(mem.base()) };
        let regs = [ZERO; 10];
        let ctl = unsafe { Bcm2835Irq::new(&exc, regs.as_ptr() as usize) };

        assert_eq!(ctl.next_triggered(), None);

        // Pending 1, bit 29 (the AUX block on real hardware).
        regs[1].set(1 << 29);
        assert!(ctl.is_triggered(29));
        assert!(!ctl.is_triggered(61));
        assert_eq!(ctl.next_triggered(), Some(29));

        // Pending 2, bit 25 (line 57, the PL011 UART).
        regs[1].set(0);
        regs[2].set(1 << 25);
        assert!(ctl.is_triggered(57));
        assert!(!ctl.is_triggered(25));

        // Basic pending, bit 0: the ARM timer.
        regs[2].set(0);
        regs[0].set(BasicPending::ARM_TIMER.bits());
        assert!(ctl.is_triggered(64));
        assert_eq!(ctl.line_state(64), LineState::PENDING);
        assert_eq!(ctl.basic_pending(), BasicPending::ARM_TIMER);

        regs[0].set(0);
        assert!(!ctl.is_triggered(64));
    }

    #[test]
    fn summary_bits_are_not_lines() {
        let mut mem = TestMemory::new();
        let exc = unsafe { ArmException::new(mem.base()) };
        let regs = [ZERO; 10];
        let ctl = unsafe { Bcm2835Irq::new(&exc, regs.as_ptr() as usize) };

        regs[0].set((BasicPending::PENDING_1 | BasicPending::PENDING_2).bits());
        assert_eq!(ctl.next_triggered(), None);
        assert!(!ctl.is_triggered(72));
        assert!(!ctl.is_triggered(73));
    }

    #[test]
    fn enable_and_disable_pick_the_bank() {
        let mut mem = TestMemory::new();
        let exc = unsafe { ArmException::new(mem.base()) };
        let regs = [ZERO; 10];
        let ctl = unsafe { Bcm2835Irq::new(&exc, regs.as_ptr() as usize) };

        ctl.enable(3).unwrap();
        ctl.enable(40).unwrap();
        ctl.enable(65).unwrap();
        assert_eq!(regs[4].get(), 1 << 3);
        assert_eq!(regs[5].get(), 1 << 8);
        assert_eq!(regs[6].get(), 1 << 1);

        ctl.disable(63).unwrap();
        ctl.disable(71).unwrap();
        assert_eq!(regs[8].get(), 1 << 31);
        assert_eq!(regs[9].get(), 1 << 7);

        assert_eq!(ctl.enable(72), Err(Error::InvalidIrq(72)));
        assert_eq!(ctl.disable(100), Err(Error::InvalidIrq(100)));
    }

    #[test]
    fn fiq_routing() {
        let mut mem = TestMemory::new();
        let exc = unsafe { ArmException::new(mem.base()) };
        let regs = [ZERO; 10];
        let ctl = unsafe { Bcm2835Irq::new(&exc, regs.as_ptr() as usize) };

        assert_eq!(ctl.fiq_source(), None);
        ctl.route_fiq(Some(64)).unwrap();
        assert_eq!(regs[3].get(), 0x80 | 64);
        assert_eq!(ctl.fiq_source(), Some(64));
        assert_eq!(ctl.route_fiq(Some(72)), Err(Error::InvalidIrq(72)));
        assert_eq!(ctl.fiq_source(), Some(64));
        ctl.route_fiq(None).unwrap();
        assert_eq!(ctl.fiq_source(), None);
        assert_eq!(regs[3].get(), 0);
    }

    #[test]
    fn fiq_routing_keeps_reserved_bits() {
        let mut mem = TestMemory::new();
        let exc = unsafe { ArmException::new(mem.base()) };
        let regs = [ZERO; 10];
        let ctl = unsafe { Bcm2835Irq::new(&exc, regs.as_ptr() as usize) };

        regs[3].set(0xa500_0000 | FIQ_ENABLE | 3);
        ctl.route_fiq(Some(57)).unwrap();
        assert_eq!(regs[3].get(), 0xa500_0000 | FIQ_ENABLE | 57);
        assert_eq!(ctl.fiq_source(), Some(57));

        ctl.route_fiq(None).unwrap();
        assert_eq!(regs[3].get(), 0xa500_0000);
        assert_eq!(ctl.fiq_source(), None);
    }

    extern "C" fn fiq_entry(_: ExceptionVector, _: usize) {}

    #[test]
    fn installs_through_the_exception_manager() {
        let mut mem = TestMemory::new();
        let exc = unsafe { ArmException::new(mem.base()) };
        let regs = [ZERO; 10];
        let ctl = unsafe { Bcm2835Irq::new(&exc, regs.as_ptr() as usize) };

        let h = Handler::bare(fiq_entry);
        ctl.install_handler(ExceptionVector::FIQ, h).unwrap();
        assert_eq!(exc.resolve(ExceptionVector::FIQ), Some(h.target()));
        assert_eq!(exc.handler(ExceptionVector::IRQ).map(|h| h.target()), None);
    }
}
