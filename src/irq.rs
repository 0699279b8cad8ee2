//! The interface every interrupt controller presents to the kernel.
//!
//! IRQ and FIQ are each a single exception vector shared by every interrupt
//! line the SoC has.  Whoever handles one of those vectors has to ask the
//! interrupt controller which line fired.  This module defines how to ask.

use bitflags::bitflags;

use crate::arm::exc::{ExceptionVector, Handler};
use crate::arm::exception::ArmException;
use crate::error::Result;

bitflags! {
    /// Hardware state of one interrupt line, as far as a controller can
    /// report it.
    pub struct LineState: u8 {
        /// Asserted and waiting to be taken.
        const PENDING = 1 << 0;
        /// Taken and not yet completed.
        const ACTIVE  = 1 << 1;
    }
}

impl LineState {
    /// A line counts as triggered while it is pending or active.
    pub fn is_triggered(self) -> bool {
        self.intersects(LineState::PENDING | LineState::ACTIVE)
    }
}

/// An interrupt controller.
///
/// Controllers don't manage the vector table themselves.  Each one holds a
/// reference to the kernel's single `ArmException` and gets `install_handler`
/// from it; what a controller must provide is the hardware query,
/// `is_triggered`.
pub trait InterruptController {
    /// The exception manager this controller installs its handlers through.
    fn exceptions(&self) -> &ArmException;

    /// Installs `handler` for `vector`.  Same policy as
    /// `ArmException::install`: last install wins, and the caller masks.
    fn install_handler(&self, vector: ExceptionVector, handler: Handler) -> Result<()> {
        self.exceptions().install(vector, handler)
    }

    /// Whether line `irq` is pending or active right now.
    ///
    /// Implementations read the hardware on every call and never cache.  They
    /// must not block, allocate, or fault, since this is called from inside
    /// IRQ and FIQ handlers with interrupts masked.  Lines the controller
    /// doesn't implement are reported as not triggered.
    fn is_triggered(&self, irq: u32) -> bool;

    /// Number of lines this controller implements.  Lines are numbered from
    /// zero.
    fn line_count(&self) -> u32;

    /// The lowest-numbered triggered line, if any.  Shared IRQ/FIQ handlers
    /// use this to find their source.
    fn next_triggered(&self) -> Option<u32> {
        (0..self.line_count()).find(|&irq| self.is_triggered(irq))
    }
}
