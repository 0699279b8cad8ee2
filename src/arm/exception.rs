//! Exception handler installation and dispatch.
//!
//! `ArmException` owns the vector table for the lifetime of the kernel.  It is
//! created once during bring-up and handed by reference to every subsystem
//! that installs handlers, interrupt controllers included (see
//! `irq::InterruptController`).

use log::{debug, error, info, trace, warn};
use spin::Mutex;

use crate::arm::exc::{ExceptionVector, Handler, VectorEntry};
use crate::arm::table::VectorTable;
use crate::error::{Error, Result};

type Registration = Mutex<Option<Handler>>;

const UNREGISTERED: Registration = Mutex::new(None);

/// Manager for the exception vector table.
///
/// Every vector has at most one handler.  Installing a handler for a vector
/// that already has one replaces it, silently as far as the caller is
/// concerned; callers that need exclusive ownership of a vector must track
/// that themselves.
///
/// # Concurrency
///
/// The processor reads the table asynchronously, so `install` can race with
/// the exception it is installing for.  This type does not mask interrupts.
/// Either install everything before interrupts are first enabled, or mask the
/// affected exception class around the call (`arm::with_interrupts_masked`).
/// Only one core is assumed to write the table.
///
/// Each vector's registration is locked separately, and `dispatch` never
/// waits for a lock.  An exception that arrives while its own vector's
/// registration is being replaced goes to the trap.
pub struct ArmException {
    table: VectorTable,
    installed: [Registration; ExceptionVector::COUNT],
    trap: Registration,
}

impl ArmException {
    /// Takes ownership of the vector table at `base`.  The table is left as
    /// it is; see `populate`.
    ///
    /// # Safety
    ///
    /// As for `VectorTable::new`.  Bring-up should have validated `base` with
    /// `table::check_base` (or `VectorBase::checked`) and mapped it.
    pub unsafe fn new(base: usize) -> ArmException {
        ArmException {
            table: VectorTable::new(base),
            installed: [UNREGISTERED; ExceptionVector::COUNT],
            trap: UNREGISTERED,
        }
    }

    /// Base address of the table, for programming `VBAR` or checking it
    /// against `SCTLR.V`.
    pub fn base(&self) -> usize {
        self.table.base()
    }

    pub fn table(&self) -> &VectorTable {
        &self.table
    }

    /// Fills every slot, so the processor never fetches garbage.  Vectors
    /// that already have a handler keep it; every other vector jumps to
    /// `trap`, which also becomes the dispatch fallback for them.
    ///
    /// This is separate from `new` because some platforms can only write the
    /// table once its memory protection is in place.
    pub fn populate(&self, trap: Handler) {
        *self.trap.lock() = Some(trap);
        for &vector in ExceptionVector::ALL.iter() {
            let installed = self.installed[vector.index()].lock();
            let handler = installed.unwrap_or(trap);
            self.table.write(vector, handler.target());
        }
        info!("exception vectors populated at {:#x}", self.base());
    }

    /// Installs `handler` for `vector`, replacing any previous one.
    pub fn install(&self, vector: ExceptionVector, handler: Handler) -> Result<()> {
        let mut installed = self.installed[vector.index()].lock();
        let previous = installed.replace(handler);
        self.table.write(vector, handler.target());
        drop(installed);

        match previous {
            Some(old) => debug!("{}: replaced {:?} with {:?}", vector, old, handler),
            None => debug!("{}: installed {:?}", vector, handler),
        }
        Ok(())
    }

    /// `install` for a raw vector number.  Numbers outside the table are
    /// rejected without writing anything.
    pub fn install_raw(&self, index: u32, handler: Handler) -> Result<()> {
        let vector = ExceptionVector::try_from(index)?;
        self.install(vector, handler)
    }

    /// The handler installed for `vector`, if any.  The trap handler given to
    /// `populate` is not reported here.
    pub fn handler(&self, vector: ExceptionVector) -> Option<Handler> {
        *self.installed[vector.index()].lock()
    }

    /// The address the processor would jump to on taking `vector`, or `None`
    /// if that slot does not currently hold a valid jump.
    pub fn resolve(&self, vector: ExceptionVector) -> Option<u32> {
        self.table.resolve(vector)
    }

    /// True once every slot holds a valid jump, which must be the case
    /// before exceptions are allowed to happen.
    pub fn is_populated(&self) -> bool {
        self.table.is_complete()
    }

    /// Calls the handler for `vector`.  This is the entry point for the
    /// trampoline, after it has saved the interrupted context.
    ///
    /// The registration is copied out before the call, so a handler is free
    /// to install handlers (including its own replacement).
    pub fn dispatch(&self, vector: ExceptionVector) -> Result<()> {
        let installed = match self.installed[vector.index()].try_lock() {
            Some(installed) => *installed,
            None => {
                warn!("{}: taken while its handler was being replaced", vector);
                None
            }
        };
        let handler = installed.or_else(|| self.trap.try_lock().and_then(|trap| *trap));

        match handler {
            Some(handler) => {
                trace!("{}: dispatching to {:?}", vector, handler);
                handler.call(vector);
                Ok(())
            }
            None => {
                warn!("{}: no handler", vector);
                Err(Error::NoHandler(vector))
            }
        }
    }

    /// `dispatch` for a raw vector number, as passed in a register by the
    /// trampoline.
    pub fn dispatch_raw(&self, index: u32) -> Result<()> {
        self.dispatch(ExceptionVector::try_from(index)?)
    }
}

/// Trap-to-fault handler for vectors nobody claimed.  Reports the exception
/// and stops the core.
pub extern "C" fn unhandled_exception(vector: ExceptionVector, _context: usize) {
    error!("unhandled exception: {}", vector);
    loop {
        core::hint::spin_loop();
    }
}

// What an unclaimed slot jumps to.  Touches nothing but the CPSR.
#[cfg(target_arch = "arm")]
core::arch::global_asm!(
    ".pushsection .text.armexc_unhandled_vector, \"ax\", %progbits",
    ".global armexc_unhandled_vector",
    ".type armexc_unhandled_vector, %function",
    ".balign 4",
    "armexc_unhandled_vector:",
    "    cpsid if",
    "1:  b 1b",
    ".size armexc_unhandled_vector, . - armexc_unhandled_vector",
    ".popsection",
);

#[cfg(target_arch = "arm")]
extern "C" {
    fn armexc_unhandled_vector();
}

#[cfg(not(target_arch = "arm"))]
unsafe extern "C" fn armexc_unhandled_vector() {
    loop {
        core::hint::spin_loop();
    }
}

/// Masks IRQ and FIQ and parks the core.  Safe to jump to from a vector.
pub const UNHANDLED_VECTOR: VectorEntry = armexc_unhandled_vector;

/// The default trap for `ArmException::populate`.  Unclaimed slots jump to
/// `UNHANDLED_VECTOR`; `dispatch` falls back to `unhandled_exception`.
pub const UNHANDLED: Handler = unsafe {
    Handler::bare(unhandled_exception).with_vector_entry(UNHANDLED_VECTOR)
};
