//! The eight classic ARM exceptions and the handlers that service them.

use core::fmt;

use crate::error::{Error, Result};

/// Identifies one architecturally defined exception.
///
/// The discriminants are the slot indices in the vector table, which the
/// processor hardwires.  Do not reorder.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u32)]
pub enum ExceptionVector {
    /// Taken at power-on and on a warm reset.
    Reset = 0,
    /// An instruction neither the core nor a coprocessor recognized.
    UndefinedInstruction = 1,
    /// `SVC` (formerly `SWI`).
    SoftwareInterrupt = 2,
    /// Instruction fetch from an address the MMU or MPU refused.
    PrefetchAbort = 3,
    /// Data access to an address the MMU or MPU refused.
    DataAbort = 4,
    /// Unused on every core since ARMv2 took away 26-bit addressing.  It still
    /// occupies a slot.
    Reserved = 5,
    IRQ = 6,
    FIQ = 7,
}

impl ExceptionVector {
    /// Number of vectors, and thus slots in the table.
    pub const COUNT: usize = 8;

    /// Every vector, in table order.
    pub const ALL: [ExceptionVector; ExceptionVector::COUNT] = [
        ExceptionVector::Reset,
        ExceptionVector::UndefinedInstruction,
        ExceptionVector::SoftwareInterrupt,
        ExceptionVector::PrefetchAbort,
        ExceptionVector::DataAbort,
        ExceptionVector::Reserved,
        ExceptionVector::IRQ,
        ExceptionVector::FIQ,
    ];

    /// Slot index within the table.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Byte offset of this vector's slot from the table base.
    #[inline]
    pub fn offset(self) -> usize {
        self.index() * crate::arm::table::SLOT_SIZE
    }

    /// True for the two asynchronous classes, which are shared between many
    /// physical lines and need an interrupt controller to disambiguate.
    pub fn is_interrupt(self) -> bool {
        match self {
            ExceptionVector::IRQ | ExceptionVector::FIQ => true,
            _ => false,
        }
    }
}

/// Converts a raw identifier, as handed over by assembly or a foreign caller.
impl TryFrom<u32> for ExceptionVector {
    type Error = Error;

    fn try_from(index: u32) -> Result<Self> {
        ExceptionVector::ALL.get(index as usize)
            .cloned()
            .ok_or(Error::InvalidVector(index))
    }
}

impl fmt::Display for ExceptionVector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Exception handlers are functions conforming to the C ABI, so that the
/// trampoline can reach them with an ordinary call after it has saved the
/// interrupted context.  They receive the vector they were installed for and
/// the context word given at installation.
pub type HandlerFn = extern "C" fn(vector: ExceptionVector, context: usize);

/// Code the processor may jump to straight from a vector table slot: it runs
/// in the exception's mode, with the interrupted program's registers, and
/// must save whatever it uses.  Trampolines and fault stubs are written this
/// way; ordinary Rust functions are not.
pub type VectorEntry = unsafe extern "C" fn();

/// One handler registration: an entry point plus an arbitrary context word
/// (often a pointer to the driver state the handler services).
///
/// `dispatch` calls `entry`.  The vector table slot holds the vector entry
/// if one was given, and `entry` itself otherwise.
#[derive(Copy, Clone)]
pub struct Handler {
    pub entry: HandlerFn,
    pub context: usize,
    vector_entry: Option<VectorEntry>,
}

impl Handler {
    pub const fn new(entry: HandlerFn, context: usize) -> Handler {
        Handler { entry, context, vector_entry: None }
    }

    /// A handler that needs no context.
    pub const fn bare(entry: HandlerFn) -> Handler {
        Handler::new(entry, 0)
    }

    /// Makes the vector table slot jump to `vector_entry` instead of `entry`.
    ///
    /// # Safety
    ///
    /// `vector_entry` must be safe to enter directly on taking the exception
    /// (see `VectorEntry`).
    pub const unsafe fn with_vector_entry(self, vector_entry: VectorEntry) -> Handler {
        Handler { vector_entry: Some(vector_entry), ..self }
    }

    pub fn vector_entry(&self) -> Option<VectorEntry> {
        self.vector_entry
    }

    /// The word written into a vector table slot for this handler.
    ///
    /// On the 32-bit cores this crate targets this is the whole entry
    /// address.  Elsewhere it is the low word, which is still unique among the
    /// functions of one image.
    #[inline]
    pub fn target(&self) -> u32 {
        match self.vector_entry {
            Some(vector_entry) => vector_entry as usize as u32,
            None => self.entry as usize as u32,
        }
    }

    #[inline]
    pub(crate) fn call(&self, vector: ExceptionVector) {
        (self.entry)(vector, self.context)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Handler {{ entry: {:#010x}, context: {:#x}, target: {:#010x} }}",
               self.entry as usize, self.context, self.target())
    }
}
