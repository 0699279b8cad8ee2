//! Error type shared by the vector table and the interrupt controllers.

use core::fmt;

use crate::arm::exc::ExceptionVector;

/// Everything that can go wrong in this crate.  None of these are transient.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// A raw exception identifier did not name one of the eight vectors.
    /// Nothing was written.
    InvalidVector(u32),
    /// A vector table base address that the processor cannot use.  This is a
    /// bring-up configuration error and is not recoverable in-band.
    MisalignedBase(usize),
    /// An exception was dispatched with neither a registered handler nor a
    /// fallback trap for its vector.
    NoHandler(ExceptionVector),
    /// An interrupt line number the controller does not implement.
    InvalidIrq(u32),
}

pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::InvalidVector(index) =>
                write!(f, "exception vector {} out of range", index),
            Error::MisalignedBase(base) =>
                write!(f, "vector table base {:#x} is not {}-byte aligned",
                       base, crate::arm::table::VECTOR_TABLE_ALIGN),
            Error::NoHandler(vector) =>
                write!(f, "no handler for {:?}", vector),
            Error::InvalidIrq(irq) =>
                write!(f, "interrupt line {} not implemented", irq),
        }
    }
}
