//! Exception vector management and interrupt controller support for classic
//! (AArch32) ARM kernels.
//!
//! The pieces, leaves first:
//!
//! - `arm::table`: the 64-byte hardware vector table and its slot encoding.
//! - `arm::exception`: `ArmException`, which installs handlers into that
//!   table and dispatches to them from the trampoline.
//! - `irq`: the `InterruptController` trait, through which IRQ and FIQ
//!   handlers find out which line fired.
//! - `arm::gic`, `bcm2835::irq`: two controllers implementing it.
//!
//! A typical bring-up:
//!
//! ```no_run
//! use armexc::arm::exception::{ArmException, UNHANDLED};
//! use armexc::arm::table::VectorBase;
//!
//! let base = VectorBase::default().checked().unwrap();
//! let exc = unsafe { ArmException::new(base) };
//! exc.populate(UNHANDLED);
//! ```

#![cfg_attr(not(test), no_std)]

#![deny(
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results,
    )]

pub mod arm;
pub mod bcm2835;
pub mod error;
pub mod irq;

pub use crate::arm::exc::{ExceptionVector, Handler, HandlerFn, VectorEntry};
pub use crate::arm::exception::ArmException;
pub use crate::error::{Error, Result};
pub use crate::irq::{InterruptController, LineState};
