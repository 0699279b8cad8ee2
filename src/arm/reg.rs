//! Volatile memory cells for memory-mapped state.
//!
//! Both the exception vector table and the interrupt controllers' register
//! blocks are memory that something other than the program reads and writes:
//! the processor fetches the table on exception entry, and controllers change
//! their pending bits whenever a line changes level.  All access goes through
//! `Reg` so that no load or store is elided or merged.

use core::cell::UnsafeCell;
use core::ptr;

/// A memory-mapped word whose contents can be represented as `T`.  The
/// contents are accessed using volatile operations only.
///
/// Like a `Cell`, a `Reg` can be mutated through a shared reference: hardware
/// state is inherently shared, so a unique reference to it would not mean much.
/// Transitively, the same applies to the register blocks built out of `Reg`s.
#[repr(transparent)]
pub struct Reg<T> {
    value: UnsafeCell<T>,
}

impl<T: Copy> Reg<T> {
    /// Creates a register holding `value`.  Real registers are never
    /// constructed; they are reached by casting a base address.  This exists
    /// for RAM-backed stand-ins.
    pub const fn new(value: T) -> Reg<T> {
        Reg { value: UnsafeCell::new(value) }
    }

    /// Reads the contents of the register using a volatile load.
    #[inline]
    pub fn get(&self) -> T {
        unsafe { ptr::read_volatile(self.value.get()) }
    }

    /// Replaces the contents of the register using a volatile store.
    #[inline]
    pub fn set(&self, value: T) {
        unsafe { ptr::write_volatile(self.value.get(), value) }
    }

    pub fn update<F: FnOnce(T) -> T>(&self, f: F) {
        self.set(f(self.get()))
    }
}

unsafe impl<T: Send> Sync for Reg<T> {}
