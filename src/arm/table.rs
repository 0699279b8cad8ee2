//! The ARM exception vector table.
//!
//! On exception entry the processor loads its program counter from a fixed
//! offset into this table.  Each slot is two words: a load-PC instruction and
//! the literal it loads, so any address in the 32-bit space can be reached
//! from any slot:
//!
//! ```text
//!   base + 8n + 0:  e51ff004   ldr pc, [pc, #-4]
//!   base + 8n + 4:  <target>   .word handler
//! ```
//!
//! (`pc` reads as the instruction's own address plus 8, so `#-4` lands on the
//! literal right after it.)
//!
//! The layout is fixed by the processor.  `VectorTable` never resizes,
//! reorders or compacts it.

use core::sync::atomic::{self, Ordering};

use crate::arm;
use crate::arm::exc::ExceptionVector;
use crate::arm::reg::Reg;
use crate::error::{Error, Result};

/// Size of the whole table in bytes.
pub const VECTOR_TABLE_SIZE: usize = 64;

/// Size of one slot in bytes.
pub const SLOT_SIZE: usize = 8;

/// Required alignment of the table base.  This is what `VBAR` demands on cores
/// that have it, and trivially satisfied by the two fixed locations on cores
/// that don't.
pub const VECTOR_TABLE_ALIGN: usize = 32;

/// `ldr pc, [pc, #-4]`, unconditional.
pub const LDR_PC_LITERAL: u32 = 0xe51f_f004;

#[repr(C)]
struct Slot {
    instruction: Reg<u32>,
    target: Reg<u32>,
}

#[repr(C)]
struct Registers {
    slots: [Slot; ExceptionVector::COUNT],
}

const _: () = assert!(size_of::<Slot>() == SLOT_SIZE);
const _: () = assert!(size_of::<Registers>() == VECTOR_TABLE_SIZE);

/// Where the table lives.  Most cores fetch vectors from the bottom of the
/// address space; setting `SCTLR.V` moves them to the top, and cores with the
/// Security Extensions can point `VBAR` anywhere suitably aligned.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VectorBase {
    Low,
    High,
    Custom(usize),
}

impl VectorBase {
    pub const LOW_ADDRESS: usize = 0x0000_0000;
    pub const HIGH_ADDRESS: usize = 0xffff_0000;

    pub fn address(self) -> usize {
        match self {
            VectorBase::Low => VectorBase::LOW_ADDRESS,
            VectorBase::High => VectorBase::HIGH_ADDRESS,
            VectorBase::Custom(addr) => addr,
        }
    }

    /// The address, if the processor can fetch a table from it.
    pub fn checked(self) -> Result<usize> {
        check_base(self.address())
    }
}

impl Default for VectorBase {
    #[cfg(not(feature = "high-vectors"))]
    fn default() -> VectorBase {
        VectorBase::Low
    }

    #[cfg(feature = "high-vectors")]
    fn default() -> VectorBase {
        VectorBase::High
    }
}

/// Validates a table base address for the bring-up path.  A bad base is a
/// fatal configuration error; nothing further down checks it again.
pub fn check_base(base: usize) -> Result<usize> {
    if base % VECTOR_TABLE_ALIGN == 0 {
        Ok(base)
    } else {
        Err(Error::MisalignedBase(base))
    }
}

/// Raw access to the 64 bytes of the vector table.
///
/// This type only knows the slot encoding.  Handler bookkeeping lives in
/// `ArmException`.
pub struct VectorTable {
    reg: *mut Registers,
}

impl VectorTable {
    /// Creates a view of the table at `base`.  Does not touch the memory.
    ///
    /// # Safety
    ///
    /// `base` must be `VECTOR_TABLE_ALIGN`-aligned, and the 64 bytes from it
    /// must be mapped and writable for as long as this value (or anything
    /// built from it) exists.  Nothing else may write them.
    pub unsafe fn new(base: usize) -> VectorTable {
        debug_assert!(check_base(base).is_ok(),
                      "misaligned vector table base {:#x}", base);
        VectorTable { reg: base as *mut Registers }
    }

    pub fn base(&self) -> usize {
        self.reg as usize
    }

    /// Points `vector`'s slot at `target`.
    ///
    /// The literal is written before the instruction, so a fetch racing with
    /// a first-time write sees either the old slot or a complete new one.
    /// Replacing an already-valid slot only rewrites the literal.  Callers
    /// still have to mask `vector` around this; see `ArmException::install`.
    pub fn write(&self, vector: ExceptionVector, target: u32) {
        let slot = &self.reg().slots[vector.index()];
        slot.target.set(target);
        atomic::fence(Ordering::Release);
        if slot.instruction.get() != LDR_PC_LITERAL {
            slot.instruction.set(LDR_PC_LITERAL);
        }
        arm::sync_table()
    }

    /// Decodes `vector`'s slot the way the processor would.  Returns the jump
    /// target, or `None` if the slot does not hold the load-PC instruction
    /// (never written, or clobbered).
    pub fn resolve(&self, vector: ExceptionVector) -> Option<u32> {
        let slot = &self.reg().slots[vector.index()];
        atomic::fence(Ordering::Acquire);
        if slot.instruction.get() == LDR_PC_LITERAL {
            Some(slot.target.get())
        } else {
            None
        }
    }

    /// True once every slot holds a valid jump.
    pub fn is_complete(&self) -> bool {
        ExceptionVector::ALL.iter().all(|&v| self.resolve(v).is_some())
    }

    /// The table's contents as sixteen words, instruction and literal for
    /// each slot in order.
    pub fn words(&self) -> [u32; VECTOR_TABLE_SIZE / 4] {
        let mut words = [0; VECTOR_TABLE_SIZE / 4];
        for (i, slot) in self.reg().slots.iter().enumerate() {
            words[2 * i] = slot.instruction.get();
            words[2 * i + 1] = slot.target.get();
        }
        words
    }

    fn reg(&self) -> &Registers {
        unsafe { &*self.reg }
    }
}

unsafe impl Send for VectorTable {}
unsafe impl Sync for VectorTable {}

/// RAM stand-in for the low 64 bytes of memory.
#[cfg(test)]
#[repr(C, align(32))]
pub(crate) struct TestMemory(pub [u32; VECTOR_TABLE_SIZE / 4]);

#[cfg(test)]
impl TestMemory {
    /// Filled with a pattern that decodes as no valid slot.
    pub fn new() -> TestMemory {
        TestMemory([0xdead_beef; VECTOR_TABLE_SIZE / 4])
    }

    pub fn base(&mut self) -> usize {
        self as *mut TestMemory as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sixty_four_contiguous_bytes() {
        assert_eq!(size_of::<Registers>(), 64);
        assert_eq!(size_of::<Slot>(), 8);

        let mut mem = TestMemory::new();
        let base = mem.base();
        let table = unsafe { VectorTable::new(base) };
        for v in ExceptionVector::ALL.iter() {
            let slot = &table.reg().slots[v.index()] as *const Slot as usize;
            assert_eq!(slot, base + v.offset());
            let target = &table.reg().slots[v.index()].target as *const Reg<u32>;
            assert_eq!(target as usize, base + v.offset() + 4);
        }
    }

    #[test]
    fn write_encodes_load_pc_and_literal() {
        let mut mem = TestMemory::new();
        let table = unsafe { VectorTable::new(mem.base()) };

        table.write(ExceptionVector::DataAbort, 0x8000_1234);

        let words = table.words();
        assert_eq!(words[8], LDR_PC_LITERAL);
        assert_eq!(words[9], 0x8000_1234);
        for (i, w) in words.iter().enumerate() {
            if i != 8 && i != 9 {
                assert_eq!(*w, 0xdead_beef, "word {} disturbed", i);
            }
        }
    }

    #[test]
    fn unwritten_slots_do_not_resolve() {
        let mut mem = TestMemory::new();
        let table = unsafe { VectorTable::new(mem.base()) };

        assert_eq!(table.resolve(ExceptionVector::Reset), None);
        assert!(!table.is_complete());

        for v in ExceptionVector::ALL.iter() {
            table.write(*v, 0x1000 + v.index() as u32);
        }
        assert!(table.is_complete());
        assert_eq!(table.resolve(ExceptionVector::FIQ), Some(0x1007));
    }

    #[test]
    fn rewrite_replaces_literal() {
        let mut mem = TestMemory::new();
        let table = unsafe { VectorTable::new(mem.base()) };

        table.write(ExceptionVector::IRQ, 0x100);
        table.write(ExceptionVector::IRQ, 0x200);
        assert_eq!(table.resolve(ExceptionVector::IRQ), Some(0x200));
    }

    #[test]
    fn base_configuration() {
        assert_eq!(VectorBase::Low.checked(), Ok(0));
        assert_eq!(VectorBase::High.checked(), Ok(0xffff_0000));
        assert_eq!(VectorBase::Custom(0x8000_0020).checked(), Ok(0x8000_0020));
        assert_eq!(VectorBase::Custom(0x8000_0004).checked(),
                   Err(Error::MisalignedBase(0x8000_0004)));
        #[cfg(not(feature = "high-vectors"))]
        assert_eq!(VectorBase::default(), VectorBase::Low);
    }
}
