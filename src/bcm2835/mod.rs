//! Support for the BCM2835 SoC (Raspberry Pi 1, Zero).

pub mod irq;

/// Where the ARM sees the SoC's peripherals.  The VideoCore bus address is
/// `0x7e00_0000`; the ARM side remaps it here.
pub const PERIPHERAL_BASE: usize = 0x2000_0000;
