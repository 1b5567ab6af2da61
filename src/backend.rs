// SPDX-License-Identifier: MIT OR Apache-2.0

//! Abstraction over the I/O backend (Hardware Abstraction Layer (HAL)).
//!
//! Main exports:
//! - [`Backend`]
//! - [`MmioBackend`]

use crate::spec::registers::offsets;
use core::fmt::Debug;
use core::ptr::{read_volatile, write_volatile};

/// Memory-mapped I/O (MMIO) address of a register block.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Hash)]
pub struct MmioAddress(pub(crate) *mut u32);

impl MmioAddress {
    /// Adds the byte offset onto the address.
    fn add_offset(self, offset: usize) -> Self {
        // SAFETY: We ensure on a higher level that the base address is valid
        // and that this will not wrap.
        let address = unsafe { self.0.byte_add(offset) };
        Self(address)
    }

    /// Returns the raw address.
    #[must_use]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

fn assert_offset(offset: usize) {
    assert!(
        offset < offsets::MAX && offset % 4 == 0,
        "the offset should be an aligned register offset: {offset:#x}, expected: < {:#x}",
        offsets::MAX
    );
}

/// Abstraction over the register access of the UART.
///
/// This acts as Hardware Abstraction Layer (HAL). Implementations are
/// exclusively owned handles: every access takes `&mut self`, so two call
/// sites can never touch the registers without going through the owner.
pub trait Backend: Debug {
    /// Reads one 32-bit register.
    ///
    /// This needs a mutable reference as reads can have side effects on the
    /// device, depending on the register.
    ///
    /// # Arguments
    ///
    /// - `offset`: Byte offset regarding the base address.
    ///
    /// # Safety
    ///
    /// Callers must ensure that the provided offset is valid and safe to read.
    unsafe fn read_register(&mut self, offset: usize) -> u32;

    /// Writes one 32-bit register.
    ///
    /// Writes can have side effects on the device, depending on the register.
    ///
    /// # Arguments
    ///
    /// - `offset`: Byte offset regarding the base address.
    ///
    /// # Safety
    ///
    /// Callers must ensure that the provided offset is valid and safe to write.
    unsafe fn write_register(&mut self, offset: usize, value: u32);

    /// Returns the bus address of a register, as seen by a DMA engine.
    fn register_address(&self, offset: usize) -> usize;
}

/// MMIO-mapped UART register block.
///
/// Deliberately neither `Copy` nor `Clone`.
#[derive(Debug)]
pub struct MmioBackend(pub(crate) MmioAddress /* base address, non-null */);

impl Backend for MmioBackend {
    unsafe fn read_register(&mut self, offset: usize) -> u32 {
        assert_offset(offset);
        let address = self.0.add_offset(offset);

        // SAFETY: The caller ensured that the MMIO address is safe to use.
        unsafe { read_volatile(address.0) }
    }

    unsafe fn write_register(&mut self, offset: usize, value: u32) {
        assert_offset(offset);
        let address = self.0.add_offset(offset);

        // SAFETY: The caller ensured that the MMIO address is safe to use.
        unsafe { write_volatile(address.0, value) }
    }

    fn register_address(&self, offset: usize) -> usize {
        self.0.as_usize() + offset
    }
}

// SAFETY: The backend exclusively owns the register block; moving it to
// another context moves that ownership along.
unsafe impl Send for MmioBackend {}
