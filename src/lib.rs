// SPDX-License-Identifier: MIT OR Apache-2.0

//! # atcuart
//!
//! Driver for the ATCUART100 family of 16550-derived UART controllers with
//! 32-bit registers, as found in low-power IoT SoCs.
//!
//! A port has two personalities:
//!
//! - **console**: an interrupt-driven byte stream. Writers and readers go
//!   through bounded channels that the interrupt handler drains into and
//!   fills from the hardware FIFO.
//! - **raw**: fixed-length block transfers, one per direction at a time,
//!   moved either by programmed I/O (PIO) from the interrupt handler or by a
//!   DMA controller. Completion is reported to a single subscriber per port
//!   as a [`UartEvent`].
//!
//! The ports of a system live in a [`Driver`], a fixed arena indexed by the
//! hardware instance number. The driver is the single entry point from
//! interrupt context ([`Driver::handle_interrupt`] and
//! [`Driver::handle_dma_complete`]) and offers the device-control command
//! surface ([`Driver::ioctl`]), the console byte stream, and power
//! management.
//!
//! For register level access, see [`Uart`].
//!
//! ## Focus, Scope & Limitations
//!
//! The DMA engine itself is not part of this crate. It is consumed through
//! the [`dma::DmaController`] contract. Likewise, masking the interrupt line
//! of a port is delegated to the platform through [`sync::IrqControl`].
//!
//! Terminal emulation concerns are out of scope, apart from the newline
//! translation of the polled [`ConsoleWriter`].

#![no_std]
#![deny(
    clippy::all,
    clippy::cargo,
    clippy::nursery,
    clippy::must_use_candidate,
    clippy::missing_safety_doc,
    clippy::undocumented_unsafe_blocks
)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(rustdoc::all)]

#[cfg(test)]
extern crate std;

use crate::backend::{Backend, MmioAddress, MmioBackend};
pub use crate::config::*;
pub use crate::driver::{Driver, PortStats};
pub use crate::error::*;
pub use crate::ioctl::{Command, CommandCode, Response};
pub use crate::port::Readiness;
pub use crate::raw::{UartEvent, UartNotify};
pub use crate::tty::ConsoleWriter;
use crate::spec::calc_divisor;
use crate::spec::registers::{FCR, IER, IIR, LCR, LSR, MCR, MSR, OSC_MASK, fifo_depth, offsets};

pub mod backend;
pub mod dma;
pub mod spec;
pub mod sync;

mod channel;
mod config;
mod driver;
mod error;
mod fifo;
mod ioctl;
mod irq;
mod pm;
mod port;
mod raw;
#[cfg(test)]
mod sim;
mod tty;

/// Register level handle of one UART instance.
///
/// The handle exclusively owns the register block: it is neither `Copy` nor
/// `Clone`, and every access takes `&mut self`. Interrupt-vs-thread races
/// are ruled out by the [`Driver`], which only touches a port inside an
/// interrupt-masked critical section.
///
/// # Example
///
/// ```rust,no_run
/// # use atcuart::{LineConfig, Uart};
/// # use atcuart::spec::registers::FCR;
/// let mut uart = unsafe { Uart::new_mmio(0xf020_0000 as *mut u32) }.unwrap();
/// uart.program_line(40_000_000, &LineConfig::default(), FCR::BASE_SETUP)
///     .unwrap();
/// uart.send_bytes_all(b"hello world!");
/// ```
#[derive(Debug)]
pub struct Uart<B: Backend> {
    backend: B,
}

impl Uart<MmioBackend> {
    /// Creates a new [`Uart`] backed by MMIO.
    ///
    /// # Safety
    ///
    /// Callers must ensure that the address is valid and safe to use, and
    /// that no other handle to the same register block exists.
    pub unsafe fn new_mmio(base_address: *mut u32) -> Result<Self, InvalidAddressError> {
        let address = MmioAddress(base_address);
        if base_address.is_null() || !base_address.is_aligned() {
            return Err(InvalidAddressError(address));
        }
        if address.as_usize().checked_add(offsets::MAX).is_none() {
            return Err(InvalidAddressError(address));
        }

        Ok(Self::from_backend(MmioBackend(address)))
    }
}

impl<B: Backend> Uart<B> {
    /// Wraps an already validated backend.
    pub const fn from_backend(backend: B) -> Self {
        Self { backend }
    }

    fn read(&mut self, offset: usize) -> u32 {
        // SAFETY: Only offsets from `offsets` are used, and the backend was
        // validated on construction.
        unsafe { self.backend.read_register(offset) }
    }

    fn write(&mut self, offset: usize, value: u32) {
        // SAFETY: Only offsets from `offsets` are used, and the backend was
        // validated on construction.
        unsafe { self.backend.write_register(offset, value) }
    }

    /* ----- Line Configuration --------------------------------------------- */

    /// Programs baud rate, frame format, and flow control.
    ///
    /// The divisor is derived from `clock_hz` and the oversampling factor of
    /// the OSC register. It is written with the divisor latch open and the
    /// latch is closed by the final LCR write, so the receiver never runs
    /// with a half-written divisor. Afterwards both FIFOs are reset with
    /// `fifo_ctl` applied, and the baseline interrupt sources (line status
    /// and received data) are armed: the line is always left receive-ready.
    ///
    /// Returns the programmed divisor.
    pub fn program_line(
        &mut self,
        clock_hz: u32,
        line: &LineConfig,
        fifo_ctl: FCR,
    ) -> Result<u16, Error> {
        let oversample = self.oversample();
        let divisor = calc_divisor(clock_hz, line.baud_rate.to_integer(), oversample)?;
        log::debug!(
            "baud={}, clock={clock_hz}, oversample={oversample}, divisor={divisor:#x}",
            line.baud_rate.to_integer()
        );

        self.set_divisor(divisor);

        let mut lcr = LCR::empty()
            .set_word_length(line.data_bits)
            .set_parity(line.parity);
        if line.stop_bits == StopBits::Two {
            lcr |= LCR::MORE_STOP_BITS;
        }
        self.set_lcr(lcr);
        self.set_fcr(fifo_ctl | FCR::FIFO_RESET);

        let mut mcr = self.mcr();
        mcr.set(MCR::AUTO_FLOW_CONTROL, line.flow_control);
        self.set_mcr(mcr);

        self.set_ier(IER::BASELINE);
        Ok(divisor)
    }

    /// Writes the divisor latch. LCR is restored with DLAB cleared.
    pub fn set_divisor(&mut self, divisor: u16) {
        let lcr = self.lcr();
        self.set_lcr(lcr | LCR::DLAB);
        let [low, high] = divisor.to_le_bytes();
        self.write(offsets::DLM, u32::from(high));
        self.write(offsets::DLL, u32::from(low));
        self.set_lcr(lcr - LCR::DLAB);
    }

    /// Reads the divisor latch. LCR is restored with DLAB cleared.
    pub fn divisor(&mut self) -> u16 {
        let lcr = self.lcr();
        self.set_lcr(lcr | LCR::DLAB);
        let low = self.read(offsets::DLL) as u8;
        let high = self.read(offsets::DLM) as u8;
        self.set_lcr(lcr - LCR::DLAB);
        u16::from_le_bytes([low, high])
    }

    /// Depth of the hardware FIFOs, from the hardware configuration register.
    pub fn fifo_depth(&mut self) -> usize {
        fifo_depth(self.hwc())
    }

    /// Oversampling factor of the baud clock.
    pub fn oversample(&mut self) -> u32 {
        self.osc() & OSC_MASK
    }

    /* ----- Interrupts ----------------------------------------------------- */

    /// Enables the given interrupt sources, keeping the others as they are.
    pub fn enable_interrupts(&mut self, sources: IER) {
        let ier = self.ier();
        self.set_ier(ier | sources);
    }

    /// Disables the given interrupt sources, keeping the others as they are.
    pub fn disable_interrupts(&mut self, sources: IER) {
        let ier = self.ier();
        self.set_ier(ier - sources);
    }

    /* ----- Data ----------------------------------------------------------- */

    /// Whether the transmit holding register (and FIFO) can take data.
    pub fn thr_empty(&mut self) -> bool {
        self.lsr().contains(LSR::THR_EMPTY)
    }

    /// Whether both the transmit FIFO and the shift register are empty.
    pub fn tx_empty(&mut self) -> bool {
        self.lsr().contains(LSR::TRANSMITTER_EMPTY)
    }

    /// Writes a byte into the transmit FIFO without checking for space.
    pub fn write_thr(&mut self, byte: u8) {
        self.write(offsets::DATA, u32::from(byte));
    }

    /// Tries to read a byte from the receive FIFO.
    pub fn try_receive_byte(&mut self) -> Option<u8> {
        if !self.lsr().contains(LSR::DATA_READY) {
            return None;
        }
        Some(self.read(offsets::DATA) as u8)
    }

    /// Reads and discards everything in the receive FIFO. Returns the number
    /// of dropped bytes.
    pub fn drain_rx(&mut self) -> usize {
        core::iter::from_fn(|| self.try_receive_byte()).count()
    }

    /// Tries to write a byte to the device.
    pub fn try_send_byte(&mut self, byte: u8) -> Result<(), Error> {
        if !self.thr_empty() {
            return Err(Error::WouldBlock);
        }
        self.write_thr(byte);
        Ok(())
    }

    /// Sends all bytes, spinning until the transmitter takes each of them.
    pub fn send_bytes_all(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            while self.try_send_byte(byte).is_err() {
                core::hint::spin_loop();
            }
        }
    }

    /// Bus address of the data register, as seen by a DMA engine.
    pub fn data_register_address(&self) -> usize {
        self.backend.register_address(offsets::DATA)
    }

    /* ----- Typed Register Access ------------------------------------------ */

    /// Fetches the current value from the [`IER`].
    pub fn ier(&mut self) -> IER {
        IER::from_bits_truncate(self.read(offsets::IER))
    }

    /// Writes the [`IER`].
    pub fn set_ier(&mut self, ier: IER) {
        self.write(offsets::IER, ier.bits());
    }

    /// Fetches the current value from the [`IIR`].
    pub fn iir(&mut self) -> IIR {
        IIR::from_bits_truncate(self.read(offsets::IIR))
    }

    /// Writes the [`FCR`].
    pub fn set_fcr(&mut self, fcr: FCR) {
        self.write(offsets::FCR, fcr.bits());
    }

    /// Fetches the current value from the [`LCR`].
    pub fn lcr(&mut self) -> LCR {
        LCR::from_bits_truncate(self.read(offsets::LCR))
    }

    /// Writes the [`LCR`].
    pub fn set_lcr(&mut self, lcr: LCR) {
        self.write(offsets::LCR, lcr.bits());
    }

    /// Fetches the current value from the [`MCR`].
    pub fn mcr(&mut self) -> MCR {
        MCR::from_bits_truncate(self.read(offsets::MCR))
    }

    /// Writes the [`MCR`].
    pub fn set_mcr(&mut self, mcr: MCR) {
        self.write(offsets::MCR, mcr.bits());
    }

    /// Fetches the current value from the [`LSR`].
    ///
    /// Reading clears the error indications.
    pub fn lsr(&mut self) -> LSR {
        LSR::from_bits_truncate(self.read(offsets::LSR))
    }

    /// Fetches the current value from the [`MSR`].
    pub fn msr(&mut self) -> MSR {
        MSR::from_bits_truncate(self.read(offsets::MSR))
    }

    /// Fetches the raw hardware configuration register.
    pub fn hwc(&mut self) -> u32 {
        self.read(offsets::HWC)
    }

    /// Fetches the raw over-sample control register.
    pub fn osc(&mut self) -> u32 {
        self.read(offsets::OSC)
    }

    /// Writes the raw over-sample control register.
    pub fn set_osc(&mut self, osc: u32) {
        self.write(offsets::OSC, osc);
    }
}
