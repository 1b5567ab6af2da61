// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors that can happen when working with [`Uart`] and [`Driver`].
//!
//! [`Uart`]: crate::Uart
//! [`Driver`]: crate::Driver

use crate::backend::MmioAddress;
use crate::dma::DmaError;
use crate::spec::DivisorError;
use crate::spec::registers::LSR;
use bitflags::bitflags;
use core::error::Error as CoreError;
use core::fmt::{self, Display, Formatter};

/// The specified address is invalid because it is either null or doesn't offer
/// [`offsets::MAX`] subsequent bytes.
///
/// [`offsets::MAX`]: crate::spec::registers::offsets::MAX
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InvalidAddressError(pub(crate) MmioAddress);

impl Display for InvalidAddressError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "invalid register address: {:x?}", self.0)
    }
}

impl CoreError for InvalidAddressError {}

bitflags! {
    /// Receive line errors decoded from the line status register.
    ///
    /// Any combination can be reported at once.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct LineError: u8 {
        /// A character was lost because the receive FIFO was full.
        const OVERRUN = 1 << 0;
        /// A character arrived with the wrong parity.
        const PARITY = 1 << 1;
        /// A character arrived without a valid stop bit.
        const FRAMING = 1 << 2;
        /// The line was held low for longer than a character time.
        const BREAK = 1 << 3;
    }
}

impl LineError {
    /// Decodes the error indications of a line status value.
    #[must_use]
    pub fn from_lsr(lsr: LSR) -> Self {
        let mut err = Self::empty();
        if lsr.contains(LSR::BREAK_INTERRUPT) {
            err |= Self::BREAK;
        }
        if lsr.contains(LSR::FRAMING_ERROR) {
            err |= Self::FRAMING;
        }
        if lsr.contains(LSR::PARITY_ERROR) {
            err |= Self::PARITY;
        }
        if lsr.contains(LSR::OVERRUN_ERROR) {
            err |= Self::OVERRUN;
        }
        err
    }
}

impl Display for LineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        const NAMES: [(LineError, &str); 4] = [
            (LineError::OVERRUN, "overrun"),
            (LineError::PARITY, "parity"),
            (LineError::FRAMING, "framing"),
            (LineError::BREAK, "break"),
        ];

        if self.is_empty() {
            return write!(f, "unspecified line error");
        }
        let mut names = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| name);
        if let Some(name) = names.next() {
            write!(f, "{name}")?;
        }
        for name in names {
            write!(f, " | {name}")?;
        }
        Ok(())
    }
}

impl CoreError for LineError {}

/// Errors reported by the driver operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Error {
    /// The port or DMA device is not available.
    NotFound,
    /// The port is busy: raw mode is already initialized, the port is the
    /// system console, or data is still in flight.
    Busy,
    /// A transfer in the same direction has not finished yet.
    InProgress,
    /// A raw operation was attempted while raw mode is not enabled.
    Permission,
    /// An argument is not supported, for example a zero-length transfer or
    /// a DMA buffer outside DMA-capable memory.
    InvalidArgument,
    /// The operation would have to wait for free space.
    WouldBlock,
    /// The configured baud rate cannot be produced from the input clock.
    InvalidBaudRate(DivisorError),
    /// The DMA controller refused the channel configuration.
    Dma(DmaError),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "device or channel not available"),
            Self::Busy => write!(f, "device busy"),
            Self::InProgress => write!(f, "a transfer is already in progress"),
            Self::Permission => write!(f, "raw mode is not enabled"),
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::WouldBlock => write!(f, "operation would block"),
            Self::InvalidBaudRate(e) => write!(f, "invalid baud rate: {e}"),
            Self::Dma(e) => write!(f, "DMA configuration failed: {e}"),
        }
    }
}

impl CoreError for Error {
    fn source(&self) -> Option<&(dyn CoreError + 'static)> {
        match self {
            Self::InvalidBaudRate(err) => Some(err),
            Self::Dma(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DivisorError> for Error {
    fn from(err: DivisorError) -> Self {
        Self::InvalidBaudRate(err)
    }
}

impl From<DmaError> for Error {
    fn from(err: DmaError) -> Self {
        Self::Dma(err)
    }
}
