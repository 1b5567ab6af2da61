// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for [`Uart`] and the ports managed by [`Driver`].
//!
//! [`Uart`]: crate::Uart
//! [`Driver`]: crate::Driver

use crate::spec::registers::{Parity, WordLength};
use core::cmp::Ordering;

/// Capacity of each console channel (TX and RX) in bytes.
pub const CHANNEL_CAPACITY: usize = 256;

/// Baud rate a freshly set-up port is programmed with.
pub const DEFAULT_BAUD_RATE: BaudRate = BaudRate::Baud115200;

/// The speed of data transmission, measured in symbols per second (or bits, in
/// the case of simple UARTs).
///
/// This type is a convenient and non-ABI compatible abstraction. Use
/// [`calc_divisor`] to get the divisor for the divisor latch.
///
/// [`calc_divisor`]: crate::spec::calc_divisor
#[allow(missing_docs)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum BaudRate {
    // List of typical baud rates.
    #[default]
    Baud115200,
    Baud57600,
    Baud38400,
    Baud19200,
    Baud9600,
    Baud4800,
    Baud2400,
    Baud1800,
    Baud1200,
    Baud600,
    Baud300,
    Baud200,
    Baud150,
    Baud134,
    Baud110,
    Baud75,
    Baud50,
    Custom(u32),
}

impl BaudRate {
    /// Returns the value as corresponding integer.
    #[must_use]
    pub const fn to_integer(self) -> u32 {
        match self {
            Self::Baud115200 => 115200,
            Self::Baud57600 => 57600,
            Self::Baud38400 => 38400,
            Self::Baud19200 => 19200,
            Self::Baud9600 => 9600,
            Self::Baud4800 => 4800,
            Self::Baud2400 => 2400,
            Self::Baud1800 => 1800,
            Self::Baud1200 => 1200,
            Self::Baud600 => 600,
            Self::Baud300 => 300,
            Self::Baud200 => 200,
            Self::Baud150 => 150,
            Self::Baud134 => 134,
            Self::Baud110 => 110,
            Self::Baud75 => 75,
            Self::Baud50 => 50,
            Self::Custom(val) => val,
        }
    }

    /// Creates the type from an integer representation of the baud rate.
    #[must_use]
    pub const fn from_integer(value: u32) -> Self {
        match value {
            115200 => Self::Baud115200,
            57600 => Self::Baud57600,
            38400 => Self::Baud38400,
            19200 => Self::Baud19200,
            9600 => Self::Baud9600,
            4800 => Self::Baud4800,
            2400 => Self::Baud2400,
            1800 => Self::Baud1800,
            1200 => Self::Baud1200,
            600 => Self::Baud600,
            300 => Self::Baud300,
            200 => Self::Baud200,
            150 => Self::Baud150,
            134 => Self::Baud134,
            110 => Self::Baud110,
            75 => Self::Baud75,
            50 => Self::Baud50,
            baud_rate => Self::Custom(baud_rate),
        }
    }
}

impl PartialOrd for BaudRate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BaudRate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_integer().cmp(&other.to_integer())
    }
}

/// Number of stop bits per frame.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StopBits {
    /// One stop bit.
    #[default]
    One,
    /// Two stop bits (1.5 with five data bits).
    Two,
}

/// Line settings programmed by `SET_LINE` and as part of `INIT`.
///
/// Please note that sender and receiver **must agree** on the transmission
/// settings, otherwise you receive garbage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineConfig {
    /// The baud rate to use.
    pub baud_rate: BaudRate,
    /// The length of each transmitted word.
    pub data_bits: WordLength,
    /// The number of stop bits.
    pub stop_bits: StopBits,
    /// Whether parity bits should be used.
    pub parity: Parity,
    /// Whether automatic RTS/CTS hardware flow control is enabled.
    pub flow_control: bool,
}

/// Configuration of the raw personality, passed with `INIT`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RawConfig {
    /// Line settings to program when entering raw mode.
    pub line: LineConfig,
    /// Whether transfers are moved by DMA instead of programmed I/O.
    pub dma: bool,
}

/// Handle to the input clock of a port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Clock {
    /// Clock rate in Hz.
    pub rate_hz: u32,
}

impl Clock {
    /// Creates a clock handle with the given rate.
    #[must_use]
    pub const fn new(rate_hz: u32) -> Self {
        Self { rate_hz }
    }
}

/// Pin assignment of a port. `None` means the signal is not routed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PinMap {
    /// Transmit data pin.
    pub tx: Option<u8>,
    /// Receive data pin.
    pub rx: Option<u8>,
    /// Clear-to-send pin.
    pub cts: Option<u8>,
    /// Request-to-send pin.
    pub rts: Option<u8>,
}

impl PinMap {
    /// Whether both hardware flow control lines are routed.
    #[must_use]
    pub const fn has_flow_control(&self) -> bool {
        self.cts.is_some() && self.rts.is_some()
    }
}

/// DMA handshake request lines wired to a port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DmaRequestLines {
    /// Request line raised when the transmit FIFO wants data.
    pub tx: u8,
    /// Request line raised when the receive FIFO has data.
    pub rx: u8,
}

/// Setup-time description of a port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PortConfig {
    /// Input clock of the UART.
    pub clock: Clock,
    /// Pin assignment.
    pub pins: PinMap,
    /// Whether this port is the system console. The console port never
    /// enters raw mode.
    pub console: bool,
    /// DMA request lines, if the port is wired to a DMA controller.
    pub dma_requests: Option<DmaRequestLines>,
}

impl PortConfig {
    /// The line settings a freshly set-up port is programmed with: the
    /// default baud rate, 8N1, and flow control when both lines are routed.
    #[must_use]
    pub fn console_line(&self) -> LineConfig {
        LineConfig {
            baud_rate: DEFAULT_BAUD_RATE,
            flow_control: self.pins.has_flow_control(),
            ..LineConfig::default()
        }
    }
}
