// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Constants, Register Offsets, and Register Bits.
//!
//! Models the raw low-level details of the 16550-derived register block with
//! 32-bit registers, and avoids too opinionated abstractions.
//!
//! Compared to the classic 16550 byte layout, every register is 32 bits wide
//! and the standard block is shifted to [`registers::offsets::DATA`]. Two
//! extension registers precede it: the hardware configuration register
//! ([`registers::offsets::HWC`]) exposing the FIFO depth, and the
//! over-sampling control register ([`registers::offsets::OSC`]).

pub use crate::spec::errors::*;

/// The smallest FIFO depth a device can report.
pub const MIN_FIFO_DEPTH: usize = 16;

mod errors {
    use core::error::Error;
    use core::fmt::{self, Display, Formatter};

    /// Error that is returned when [`calc_divisor`] cannot produce a divisor
    /// that fits into the 16-bit divisor latch.
    ///
    /// [`calc_divisor`]: crate::spec::calc_divisor
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Hash)]
    pub struct DivisorError {
        /// The input clock frequency of the UART.
        pub frequency: u32,
        /// The requested baud rate.
        pub baud_rate: u32,
        /// The over-sampling factor.
        pub oversample: u32,
    }

    impl Display for DivisorError {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            write!(
                f,
                "input values do not result in a usable divisor: frequency={}, baud_rate={}, oversample={}",
                self.frequency, self.baud_rate, self.oversample,
            )
        }
    }

    impl Error for DivisorError {}
}

/// Calculates the divisor latch value for the given baud rate.
///
/// The divisor is the one of `floor(frequency / (baud_rate * oversample))`
/// and its successor that minimizes the absolute frequency error. On a tie,
/// the smaller divisor wins.
///
/// # Arguments
/// - `frequency`: The input clock of the UART.
/// - `baud_rate`: The requested baud rate.
/// - `oversample`: The over-sampling factor as read from
///   [`registers::offsets::OSC`].
pub fn calc_divisor(frequency: u32, baud_rate: u32, oversample: u32) -> Result<u16, DivisorError> {
    let err = DivisorError {
        frequency,
        baud_rate,
        oversample,
    };

    if baud_rate == 0 || oversample == 0 {
        return Err(err);
    }

    let step = u64::from(baud_rate) * u64::from(oversample);
    let frequency = u64::from(frequency);
    let floor = frequency / step;
    let ceil = floor + 1;

    let divisor = if frequency.abs_diff(floor * step) > frequency.abs_diff(ceil * step) {
        ceil
    } else {
        floor
    };

    if divisor == 0 {
        return Err(err);
    }
    u16::try_from(divisor).map_err(|_| err)
}

/// Exposes low-level information about the on-chip register layout and provides
/// types that model individual registers.
///
/// The getters and setters in this module operate exclusively on raw bit
/// representations within the local computing context. They are limited to
/// extracting or updating the corresponding fields and do not perform direct
/// hardware access.
pub mod registers {
    use bitflags::bitflags;

    /// Provides the register offset from the base register.
    pub mod offsets {
        /// Size of the register block in bytes.
        pub const MAX: usize = 0x40;

        /// Hardware Configuration Register (HWC).
        ///
        /// Read-only extension register exposing the FIFO depth.
        pub const HWC: usize = 0x10;

        /// Over-Sampling Control Register (OSC).
        pub const OSC: usize = 0x14;

        /// For reads the Receiver Buffer Register (RBR) and for writes the
        /// Transmitter Holding Register (THR), effectively acting as
        /// **data** register.
        pub const DATA: usize = 0x20;

        /// Interrupt Enable Register (IER).
        pub const IER: usize = 0x24;

        /// Interrupt Identification Register (IIR).
        ///
        /// This register is used on **reads** from offset `0x28`.
        pub const IIR: usize = 0x28;

        /// FIFO Control Register (FCR).
        ///
        /// This register is used on **writes** to offset `0x28`.
        pub const FCR: usize = 0x28;

        /// Line Control Register (LCR).
        pub const LCR: usize = 0x2c;

        /// Modem Control Register (MCR).
        pub const MCR: usize = 0x30;

        /// Line Status Register (LSR).
        pub const LSR: usize = 0x34;

        /// Modem Status Register (MSR).
        pub const MSR: usize = 0x38;

        /// Scratch Register (SCR).
        pub const SCR: usize = 0x3c;

        /* Registers accessible only when DLAB = 1 */

        /// Divisor Latch, Least significant byte (DLL).
        pub const DLL: usize = 0x20;

        /// Divisor Latch, Most significant byte (DLM).
        pub const DLM: usize = 0x24;
    }

    /// Typing of the data register (RBR / THR). Only the low byte is used.
    pub type DATA = u32;

    /// Mask of the over-sampling factor in [`offsets::OSC`].
    pub const OSC_MASK: u32 = 0x1f;

    /// Mask of the FIFO depth field in [`offsets::HWC`].
    pub const HWC_FIFO_DEPTH_MASK: u32 = 0x3;

    /// Decodes the FIFO depth in bytes from the [`offsets::HWC`] register.
    #[must_use]
    pub const fn fifo_depth(hwc: u32) -> usize {
        super::MIN_FIFO_DEPTH << (hwc & HWC_FIFO_DEPTH_MASK)
    }

    bitflags! {
        /// Typing of the Interrupt Enable Register (IER).
        ///
        /// A logic "1" in any of these bits enables the corresponding
        /// interrupt, while a logic "0" disables it.
        ///
        /// This is a **read/write** register.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct IER: u32 {
            /// Enables the received data available interrupt (ERBI), which
            /// also covers the reception timeout.
            const RECEIVE_DATA = 1 << 0;
            /// Enables the THR Empty interrupt (ETHEI).
            ///
            /// This means data can be written (again).
            const THR_EMPTY = 1 << 1;
            /// Enables the Receiver Line Status interrupt (ELSI).
            ///
            /// This means an error occurred: parity, framing, overrun, break.
            const LINE_STATUS = 1 << 2;
            /// Enables the Modem Status interrupt (EMSI).
            const MODEM_STATUS = 1 << 3;
        }
    }

    impl IER {
        /// The interrupt sources armed whenever the line gets (re)configured:
        /// the port is always left ready to receive.
        pub const BASELINE: Self = Self::LINE_STATUS.union(Self::RECEIVE_DATA);
    }

    bitflags! {
        /// Typing of the Interrupt Identification Register (IIR).
        ///
        /// **Read-only** register at offset [`offsets::IIR`] for identifying
        /// the interrupt with the highest priority that is currently pending.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct IIR: u32 {
            /// Interrupt Identification (bit 0). Set if **no** interrupt is
            /// pending.
            const INTRID0 = 1 << 0;
            /// Interrupt Identification (bit 1).
            const INTRID1 = 1 << 1;
            /// Interrupt Identification (bit 2).
            const INTRID2 = 1 << 2;
            /// Interrupt Identification (bit 3). Only used by the reception
            /// timeout.
            const INTRID3 = 1 << 3;
            /// Set if FIFOs are enabled.
            const FIFOS_ENABLED0 = 1 << 6;
            /// Set if FIFOs are enabled.
            const FIFOS_ENABLED1 = 1 << 7;
        }
    }

    impl IIR {
        /// Mask of the interrupt identification field.
        pub const INTRID: Self = Self::from_bits_retain(0xf);

        /// Returns the matching [`InterruptId`], if there is an interrupt.
        #[must_use]
        pub const fn interrupt_id(self) -> Option<InterruptId> {
            InterruptId::from_bits(self.bits())
        }
    }

    /// The possible interrupt sources reported by the [`IIR`].
    ///
    /// This type is a convenient and non-ABI compatible abstraction.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub enum InterruptId {
        /// There is an overrun error, parity error, framing error or break
        /// interrupt indication corresponding to the received data on top of
        /// the receiver's FIFO.
        ///
        /// **Interrupt reset method:** Read the Line Status Register (LSR).
        LineStatus,
        /// The number of characters in the reception FIFO is equal or greater
        /// than the trigger level programmed in [`FCR`].
        ///
        /// **Interrupt reset method:** Read the data register until the level
        /// drops below the trigger.
        ReceiveData,
        /// There is at least one character in the receiver's FIFO and no
        /// character has been received or read for four character times.
        ///
        /// **Interrupt reset method:** Read the data register.
        ReceiveTimeout,
        /// The transmitter's FIFO is empty.
        ///
        /// **Interrupt reset method:** Write the data register or read the
        /// [`IIR`].
        ThrEmpty,
        /// A change has been detected on a modem input line.
        ///
        /// **Interrupt reset method:** Read the Modem Status Register (MSR).
        ModemStatus,
    }

    impl InterruptId {
        /// Raw encoding of [`Self::LineStatus`].
        pub const LINE_STATUS: u32 = 0x6;
        /// Raw encoding of [`Self::ReceiveData`].
        pub const RECEIVE_DATA: u32 = 0x4;
        /// Raw encoding of [`Self::ReceiveTimeout`].
        pub const RECEIVE_TIMEOUT: u32 = 0xc;
        /// Raw encoding of [`Self::ThrEmpty`].
        pub const THR_EMPTY: u32 = 0x2;
        /// Raw encoding of [`Self::ModemStatus`].
        pub const MODEM_STATUS: u32 = 0x0;

        /// Returns the [`InterruptId`] that corresponds to the bits in
        /// [`IIR`], or `None` if nothing is pending or the encoding is
        /// reserved.
        #[must_use]
        pub const fn from_bits(iir_bits: u32) -> Option<Self> {
            match iir_bits & IIR::INTRID.bits() {
                Self::LINE_STATUS => Some(Self::LineStatus),
                Self::RECEIVE_DATA => Some(Self::ReceiveData),
                Self::RECEIVE_TIMEOUT => Some(Self::ReceiveTimeout),
                Self::THR_EMPTY => Some(Self::ThrEmpty),
                Self::MODEM_STATUS => Some(Self::ModemStatus),
                _ => None,
            }
        }

        /// Translates the value into the corresponding raw encoding.
        #[must_use]
        pub const fn to_bits(self) -> u32 {
            match self {
                Self::LineStatus => Self::LINE_STATUS,
                Self::ReceiveData => Self::RECEIVE_DATA,
                Self::ReceiveTimeout => Self::RECEIVE_TIMEOUT,
                Self::ThrEmpty => Self::THR_EMPTY,
                Self::ModemStatus => Self::MODEM_STATUS,
            }
        }
    }

    bitflags! {
        /// Typing of the FIFO Control Register (FCR).
        ///
        /// **Write-only** register at offset [`offsets::FCR`] used to enable
        /// the FIFOs, clear them, select DMA mode, and set the trigger levels.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct FCR: u32 {
            /// Enables both the transmitter and receiver FIFOs.
            const FIFO_ENABLE = 1 << 0;
            /// Writing a one to this bit resets the receiver's FIFO. The bit
            /// will automatically return to zero.
            const RX_FIFO_RESET = 1 << 1;
            /// Writing a one to this bit resets the transmitter's FIFO. The
            /// bit will automatically return to zero.
            const TX_FIFO_RESET = 1 << 2;
            /// Enables the DMA handshake signals.
            const DMA_ENABLE = 1 << 3;
            /// Low bit of the transmitter FIFO trigger level.
            const TX_FIFO_TRIGGER_LEVEL0 = 1 << 4;
            /// High bit of the transmitter FIFO trigger level.
            const TX_FIFO_TRIGGER_LEVEL1 = 1 << 5;
            /// Low bit of the receiver FIFO trigger level.
            const RX_FIFO_TRIGGER_LEVEL0 = 1 << 6;
            /// High bit of the receiver FIFO trigger level.
            const RX_FIFO_TRIGGER_LEVEL1 = 1 << 7;
        }
    }

    impl FCR {
        /// Both self-clearing FIFO reset bits.
        pub const FIFO_RESET: Self = Self::RX_FIFO_RESET.union(Self::TX_FIFO_RESET);

        /// FIFO setup used outside of raw DMA mode: FIFOs enabled, trigger
        /// level 1 in both directions.
        pub const BASE_SETUP: Self = Self::FIFO_ENABLE
            .union(Self::TX_FIFO_TRIGGER_LEVEL0)
            .union(Self::RX_FIFO_TRIGGER_LEVEL0);

        /// Everything raw DMA mode adds on top of the console FIFO setup.
        pub const DMA_SETUP: Self = Self::DMA_ENABLE
            .union(Self::TX_FIFO_TRIGGER_LEVEL0)
            .union(Self::RX_FIFO_TRIGGER_LEVEL0);
    }

    bitflags! {
        /// Typing of the Line Control Register (LCR).
        ///
        /// Configures the serial frame format including word length, stop bits,
        /// parity, and controls access to the divisor latches via DLAB.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct LCR: u32 {
            /// First bit of [`WordLength`].
            const WORD_LENGTH0 = 1 << 0;
            /// Second bit of [`WordLength`].
            const WORD_LENGTH1 = 1 << 1;
            /// If cleared, only one stop bit will be transmitted. If set, two
            /// stop bits (1.5 with 5-bit data) will be transmitted.
            const MORE_STOP_BITS = 1 << 2;
            /// First bit of [`Parity`] (parity enable).
            const PARITY0 = 1 << 3;
            /// Second bit of [`Parity`] (even parity select).
            const PARITY1 = 1 << 4;
            /// Third bit of [`Parity`] (stick parity).
            const PARITY2 = 1 << 5;
            /// Forces a break condition on the transmission line.
            const SET_BREAK = 1 << 6;
            /// This is Divisor Latch Access Bit (DLAB).
            ///
            /// This bit **must** be set in order to access [`offsets::DLL`]
            /// and [`offsets::DLM`].
            const DLAB = 1 << 7;
        }
    }

    impl LCR {
        /// Returns the [`WordLength`].
        #[must_use]
        pub const fn word_length(self) -> WordLength {
            WordLength::from_raw_bits(self.bits())
        }

        /// Sets the [`WordLength`].
        #[must_use]
        pub fn set_word_length(self, value: WordLength) -> Self {
            let cleared = self - (Self::WORD_LENGTH0 | Self::WORD_LENGTH1);
            cleared | Self::from_bits_retain(value.to_raw_bits())
        }

        /// Returns the [`Parity`].
        #[must_use]
        pub const fn parity(self) -> Parity {
            Parity::from_raw_bits(self.bits() >> 3)
        }

        /// Sets the [`Parity`].
        #[must_use]
        pub fn set_parity(self, value: Parity) -> Self {
            let cleared = self - (Self::PARITY0 | Self::PARITY1 | Self::PARITY2);
            cleared | Self::from_bits_retain(value.to_raw_bits() << 3)
        }
    }

    /// The length of words for the transmission and reception in [`LCR`].
    ///
    /// This type is a convenient and non-ABI compatible abstraction. ABI
    /// compatibility is given via [`WordLength::from_raw_bits`] and
    /// [`WordLength::to_raw_bits`].
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub enum WordLength {
        /// Five data bits.
        FiveBits,
        /// Six data bits.
        SixBits,
        /// Seven data bits.
        SevenBits,
        /// Eight data bits.
        ///
        /// # Recommendation
        /// This is the recommended default.
        #[default]
        EightBits,
    }

    impl WordLength {
        /// Translates the raw encoding into the corresponding value.
        #[must_use]
        pub const fn from_raw_bits(bits: u32) -> Self {
            match bits & 0b11 {
                0b00 => Self::FiveBits,
                0b01 => Self::SixBits,
                0b10 => Self::SevenBits,
                _ => Self::EightBits,
            }
        }

        /// Translates the value into the corresponding raw encoding.
        #[must_use]
        pub const fn to_raw_bits(self) -> u32 {
            match self {
                Self::FiveBits => 0b00,
                Self::SixBits => 0b01,
                Self::SevenBits => 0b10,
                Self::EightBits => 0b11,
            }
        }
    }

    /// The parity setting of the frame format.
    ///
    /// This type is a convenient and non-ABI compatible abstraction. ABI
    /// compatibility is given via [`Parity::from_raw_bits`] and
    /// [`Parity::to_raw_bits`].
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub enum Parity {
        /// No parity bit is transmitted nor expected.
        #[default]
        Disabled,
        /// The number of bits including the parity bit must be odd.
        Odd,
        /// The number of bits including the parity bit must be even.
        Even,
        /// The parity bit is sent as/checked to be `1`.
        Forced1,
        /// The parity bit is sent as/checked to be `0`.
        Forced0,
    }

    impl Parity {
        /// Translates the raw encoding into the corresponding value.
        #[must_use]
        pub const fn from_raw_bits(bits: u32) -> Self {
            let bits = bits & 0b111;
            if bits & 1 == 0 {
                return Self::Disabled;
            }
            match bits >> 1 {
                0b00 => Self::Odd,
                0b01 => Self::Even,
                0b10 => Self::Forced1,
                _ => Self::Forced0,
            }
        }

        /// Translates the value into the corresponding raw encoding.
        #[must_use]
        pub const fn to_raw_bits(self) -> u32 {
            match self {
                Self::Disabled => 0b000,
                Self::Odd => 0b001,
                Self::Even => 0b011,
                Self::Forced1 => 0b101,
                Self::Forced0 => 0b111,
            }
        }
    }

    bitflags! {
        /// Typing of the Modem Control Register (MCR).
        ///
        /// This is a **read/write** register.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct MCR: u32 {
            /// Controls the "data terminal ready" output.
            const DTR = 1 << 0;
            /// Controls the "request to send" output.
            const RTS = 1 << 1;
            /// Controls the general purpose output out1.
            const OUT_1 = 1 << 2;
            /// Controls the general purpose output out2.
            const OUT_2 = 1 << 3;
            /// Activates the loop back mode.
            const LOOP_BACK = 1 << 4;
            /// Enables automatic hardware flow control (RTS/CTS).
            const AUTO_FLOW_CONTROL = 1 << 5;
        }
    }

    bitflags! {
        /// Typing of the Line Status Register (LSR).
        ///
        /// Reports the current status of the transmitter and receiver,
        /// including data readiness, errors, and transmitter emptiness.
        ///
        /// This is a **read-only** register. Reading it clears the error
        /// flags.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct LSR: u32 {
            /// One or more characters are waiting in the receiver's FIFO.
            const DATA_READY = 1 << 0;
            /// A character was assembled without free space in the
            /// receiver's FIFO.
            const OVERRUN_ERROR = 1 << 1;
            /// The parity of the received character is wrong.
            const PARITY_ERROR = 1 << 2;
            /// The received character did not have a valid stop bit.
            const FRAMING_ERROR = 1 << 3;
            /// The receiver's line input was held at zero for a complete
            /// character time.
            const BREAK_INTERRUPT = 1 << 4;
            /// The transmitter's FIFO is completely empty.
            const THR_EMPTY = 1 << 5;
            /// Both the transmitter's FIFO and the shift register are empty;
            /// the line is idle.
            const TRANSMITTER_EMPTY = 1 << 6;
            /// At least one character in the receiver's FIFO carries an
            /// error indication.
            const FIFO_DATA_ERROR = 1 << 7;
        }
    }

    impl LSR {
        /// All receive error indications.
        pub const RX_ERRORS: Self = Self::OVERRUN_ERROR
            .union(Self::PARITY_ERROR)
            .union(Self::FRAMING_ERROR)
            .union(Self::BREAK_INTERRUPT)
            .union(Self::FIFO_DATA_ERROR);
    }

    bitflags! {
        /// Typing of the Modem Status Register (MSR).
        ///
        /// This is a **read-only** register.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct MSR: u32 {
            /// delta-CTS flag.
            const DELTA_CTS = 1 << 0;
            /// delta-DSR flag.
            const DELTA_DSR = 1 << 1;
            /// Trailing edge on the ring indicator.
            const TRAILING_EDGE_RI = 1 << 2;
            /// delta-CD flag.
            const DELTA_CD = 1 << 3;
            /// Clear To Send.
            const CTS = 1 << 4;
            /// Data Set Ready.
            const DSR = 1 << 5;
            /// Ring Indicator.
            const RI = 1 << 6;
            /// Carrier Detect.
            const CD = 1 << 7;
        }
    }
}
