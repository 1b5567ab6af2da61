// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device control commands.

use crate::backend::Backend;
use crate::config::{LineConfig, RawConfig};
use crate::dma::DmaController;
use crate::error::Error;
use crate::port::Port;
use crate::raw::UartNotify;
use core::fmt::{self, Debug, Formatter};

/// Numeric operation codes of the device control interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum CommandCode {
    /// See [`Command::Init`].
    Init = 0,
    /// See [`Command::Deinit`].
    Deinit = 1,
    /// See [`Command::Transmit`].
    Transmit = 2,
    /// See [`Command::Receive`].
    Receive = 3,
    /// See [`Command::Reset`].
    Reset = 4,
    /// See [`Command::GetRxLen`].
    GetRxLen = 5,
    /// See [`Command::SetLine`].
    SetLine = 6,
}

impl TryFrom<u32> for CommandCode {
    type Error = Error;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        let code = match code {
            0 => Self::Init,
            1 => Self::Deinit,
            2 => Self::Transmit,
            3 => Self::Receive,
            4 => Self::Reset,
            5 => Self::GetRxLen,
            6 => Self::SetLine,
            _ => return Err(Error::InvalidArgument),
        };
        Ok(code)
    }
}

/// A device control command, as passed to [`Driver::ioctl`].
///
/// [`Driver::ioctl`]: crate::Driver::ioctl
#[derive(Clone, Copy)]
pub enum Command {
    /// Programs baud rate, frame format, and flow control.
    SetLine(LineConfig),
    /// Switches the port into raw mode. `subscriber` receives the events of
    /// all raw transfers until `Deinit`.
    Init {
        /// Line settings and PIO/DMA selection.
        config: RawConfig,
        /// Receiver of the completion events.
        subscriber: &'static dyn UartNotify,
    },
    /// Switches the port back into console mode.
    Deinit,
    /// Starts sending `len` bytes from `buf`.
    Transmit {
        /// First byte to send.
        buf: *const u8,
        /// Number of bytes.
        len: usize,
    },
    /// Starts receiving `len` bytes into `buf`.
    Receive {
        /// Destination buffer.
        buf: *mut u8,
        /// Number of bytes.
        len: usize,
    },
    /// Aborts all transfers and flushes the FIFOs.
    Reset,
    /// Queries the number of bytes received by the current receive transfer.
    GetRxLen,
}

impl Command {
    /// [`Command::Transmit`] of a whole slice.
    #[must_use]
    pub const fn transmit(buf: &[u8]) -> Self {
        Self::Transmit {
            buf: buf.as_ptr(),
            len: buf.len(),
        }
    }

    /// [`Command::Receive`] into a whole slice.
    #[must_use]
    pub const fn receive(buf: &mut [u8]) -> Self {
        Self::Receive {
            buf: buf.as_mut_ptr(),
            len: buf.len(),
        }
    }

    /// Numeric code of this command.
    #[must_use]
    pub const fn code(&self) -> CommandCode {
        match self {
            Self::SetLine(_) => CommandCode::SetLine,
            Self::Init { .. } => CommandCode::Init,
            Self::Deinit => CommandCode::Deinit,
            Self::Transmit { .. } => CommandCode::Transmit,
            Self::Receive { .. } => CommandCode::Receive,
            Self::Reset => CommandCode::Reset,
            Self::GetRxLen => CommandCode::GetRxLen,
        }
    }
}

impl Debug for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetLine(line) => f.debug_tuple("SetLine").field(line).finish(),
            Self::Init { config, .. } => f
                .debug_struct("Init")
                .field("config", config)
                .finish_non_exhaustive(),
            Self::Deinit => f.write_str("Deinit"),
            Self::Transmit { buf, len } => f
                .debug_struct("Transmit")
                .field("buf", buf)
                .field("len", len)
                .finish(),
            Self::Receive { buf, len } => f
                .debug_struct("Receive")
                .field("buf", buf)
                .field("len", len)
                .finish(),
            Self::Reset => f.write_str("Reset"),
            Self::GetRxLen => f.write_str("GetRxLen"),
        }
    }
}

/// Successful outcome of a [`Command`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Response {
    /// The command was executed, or the transfer was accepted.
    Done,
    /// Answer to [`Command::GetRxLen`].
    RxLen(usize),
}

impl<B: Backend, D: DmaController> Port<B, D> {
    pub(crate) fn execute(&mut self, command: Command) -> Result<Response, Error> {
        match command {
            Command::SetLine(line) => self.set_line(&line)?,
            Command::Init { config, subscriber } => self.raw_init(&config, subscriber)?,
            Command::Deinit => self.raw_deinit()?,
            Command::Transmit { buf, len } => self.transmit(buf, len)?,
            Command::Receive { buf, len } => self.receive(buf, len)?,
            Command::Reset => self.raw_reset()?,
            Command::GetRxLen => return self.rx_len().map(Response::RxLen),
        }
        Ok(Response::Done)
    }
}
