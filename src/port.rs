// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-instance port state and the console byte-stream engine.

use crate::backend::Backend;
use crate::channel::ByteChannel;
use crate::config::{CHANNEL_CAPACITY, LineConfig, PortConfig};
use crate::dma::DmaController;
use crate::driver::PortStats;
use crate::error::Error;
use crate::fifo::FifoState;
use crate::pm::SavedRegisters;
use crate::raw::RawAccess;
use crate::spec::registers::{FCR, IER};
use crate::Uart;

/// The personality a port currently runs.
#[derive(Debug)]
pub(crate) enum Mode {
    /// Interrupt-driven byte stream through the console channels.
    Console,
    /// Block transfers.
    Raw(RawAccess),
}

/// Readiness of the console byte stream, as reported by
/// [`Driver::console_poll`].
///
/// [`Driver::console_poll`]: crate::Driver::console_poll
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Readiness {
    /// At least one received byte is waiting.
    pub readable: bool,
    /// At least one byte can be queued for transmission.
    pub writable: bool,
}

/// One physical UART instance.
#[derive(Debug)]
pub(crate) struct Port<B: Backend, D: DmaController> {
    pub(crate) id: usize,
    pub(crate) uart: Uart<B>,
    pub(crate) config: PortConfig,
    pub(crate) dma: Option<D>,
    pub(crate) fifo: FifoState,
    /// FIFO control value without the self-clearing reset bits.
    pub(crate) fifo_ctl: FCR,
    pub(crate) line: LineConfig,
    pub(crate) mode: Mode,
    pub(crate) tx: ByteChannel<CHANNEL_CAPACITY>,
    pub(crate) rx: ByteChannel<CHANNEL_CAPACITY>,
    pub(crate) saved: Option<SavedRegisters>,
    pub(crate) stats: PortStats,
}

impl<B: Backend, D: DmaController> Port<B, D> {
    /// Brings up a freshly set-up port in console mode.
    pub(crate) fn attach(
        id: usize,
        mut uart: Uart<B>,
        config: PortConfig,
        dma: Option<D>,
    ) -> Result<Self, Error> {
        let depth = uart.fifo_depth();
        let mut port = Self {
            id,
            uart,
            config,
            dma,
            fifo: FifoState::new(depth),
            fifo_ctl: FCR::BASE_SETUP,
            line: LineConfig::default(),
            mode: Mode::Console,
            tx: ByteChannel::new(),
            rx: ByteChannel::new(),
            saved: None,
            stats: PortStats::default(),
        };
        let line = config.console_line();
        port.apply_line(&line, FCR::BASE_SETUP)?;
        log::debug!(
            "uart{id}: fifo depth={depth}, clock={}Hz, console={}",
            config.clock.rate_hz,
            config.console
        );
        Ok(port)
    }

    /// Quiesces the hardware and hands the register block back.
    pub(crate) fn shutdown(mut self) -> Uart<B> {
        if matches!(self.mode, Mode::Raw(_)) {
            // Only fails outside of raw mode.
            let _ = self.raw_reset();
        }
        self.uart.set_ier(IER::empty());
        self.uart.set_fcr(FCR::TX_FIFO_RESET);
        self.uart.set_fcr(FCR::empty());
        self.uart
    }

    /// Programs the line and records the settings.
    pub(crate) fn apply_line(&mut self, line: &LineConfig, fifo_ctl: FCR) -> Result<(), Error> {
        self.uart
            .program_line(self.config.clock.rate_hz, line, fifo_ctl)?;
        self.line = *line;
        self.fifo_ctl = fifo_ctl;
        self.fifo.drained();
        Ok(())
    }

    /// `SET_LINE`: reprograms the line settings.
    ///
    /// In raw mode this is refused while a transfer is in flight, and only
    /// line status interrupts stay armed afterwards.
    pub(crate) fn set_line(&mut self, line: &LineConfig) -> Result<(), Error> {
        if matches!(&self.mode, Mode::Raw(raw) if raw.is_active()) {
            return Err(Error::Busy);
        }
        self.apply_line(line, self.fifo_ctl)?;
        if matches!(self.mode, Mode::Raw(_)) {
            self.uart.set_ier(IER::LINE_STATUS);
        }
        Ok(())
    }

    /* ----- Console -------------------------------------------------------- */

    fn require_console(&self) -> Result<(), Error> {
        match self.mode {
            Mode::Console => Ok(()),
            Mode::Raw(_) => Err(Error::Busy),
        }
    }

    /// Pushes one byte straight into the transmit FIFO.
    ///
    /// Refused with [`Error::WouldBlock`] while the FIFO is full, and with
    /// [`Error::Busy`] in raw mode. The THR-empty interrupt is armed once the
    /// FIFO fills up, so the fill level is reset when it drains.
    pub(crate) fn push_byte(&mut self, byte: u8) -> Result<(), Error> {
        self.require_console()?;
        if !self.fifo.record_push() {
            return Err(Error::WouldBlock);
        }
        self.uart.write_thr(byte);
        if self.fifo.is_full() {
            self.uart.enable_interrupts(IER::THR_EMPTY);
        }
        Ok(())
    }

    /// Primes the transmit FIFO from the TX channel if the THR-empty
    /// interrupt is stopped. The interrupt handler takes over from there.
    pub(crate) fn start_tx(&mut self) -> Result<(), Error> {
        self.require_console()?;
        if self.uart.ier().contains(IER::THR_EMPTY) {
            return Ok(());
        }
        while !self.fifo.is_full() {
            let Some(byte) = self.tx.try_pop() else {
                break;
            };
            self.uart.write_thr(byte);
            self.fifo.record_push();
        }
        if self.fifo.fill() > 0 || !self.tx.is_empty() {
            self.uart.enable_interrupts(IER::THR_EMPTY);
        }
        Ok(())
    }

    /// Queues as many bytes as fit into the TX channel.
    pub(crate) fn console_write(&mut self, bytes: &[u8]) -> Result<usize, Error> {
        self.require_console()?;
        if bytes.is_empty() {
            return Ok(0);
        }
        let n = self.tx.push_slice(bytes);
        if n == 0 {
            return Err(Error::WouldBlock);
        }
        self.start_tx()?;
        Ok(n)
    }

    /// Takes received bytes out of the RX channel.
    pub(crate) fn console_read(&mut self, buffer: &mut [u8]) -> Result<usize, Error> {
        self.require_console()?;
        if buffer.is_empty() {
            return Ok(0);
        }
        match self.rx.pop_slice(buffer) {
            0 => Err(Error::WouldBlock),
            n => Ok(n),
        }
    }

    pub(crate) const fn console_poll(&self) -> Readiness {
        Readiness {
            readable: !self.rx.is_empty(),
            writable: !self.tx.is_full(),
        }
    }
}
