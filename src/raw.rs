// SPDX-License-Identifier: MIT OR Apache-2.0

//! Raw block-transfer personality.
//!
//! A port in raw mode moves caller-provided buffers instead of a byte
//! stream. There is at most one transfer per direction. A transfer is either
//! moved by programmed I/O from the interrupt handler (PIO), or handed to the
//! DMA controller. The end of every transfer, successful or not, is reported
//! to the subscriber registered with `INIT`.

use crate::backend::Backend;
use crate::config::{LineConfig, RawConfig};
use crate::dma::{DmaChannel, DmaContext, DmaController, Direction, DmaStatus, errata_preroll};
use crate::error::{Error, LineError};
use crate::fifo::FifoState;
use crate::port::{Mode, Port};
use crate::spec::registers::{FCR, IER};
use crate::Uart;
use core::fmt::{self, Debug, Formatter};
use core::ptr;

/// Completion event of a raw transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UartEvent {
    /// The transmit buffer was sent completely.
    TxComplete,
    /// The receive buffer was filled completely.
    RxComplete,
    /// A receive line error terminated the receive transfer. Any
    /// combination of flags can be set, including none if the hardware
    /// reported the interrupt without an error indication.
    Error(LineError),
}

/// Subscriber for raw transfer events. One per port.
///
/// Events are delivered from interrupt context (the UART's or the DMA
/// controller's), after the port is unlocked again. Starting a new transfer
/// from within [`UartNotify::notify`] is allowed.
pub trait UartNotify: Sync {
    /// Called once per finished transfer.
    fn notify(&self, port: usize, event: UartEvent);
}

impl<F: Fn(usize, UartEvent) + Sync> UartNotify for F {
    fn notify(&self, port: usize, event: UartEvent) {
        self(port, event);
    }
}

/// An event ready for delivery, computed with the port locked and delivered
/// after unlocking it.
#[derive(Clone, Copy)]
pub(crate) struct Notification {
    subscriber: &'static dyn UartNotify,
    port: usize,
    event: UartEvent,
}

impl Notification {
    #[cfg(test)]
    pub(crate) const fn event(&self) -> UartEvent {
        self.event
    }

    pub(crate) fn deliver(self) {
        self.subscriber.notify(self.port, self.event);
    }
}

impl Debug for Notification {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notification")
            .field("port", &self.port)
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

/// Borrowed buffer of one direction and how far it got.
///
/// The buffer is only dereferenced while `offset < len`. The empty transfer
/// has `offset == len == 0` and counts as finished.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Transfer {
    buf: *mut u8,
    len: usize,
    offset: usize,
}

// SAFETY: The buffer is handed over by the caller of `Driver::ioctl`, whose
// contract keeps it valid and unaliased until the transfer ends, regardless
// of the context the transfer is finished from.
unsafe impl Send for Transfer {}

impl Transfer {
    pub(crate) const EMPTY: Self = Self {
        buf: ptr::null_mut(),
        len: 0,
        offset: 0,
    };

    const fn new(buf: *mut u8, len: usize) -> Self {
        Self {
            buf,
            len,
            offset: 0,
        }
    }

    pub(crate) const fn is_done(&self) -> bool {
        self.offset == self.len
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    pub(crate) const fn offset(&self) -> usize {
        self.offset
    }

    /// Marks the whole buffer transferred.
    const fn finish(&mut self) {
        self.offset = self.len;
    }

    /// Ends the transfer early after `transferred` bytes.
    fn terminate_at(&mut self, transferred: usize) {
        self.offset = transferred.min(self.len);
        self.len = self.offset;
    }

    /// Pushes bytes into the transmit FIFO until the transfer is done or the
    /// FIFO is full.
    pub(crate) fn fill_fifo<B: Backend>(&mut self, uart: &mut Uart<B>, fifo: &mut FifoState) {
        while !self.is_done() && fifo.record_push() {
            // SAFETY: `offset < len`, and the buffer is valid for `len` bytes
            // while the transfer is in flight.
            let byte = unsafe { self.buf.add(self.offset).read() };
            uart.write_thr(byte);
            self.offset += 1;
        }
    }

    /// Moves bytes from the receive FIFO into the buffer until the transfer
    /// is done or the FIFO is empty.
    pub(crate) fn drain_fifo<B: Backend>(&mut self, uart: &mut Uart<B>) {
        while !self.is_done() {
            let Some(byte) = uart.try_receive_byte() else {
                break;
            };
            // SAFETY: `offset < len`, and the buffer is valid for writes of
            // `len` bytes while the transfer is in flight.
            unsafe { self.buf.add(self.offset).write(byte) };
            self.offset += 1;
        }
    }
}

/// How the transfers of a raw port are moved.
#[derive(Debug)]
pub(crate) enum Submode {
    Pio,
    Dma { tx: DmaContext, rx: DmaContext },
}

/// State of a port in raw mode.
pub(crate) struct RawAccess {
    pub(crate) config: RawConfig,
    /// Line settings to restore on `DEINIT`.
    pub(crate) previous_line: LineConfig,
    pub(crate) subscriber: &'static dyn UartNotify,
    pub(crate) tx: Transfer,
    pub(crate) rx: Transfer,
    pub(crate) submode: Submode,
}

impl RawAccess {
    pub(crate) const fn notification(&self, port: usize, event: UartEvent) -> Notification {
        Notification {
            subscriber: self.subscriber,
            port,
            event,
        }
    }

    /// Whether a transfer in either direction is in flight.
    pub(crate) const fn is_active(&self) -> bool {
        !self.tx.is_done() || !self.rx.is_done()
    }
}

impl Debug for RawAccess {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawAccess")
            .field("config", &self.config)
            .field("tx", &self.tx)
            .field("rx", &self.rx)
            .field("submode", &self.submode)
            .finish_non_exhaustive()
    }
}

impl<B: Backend, D: DmaController> Port<B, D> {
    /// Switches the port into raw mode (`INIT`).
    pub(crate) fn raw_init(
        &mut self,
        config: &RawConfig,
        subscriber: &'static dyn UartNotify,
    ) -> Result<(), Error> {
        if self.config.console {
            log::error!("uart{}: already used as console port", self.id);
            return Err(Error::Busy);
        }
        if matches!(self.mode, Mode::Raw(_)) {
            log::warn!("uart{}: raw access already initialized", self.id);
            return Err(Error::Busy);
        }
        if !self.tx.is_empty() || !self.uart.tx_empty() {
            return Err(Error::Busy);
        }

        let (mut submode, fifo_ctl) = if config.dma {
            let (Some(_), Some(requests)) = (&self.dma, self.config.dma_requests) else {
                log::warn!("uart{}: DMA is not enabled", self.id);
                return Err(Error::NotFound);
            };
            let data = self.uart.data_register_address();
            let submode = Submode::Dma {
                tx: DmaContext::tx(requests, data),
                rx: DmaContext::rx(requests, data),
            };
            (submode, FCR::BASE_SETUP | FCR::DMA_SETUP)
        } else {
            (Submode::Pio, FCR::BASE_SETUP)
        };

        let previous_line = self.line;
        let previous_fifo_ctl = self.fifo_ctl;
        self.apply_line(&config.line, fifo_ctl)?;

        let preroll = match (&mut submode, &self.dma) {
            (Submode::Dma { tx, rx }, Some(dma)) => errata_preroll(dma, rx, tx),
            _ => Ok(()),
        };
        if let Err(err) = preroll {
            self.apply_line(&previous_line, previous_fifo_ctl)?;
            return Err(err);
        }

        self.uart.set_ier(IER::LINE_STATUS);
        self.rx.clear();
        self.mode = Mode::Raw(RawAccess {
            config: *config,
            previous_line,
            subscriber,
            tx: Transfer::EMPTY,
            rx: Transfer::EMPTY,
            submode,
        });
        log::info!(
            "uart{}: raw access enabled ({} mode)",
            self.id,
            if config.dma { "DMA" } else { "PIO" }
        );
        Ok(())
    }

    /// Leaves raw mode (`DEINIT`). Outstanding transfers are dropped as by
    /// `RESET`, and the line settings from before `INIT` are restored.
    pub(crate) fn raw_deinit(&mut self) -> Result<(), Error> {
        self.raw_reset()?;
        let Mode::Raw(raw) = core::mem::replace(&mut self.mode, Mode::Console) else {
            return Err(Error::Permission);
        };
        self.apply_line(&raw.previous_line, FCR::BASE_SETUP)?;
        log::info!("uart{}: raw access disabled", self.id);
        Ok(())
    }

    /// Starts an asynchronous transmit of `len` bytes at `buf` (`TRANSMIT`).
    pub(crate) fn transmit(&mut self, buf: *const u8, len: usize) -> Result<(), Error> {
        let Mode::Raw(raw) = &mut self.mode else {
            return Err(Error::Permission);
        };
        if buf.is_null() || len == 0 {
            return Err(Error::InvalidArgument);
        }
        if !raw.tx.is_done() {
            return Err(Error::InProgress);
        }

        match (&mut raw.submode, &self.dma) {
            (Submode::Dma { tx, .. }, Some(dma)) => {
                tx.start(dma, self.id, buf as usize, len)?;
                raw.tx = Transfer::new(buf.cast_mut(), len);
            }
            (Submode::Dma { .. }, None) => return Err(Error::NotFound),
            (Submode::Pio, _) => {
                raw.tx = Transfer::new(buf.cast_mut(), len);
                raw.tx.fill_fifo(&mut self.uart, &mut self.fifo);
                self.uart.enable_interrupts(IER::THR_EMPTY);
            }
        }
        Ok(())
    }

    /// Starts an asynchronous receive of `len` bytes into `buf` (`RECEIVE`).
    pub(crate) fn receive(&mut self, buf: *mut u8, len: usize) -> Result<(), Error> {
        let Mode::Raw(raw) = &mut self.mode else {
            return Err(Error::Permission);
        };
        if buf.is_null() || len == 0 {
            return Err(Error::InvalidArgument);
        }
        if !raw.rx.is_done() {
            return Err(Error::InProgress);
        }

        match (&mut raw.submode, &self.dma) {
            (Submode::Dma { rx, .. }, Some(dma)) => {
                rx.start(dma, self.id, buf as usize, len)?;
                raw.rx = Transfer::new(buf, len);
            }
            (Submode::Dma { .. }, None) => return Err(Error::NotFound),
            (Submode::Pio, _) => {
                raw.rx = Transfer::new(buf, len);
                self.uart.enable_interrupts(IER::RECEIVE_DATA);
            }
        }
        Ok(())
    }

    /// Aborts everything and quiesces the port (`RESET`).
    ///
    /// Afterwards both transfers are empty and no DMA channel is held.
    pub(crate) fn raw_reset(&mut self) -> Result<(), Error> {
        let Mode::Raw(raw) = &mut self.mode else {
            return Err(Error::Permission);
        };

        self.uart
            .disable_interrupts(IER::RECEIVE_DATA | IER::THR_EMPTY);
        raw.tx = Transfer::EMPTY;
        raw.rx = Transfer::EMPTY;
        if let (Submode::Dma { tx, rx }, Some(dma)) = (&mut raw.submode, &self.dma) {
            tx.abort(dma);
            rx.abort(dma);
        }
        self.uart.drain_rx();
        self.uart.set_fcr(self.fifo_ctl | FCR::FIFO_RESET);
        self.fifo.drained();
        Ok(())
    }

    /// Number of bytes received so far by the current receive transfer
    /// (`GET_RX_LEN`).
    pub(crate) fn rx_len(&self) -> Result<usize, Error> {
        let Mode::Raw(raw) = &self.mode else {
            return Err(Error::Permission);
        };
        let in_flight = match (&raw.submode, &self.dma) {
            (Submode::Dma { rx, .. }, Some(dma)) => rx.transferred(dma),
            _ => None,
        };
        Ok(in_flight.unwrap_or(raw.rx.offset()))
    }

    /// Terminates the receive transfer after a line error. Any RX DMA is
    /// aborted first, so the transfer keeps what arrived until then.
    pub(crate) fn abort_rx(&mut self) {
        let Mode::Raw(raw) = &mut self.mode else {
            return;
        };
        let transferred = match (&mut raw.submode, &self.dma) {
            (Submode::Dma { rx, .. }, Some(dma)) => rx.abort(dma),
            _ => None,
        };
        let transferred = transferred.unwrap_or(raw.rx.offset());
        raw.rx.terminate_at(transferred);
    }

    /// Handles a DMA completion for this port.
    ///
    /// Only [`DmaStatus::Done`] for the channel currently held in
    /// `direction` finishes a transfer. Anything else, such as the late
    /// completion of an aborted channel, is ignored.
    pub(crate) fn dma_complete(
        &mut self,
        direction: Direction,
        channel: DmaChannel,
        status: DmaStatus,
    ) -> Option<Notification> {
        if status != DmaStatus::Done {
            return None;
        }
        let Mode::Raw(raw) = &mut self.mode else {
            return None;
        };
        let Submode::Dma { tx, rx } = &mut raw.submode else {
            return None;
        };
        let (ctx, transfer, event) = match direction {
            Direction::Tx => (tx, &mut raw.tx, UartEvent::TxComplete),
            Direction::Rx => (rx, &mut raw.rx, UartEvent::RxComplete),
        };
        if !ctx.complete(channel) {
            return None;
        }
        transfer.finish();
        Some(raw.notification(self.id, event))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::EventLog;
    use super::*;
    use crate::config::{DmaRequestLines, PortConfig};
    use crate::dma::testing::{DmaOp, RecordingDma};
    use crate::dma::DmaError;
    use crate::sim::{self, SimUart};
    use crate::spec::registers::{InterruptId, LSR};

    fn pio_port(depth: usize) -> (SimUart, Port<SimUart, &'static RecordingDma>, &'static EventLog) {
        let (sim, mut port) = sim::port(depth, None, sim::config());
        let log = EventLog::leak();
        port.raw_init(&RawConfig::default(), log).unwrap();
        (sim, port, log)
    }

    fn dma_port(dma: &RecordingDma) -> (SimUart, Port<SimUart, &RecordingDma>, &'static EventLog) {
        let config = PortConfig {
            dma_requests: Some(DmaRequestLines { tx: 2, rx: 3 }),
            ..sim::config()
        };
        let (sim, mut port) = sim::port(16, Some(dma), config);
        let log = EventLog::leak();
        let raw = RawConfig {
            dma: true,
            ..RawConfig::default()
        };
        port.raw_init(&raw, log).unwrap();
        (sim, port, log)
    }

    #[test]
    fn test_init_guards() {
        let (_sim, mut port) = sim::port::<&RecordingDma>(
            16,
            None,
            PortConfig {
                console: true,
                ..sim::config()
            },
        );
        let log = EventLog::leak();
        assert_eq!(port.raw_init(&RawConfig::default(), log), Err(Error::Busy));

        let (sim, mut port) = sim::port::<&RecordingDma>(16, None, sim::config());
        sim.set_tx_idle(false);
        assert_eq!(port.raw_init(&RawConfig::default(), log), Err(Error::Busy));
        sim.set_tx_idle(true);
        port.raw_init(&RawConfig::default(), log).unwrap();
        assert_eq!(port.raw_init(&RawConfig::default(), log), Err(Error::Busy));

        let dma = RawConfig {
            dma: true,
            ..RawConfig::default()
        };
        let (_sim, mut port) = sim::port::<&RecordingDma>(16, None, sim::config());
        assert_eq!(port.raw_init(&dma, log), Err(Error::NotFound));
    }

    #[test]
    fn test_operations_require_raw_mode() {
        let (_sim, mut port) = sim::port::<&RecordingDma>(16, None, sim::config());
        let buf = [0_u8; 4];
        assert_eq!(port.transmit(buf.as_ptr(), 4), Err(Error::Permission));
        assert_eq!(port.raw_reset(), Err(Error::Permission));
        assert_eq!(port.rx_len(), Err(Error::Permission));
        assert_eq!(port.raw_deinit(), Err(Error::Permission));
    }

    #[test]
    fn test_init_arms_line_status_only() {
        let (sim, port, _log) = pio_port(16);
        assert_eq!(sim.reg(crate::spec::registers::offsets::IER), IER::LINE_STATUS.bits());
        assert!(matches!(port.mode, Mode::Raw(_)));
    }

    /// 10 bytes into an empty 16 byte FIFO go out synchronously; the next
    /// THR-empty interrupt completes the transfer.
    #[test]
    fn test_pio_transmit_fits_fifo() {
        let (sim, mut port, log) = pio_port(16);
        let buf = *b"0123456789";
        port.transmit(buf.as_ptr(), buf.len()).unwrap();

        assert_eq!(sim.tx_bytes(), b"0123456789");
        assert_eq!(port.fifo.fill(), 10);
        assert!(port.uart.ier().contains(IER::THR_EMPTY));

        sim.raise(InterruptId::ThrEmpty);
        port.handle_interrupt().unwrap().deliver();
        assert_eq!(log.events(), [(0, UartEvent::TxComplete)]);
        assert!(!port.uart.ier().contains(IER::THR_EMPTY));
        assert_eq!(port.fifo.fill(), 0);
    }

    #[test]
    fn test_pio_transmit_in_progress() {
        let (sim, mut port, _log) = pio_port(16);
        let buf = [0xa5_u8; 40];
        port.transmit(buf.as_ptr(), buf.len()).unwrap();
        assert_eq!(sim.tx_bytes().len(), 16);
        assert!(port.fifo.is_full());

        let other = [0_u8; 4];
        assert_eq!(port.transmit(other.as_ptr(), 4), Err(Error::InProgress));
        let Mode::Raw(raw) = &port.mode else {
            unreachable!()
        };
        assert_eq!(raw.tx.offset(), 16);
        assert_eq!(raw.tx.len(), 40);

        sim.raise(InterruptId::ThrEmpty);
        assert!(port.handle_interrupt().is_none());
        assert_eq!(sim.tx_bytes().len(), 32);
        assert!(port.handle_interrupt().is_none());
        assert_eq!(sim.tx_bytes().len(), 40);
        assert_eq!(
            port.handle_interrupt().map(|n| n.event()),
            Some(UartEvent::TxComplete)
        );
        port.transmit(other.as_ptr(), 4).unwrap();
    }

    #[test]
    fn test_pio_receive() {
        let (sim, mut port, log) = pio_port(16);
        let mut buf = [0_u8; 6];
        port.receive(buf.as_mut_ptr(), buf.len()).unwrap();
        assert!(port.uart.ier().contains(IER::RECEIVE_DATA));

        sim.inject_rx(b"abcd");
        sim.raise(InterruptId::ReceiveData);
        assert!(port.handle_interrupt().is_none());
        assert_eq!(port.rx_len(), Ok(4));
        assert_eq!(port.receive(buf.as_mut_ptr(), 6), Err(Error::InProgress));

        // Receive timeout with an armed transfer delivers data, too.
        sim.inject_rx(b"efgh");
        sim.raise(InterruptId::ReceiveTimeout);
        port.handle_interrupt().unwrap().deliver();
        assert_eq!(log.events(), [(0, UartEvent::RxComplete)]);
        assert_eq!(port.rx_len(), Ok(6));
        assert!(!port.uart.ier().contains(IER::RECEIVE_DATA));
        assert_eq!(&buf, b"abcdef");
        assert_eq!(sim.rx_pending(), 2);

        // Without a transfer, stray bytes are discarded.
        sim.raise(InterruptId::ReceiveTimeout);
        assert!(port.handle_interrupt().is_none());
        assert_eq!(sim.rx_pending(), 0);
    }

    #[test]
    fn test_zero_length_transfer_rejected() {
        let (_sim, mut port, _log) = pio_port(16);
        let mut buf = [0_u8; 1];
        assert_eq!(port.transmit(buf.as_ptr(), 0), Err(Error::InvalidArgument));
        assert_eq!(port.receive(buf.as_mut_ptr(), 0), Err(Error::InvalidArgument));
        assert_eq!(
            port.receive(ptr::null_mut(), 4),
            Err(Error::InvalidArgument)
        );
    }

    #[test]
    fn test_dma_init_sets_fifo_and_runs_errata() {
        let dma = RecordingDma::default();
        let (sim, port, _log) = dma_port(&dma);
        assert_eq!(
            sim.fcr_writes().last(),
            Some(&(FCR::BASE_SETUP | FCR::DMA_SETUP | FCR::FIFO_RESET))
        );
        assert_eq!(port.fifo_ctl, FCR::BASE_SETUP | FCR::DMA_SETUP);
        assert_eq!(dma.copies().len(), 2);
        assert_eq!(dma.aborts().len(), 2);
    }

    #[test]
    fn test_dma_init_failure_rolls_back() {
        let dma = RecordingDma::default();
        *dma.fail_copy.borrow_mut() = Some(DmaError::NoChannel);
        let config = PortConfig {
            dma_requests: Some(DmaRequestLines { tx: 2, rx: 3 }),
            ..sim::config()
        };
        let (_sim, mut port) = sim::port(16, Some(&dma), config);
        let raw = RawConfig {
            dma: true,
            ..RawConfig::default()
        };
        assert_eq!(
            port.raw_init(&raw, EventLog::leak()),
            Err(Error::Dma(DmaError::NoChannel))
        );
        assert!(matches!(port.mode, Mode::Console));
        assert_eq!(port.fifo_ctl, FCR::BASE_SETUP);
        assert_eq!(port.uart.ier(), IER::BASELINE);
    }

    #[test]
    fn test_dma_transmit_and_completion() {
        let dma = RecordingDma::default();
        let (sim, mut port, log) = dma_port(&dma);
        let buf = [7_u8; 32];
        port.transmit(buf.as_ptr(), buf.len()).unwrap();
        assert!(sim.tx_bytes().is_empty());
        assert!(!port.uart.ier().contains(IER::THR_EMPTY));
        assert_eq!(port.transmit(buf.as_ptr(), 8), Err(Error::InProgress));

        let Some(DmaOp::Copy {
            channel,
            descriptor,
            ..
        }) = dma.copies().last().copied()
        else {
            unreachable!()
        };
        assert_eq!(descriptor.src_addr, buf.as_ptr() as usize);
        assert_eq!(descriptor.dst_addr, 0xf020_0020);
        assert_eq!(descriptor.len, 32);

        // Statuses other than done change nothing.
        assert!(port.dma_complete(Direction::Tx, channel, DmaStatus::Aborted).is_none());
        assert!(port.dma_complete(Direction::Rx, channel, DmaStatus::Done).is_none());

        port.dma_complete(Direction::Tx, channel, DmaStatus::Done)
            .unwrap()
            .deliver();
        assert_eq!(log.events(), [(0, UartEvent::TxComplete)]);
        port.transmit(buf.as_ptr(), 8).unwrap();
    }

    /// An overrun while a DMA receive of 64 bytes is in flight aborts the
    /// channel and keeps the byte count reached before.
    #[test]
    fn test_dma_receive_line_error() {
        let dma = RecordingDma::default();
        let (sim, mut port, log) = dma_port(&dma);
        let mut buf = [0_u8; 64];
        port.receive(buf.as_mut_ptr(), buf.len()).unwrap();
        let Some(DmaOp::Copy { channel, .. }) = dma.copies().last().copied() else {
            unreachable!()
        };

        *dma.remaining.borrow_mut() = 64 - 20;
        assert_eq!(port.rx_len(), Ok(20));

        sim.set_line_errors(LSR::OVERRUN_ERROR);
        sim.raise(InterruptId::LineStatus);
        port.handle_interrupt().unwrap().deliver();

        assert_eq!(dma.aborts().last(), Some(&channel));
        assert_eq!(log.events(), [(0, UartEvent::Error(LineError::OVERRUN))]);
        *dma.remaining.borrow_mut() = 0;
        assert_eq!(port.rx_len(), Ok(20));
        assert!(!port.uart.ier().contains(IER::RECEIVE_DATA));
        assert!(
            sim.fcr_writes()
                .last()
                .unwrap()
                .contains(FCR::RX_FIFO_RESET)
        );
        assert_eq!(port.stats.line_errors, 1);

        // The aborted channel's late completion is ignored.
        assert!(port.dma_complete(Direction::Rx, channel, DmaStatus::Done).is_none());
        // A new receive may start right away.
        port.receive(buf.as_mut_ptr(), buf.len()).unwrap();
    }

    #[test]
    fn test_reset_clears_everything() {
        let dma = RecordingDma::default();
        let (sim, mut port, log) = dma_port(&dma);
        let tx = [1_u8; 8];
        let mut rx = [0_u8; 8];
        port.transmit(tx.as_ptr(), tx.len()).unwrap();
        port.receive(rx.as_mut_ptr(), rx.len()).unwrap();
        let aborts_before = dma.aborts().len();
        sim.inject_rx(b"junk");

        port.raw_reset().unwrap();
        let Mode::Raw(raw) = &port.mode else {
            unreachable!()
        };
        assert_eq!((raw.tx.offset(), raw.tx.len()), (0, 0));
        assert_eq!((raw.rx.offset(), raw.rx.len()), (0, 0));
        let Submode::Dma { tx, rx } = &raw.submode else {
            unreachable!()
        };
        assert_eq!(tx.channel(), None);
        assert_eq!(rx.channel(), None);
        assert_eq!(dma.aborts().len(), aborts_before + 2);
        assert_eq!(sim.rx_pending(), 0);
        assert!(log.events().is_empty());

        // Idempotent.
        port.raw_reset().unwrap();
        assert_eq!(dma.aborts().len(), aborts_before + 2);
    }

    #[test]
    fn test_deinit_restores_console() {
        let dma = RecordingDma::default();
        let (sim, mut port, _log) = dma_port(&dma);
        port.raw_deinit().unwrap();
        assert!(matches!(port.mode, Mode::Console));
        assert_eq!(port.fifo_ctl, FCR::BASE_SETUP);
        assert!(!sim.fcr_writes().last().unwrap().contains(FCR::DMA_ENABLE));
        assert_eq!(port.uart.ier(), IER::BASELINE);
        assert_eq!(port.raw_deinit(), Err(Error::Permission));
    }
}
