// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interrupt dispatch.
//!
//! The interrupt identification register is read once per invocation and the
//! reported source is handled by the branch of the current personality. Line
//! errors are never retried here: the console counts them, raw mode ends the
//! receive transfer and reports them.

use crate::backend::Backend;
use crate::dma::DmaController;
use crate::error::LineError;
use crate::port::{Mode, Port};
use crate::raw::{Notification, Transfer, UartEvent};
use crate::spec::registers::{FCR, IER, InterruptId, LSR};

impl<B: Backend, D: DmaController> Port<B, D> {
    /// Services one pending interrupt of this port.
    ///
    /// Returns the raw-mode event to deliver once the port is unlocked.
    pub(crate) fn handle_interrupt(&mut self) -> Option<Notification> {
        let id = self.uart.iir().interrupt_id()?;
        match self.mode {
            Mode::Console => {
                self.console_interrupt(id);
                None
            }
            Mode::Raw(_) => self.raw_interrupt(id),
        }
    }

    fn console_interrupt(&mut self, id: InterruptId) {
        match id {
            InterruptId::ThrEmpty => {
                self.fifo.drained();
                if self.tx.is_empty() {
                    self.uart.disable_interrupts(IER::THR_EMPTY);
                    return;
                }
                while !self.fifo.is_full() {
                    let Some(byte) = self.tx.try_pop() else {
                        break;
                    };
                    self.uart.write_thr(byte);
                    self.fifo.record_push();
                }
            }
            InterruptId::ReceiveData | InterruptId::ReceiveTimeout => {
                while let Some(byte) = self.uart.try_receive_byte() {
                    if self.rx.try_push(byte).is_err() {
                        self.stats.rx_dropped = self.stats.rx_dropped.saturating_add(1);
                    }
                }
            }
            InterruptId::LineStatus => {
                self.read_line_errors();
                self.reset_rx_fifo();
            }
            InterruptId::ModemStatus => {
                self.uart.msr();
            }
        }
    }

    fn raw_interrupt(&mut self, id: InterruptId) -> Option<Notification> {
        match id {
            InterruptId::ThrEmpty => {
                self.fifo.drained();
                let Mode::Raw(raw) = &mut self.mode else {
                    return None;
                };
                if raw.tx.is_done() {
                    self.uart.disable_interrupts(IER::THR_EMPTY);
                    if raw.tx.len() == 0 {
                        return None;
                    }
                    // Reported once.
                    raw.tx = Transfer::EMPTY;
                    return Some(raw.notification(self.id, UartEvent::TxComplete));
                }
                raw.tx.fill_fifo(&mut self.uart, &mut self.fifo);
                None
            }
            InterruptId::ReceiveData | InterruptId::ReceiveTimeout => {
                let Mode::Raw(raw) = &mut self.mode else {
                    return None;
                };
                if raw.rx.is_done() {
                    // Nobody asked for these bytes.
                    self.uart.drain_rx();
                    return None;
                }
                raw.rx.drain_fifo(&mut self.uart);
                if !raw.rx.is_done() {
                    return None;
                }
                self.uart.disable_interrupts(IER::RECEIVE_DATA);
                Some(raw.notification(self.id, UartEvent::RxComplete))
            }
            InterruptId::LineStatus => {
                let error = self.read_line_errors();
                self.abort_rx();
                self.uart.disable_interrupts(IER::RECEIVE_DATA);
                self.reset_rx_fifo();
                let Mode::Raw(raw) = &self.mode else {
                    return None;
                };
                Some(raw.notification(self.id, UartEvent::Error(error)))
            }
            InterruptId::ModemStatus => {
                self.uart.msr();
                None
            }
        }
    }

    /// Reads (and thereby clears) the line errors and counts them.
    fn read_line_errors(&mut self) -> LineError {
        let lsr = self.uart.lsr();
        if lsr.intersects(LSR::RX_ERRORS) {
            self.stats.line_errors = self.stats.line_errors.saturating_add(1);
        }
        let error = LineError::from_lsr(lsr);
        log::trace!("uart{}: line error: {error}", self.id);
        error
    }

    fn reset_rx_fifo(&mut self) {
        self.uart.set_fcr(self.fifo_ctl | FCR::RX_FIFO_RESET);
    }
}
