// SPDX-License-Identifier: MIT OR Apache-2.0

//! Register save/restore across a suspend/resume cycle.
//!
//! The register block may lose its content while the system sleeps. Suspend
//! is only granted when no byte is in flight anywhere, since it would be
//! lost otherwise. In-flight DMA is not handled here: raw transfers must have
//! completed or been reset before.

use crate::backend::Backend;
use crate::dma::DmaController;
use crate::error::Error;
use crate::port::{Mode, Port};
use crate::spec::registers::{FCR, IER, LCR, LSR, MCR};

/// Register snapshot taken on suspend, consumed on resume.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct SavedRegisters {
    osc: u32,
    ier: IER,
    lcr: LCR,
    mcr: MCR,
    divisor: u16,
}

impl<B: Backend, D: DmaController> Port<B, D> {
    /// Whether a byte is anywhere between the channels and the wire.
    fn is_busy(&mut self) -> bool {
        if !self.tx.is_empty() || !self.rx.is_empty() || self.fifo.fill() > 0 {
            return true;
        }
        if matches!(&self.mode, Mode::Raw(raw) if raw.is_active()) {
            return true;
        }
        let lsr = self.uart.lsr();
        !lsr.contains(LSR::TRANSMITTER_EMPTY) || lsr.contains(LSR::DATA_READY)
    }

    /// Snapshots the registers, or refuses with [`Error::Busy`] without
    /// touching them if data is in flight.
    pub(crate) fn suspend(&mut self) -> Result<(), Error> {
        if self.is_busy() {
            log::warn!("uart{}: suspend refused, data in flight", self.id);
            return Err(Error::Busy);
        }
        self.saved = Some(SavedRegisters {
            osc: self.uart.osc(),
            ier: self.uart.ier(),
            lcr: self.uart.lcr(),
            mcr: self.uart.mcr(),
            divisor: self.uart.divisor(),
        });
        Ok(())
    }

    /// Restores the snapshot of the last successful suspend, if any.
    ///
    /// The FIFOs are reset first. The divisor goes through the divisor latch
    /// like on every line configuration, and the interrupt sources are armed
    /// last.
    pub(crate) fn resume(&mut self) {
        let Some(saved) = self.saved.take() else {
            return;
        };
        self.uart.set_osc(saved.osc);
        self.uart.set_fcr(self.fifo_ctl | FCR::FIFO_RESET);
        self.uart.set_lcr(saved.lcr);
        self.uart.set_mcr(saved.mcr);
        self.uart.set_divisor(saved.divisor);
        self.uart.set_ier(saved.ier);
        self.fifo.drained();
    }
}
