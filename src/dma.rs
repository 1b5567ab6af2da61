// SPDX-License-Identifier: MIT OR Apache-2.0

//! DMA channel management for raw transfers.
//!
//! The DMA engine itself is an external collaborator reached through the
//! [`DmaController`] contract: configure a hardware-handshaked copy, abort a
//! channel, and query how much of a transfer is still outstanding. This
//! module owns the per-direction [`DmaContext`] of a port, that is the channel
//! handle (valid only while a transfer is outstanding) and the transfer
//! control parameters.

use crate::config::DmaRequestLines;
use crate::error::Error;
use core::error::Error as CoreError;
use core::fmt::{self, Debug, Display, Formatter};
use core::ptr;

/// Direction of a transfer, seen from the CPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Memory to the transmit holding register.
    Tx,
    /// Receive buffer register to memory.
    Rx,
}

/// Handle of an acquired DMA channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DmaChannel(pub u8);

/// Address handshake mode of one side of a copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandshakeMode {
    /// Plain memory access.
    Normal,
    /// Paced by the peripheral's request line.
    Handshake,
}

/// How an address advances after each element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressControl {
    /// Address grows by the element width.
    Increment,
    /// Address shrinks by the element width.
    Decrement,
    /// Address stays the same (peripheral data registers).
    Fixed,
}

/// Width of a single element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransferWidth {
    /// 8 bit.
    Byte,
    /// 16 bit.
    HalfWord,
    /// 32 bit.
    Word,
}

/// Transfer control parameters of a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DmaControl {
    /// Handshake mode of the source.
    pub src_mode: HandshakeMode,
    /// Handshake mode of the destination.
    pub dst_mode: HandshakeMode,
    /// Request line pacing the source, if it is handshaked.
    pub src_request: u8,
    /// Request line pacing the destination, if it is handshaked.
    pub dst_request: u8,
    /// Source address control.
    pub src_addr_ctrl: AddressControl,
    /// Destination address control.
    pub dst_addr_ctrl: AddressControl,
    /// Source element width.
    pub src_width: TransferWidth,
    /// Destination element width.
    pub dst_width: TransferWidth,
    /// Elements moved per request.
    pub burst: u8,
}

/// A single copy job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DmaDescriptor {
    /// Bus address of the source.
    pub src_addr: usize,
    /// Bus address of the destination.
    pub dst_addr: usize,
    /// Number of elements.
    pub len: usize,
}

/// Token handed to the controller with a copy job. The controller gives it
/// back, together with the channel, to [`Driver::handle_dma_complete`].
///
/// [`Driver::handle_dma_complete`]: crate::Driver::handle_dma_complete
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DmaCompletion {
    /// Port instance that owns the transfer.
    pub port: usize,
    /// Direction of the transfer.
    pub direction: Direction,
}

/// Completion status reported by the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DmaStatus {
    /// The copy finished.
    Done,
    /// The channel was aborted.
    Aborted,
    /// The controller reported a bus error.
    Error,
    /// Spurious notification without a status.
    None,
}

/// Errors reported by a [`DmaController`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DmaError {
    /// All channels are in use.
    NoChannel,
    /// The controller rejected the control parameters or descriptor.
    InvalidConfig,
}

impl Display for DmaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoChannel => write!(f, "no free DMA channel"),
            Self::InvalidConfig => write!(f, "invalid DMA channel configuration"),
        }
    }
}

impl CoreError for DmaError {}

/// Channel-configure/abort/status contract of a DMA controller.
///
/// All methods take `&self`: a controller is shared between the ports wired
/// to it and is expected to synchronize internally.
pub trait DmaController {
    /// Starts a hardware-handshaked copy and returns the acquired channel.
    ///
    /// If `completion` is set, the controller must report the end of the copy
    /// from its interrupt handler by passing the token to
    /// [`Driver::handle_dma_complete`].
    ///
    /// [`Driver::handle_dma_complete`]: crate::Driver::handle_dma_complete
    fn copy_hw(
        &self,
        control: &DmaControl,
        descriptor: &DmaDescriptor,
        completion: Option<DmaCompletion>,
    ) -> Result<DmaChannel, DmaError>;

    /// Aborts a channel. The channel is free once this returns, although a
    /// late completion may still be reported.
    fn abort(&self, channel: DmaChannel);

    /// Number of elements of the current copy not yet transferred.
    fn remaining(&self, channel: DmaChannel) -> usize;

    /// Whether the controller can reach `len` bytes at `addr`.
    fn is_dma_capable(&self, addr: usize, len: usize) -> bool;
}

impl<T: DmaController + ?Sized> DmaController for &T {
    fn copy_hw(
        &self,
        control: &DmaControl,
        descriptor: &DmaDescriptor,
        completion: Option<DmaCompletion>,
    ) -> Result<DmaChannel, DmaError> {
        (**self).copy_hw(control, descriptor, completion)
    }

    fn abort(&self, channel: DmaChannel) {
        (**self).abort(channel);
    }

    fn remaining(&self, channel: DmaChannel) -> usize {
        (**self).remaining(channel)
    }

    fn is_dma_capable(&self, addr: usize, len: usize) -> bool {
        (**self).is_dma_capable(addr, len)
    }
}

/// Controller type for ports without DMA. It cannot be constructed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NoDma {}

impl DmaController for NoDma {
    fn copy_hw(
        &self,
        _control: &DmaControl,
        _descriptor: &DmaDescriptor,
        _completion: Option<DmaCompletion>,
    ) -> Result<DmaChannel, DmaError> {
        match *self {}
    }

    fn abort(&self, _channel: DmaChannel) {
        match *self {}
    }

    fn remaining(&self, _channel: DmaChannel) -> usize {
        match *self {}
    }

    fn is_dma_capable(&self, _addr: usize, _len: usize) -> bool {
        match *self {}
    }
}

/// DMA state of one transfer direction of a port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DmaContext {
    direction: Direction,
    channel: Option<DmaChannel>,
    control: DmaControl,
    descriptor: DmaDescriptor,
}

impl DmaContext {
    /// Context for transmit: memory (incrementing) to the fixed THR, paced by
    /// the TX request line.
    #[must_use]
    pub const fn tx(requests: DmaRequestLines, thr_addr: usize) -> Self {
        Self {
            direction: Direction::Tx,
            channel: None,
            control: DmaControl {
                src_mode: HandshakeMode::Normal,
                dst_mode: HandshakeMode::Handshake,
                src_request: 0,
                dst_request: requests.tx,
                src_addr_ctrl: AddressControl::Increment,
                dst_addr_ctrl: AddressControl::Fixed,
                src_width: TransferWidth::Byte,
                dst_width: TransferWidth::Byte,
                burst: 1,
            },
            descriptor: DmaDescriptor {
                src_addr: 0,
                dst_addr: thr_addr,
                len: 0,
            },
        }
    }

    /// Context for receive: the fixed RBR to memory (incrementing), paced by
    /// the RX request line.
    #[must_use]
    pub const fn rx(requests: DmaRequestLines, rbr_addr: usize) -> Self {
        Self {
            direction: Direction::Rx,
            channel: None,
            control: DmaControl {
                src_mode: HandshakeMode::Handshake,
                dst_mode: HandshakeMode::Normal,
                src_request: requests.rx,
                dst_request: 0,
                src_addr_ctrl: AddressControl::Fixed,
                dst_addr_ctrl: AddressControl::Increment,
                src_width: TransferWidth::Byte,
                dst_width: TransferWidth::Byte,
                burst: 1,
            },
            descriptor: DmaDescriptor {
                src_addr: rbr_addr,
                dst_addr: 0,
                len: 0,
            },
        }
    }

    /// Direction of this context.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// The channel of the outstanding copy, if any.
    #[must_use]
    pub const fn channel(&self) -> Option<DmaChannel> {
        self.channel
    }

    /// Transfer control parameters.
    #[must_use]
    pub const fn control(&self) -> &DmaControl {
        &self.control
    }

    /// Points the memory side of the descriptor at `addr`.
    const fn set_memory(&mut self, addr: usize, len: usize) {
        match self.direction {
            Direction::Tx => self.descriptor.src_addr = addr,
            Direction::Rx => self.descriptor.dst_addr = addr,
        }
        self.descriptor.len = len;
    }

    /// Starts a copy of `len` bytes from or to `addr` on behalf of `port`.
    ///
    /// Buffers the controller cannot reach are refused with
    /// [`Error::InvalidArgument`]; controller failures are reported as
    /// [`Error::Dma`] and never downgraded to programmed I/O.
    pub fn start<D: DmaController>(
        &mut self,
        dma: &D,
        port: usize,
        addr: usize,
        len: usize,
    ) -> Result<DmaChannel, Error> {
        if !dma.is_dma_capable(addr, len) {
            log::warn!("uart{port}: invalid buffer address for DMA: {addr:#x}");
            return Err(Error::InvalidArgument);
        }
        self.set_memory(addr, len);
        let completion = DmaCompletion {
            port,
            direction: self.direction,
        };
        let channel = dma.copy_hw(&self.control, &self.descriptor, Some(completion))?;
        self.channel = Some(channel);
        Ok(channel)
    }

    /// Aborts the outstanding copy, if any, and returns the number of bytes
    /// it had transferred.
    ///
    /// The channel handle is invalid once this returns.
    pub fn abort<D: DmaController>(&mut self, dma: &D) -> Option<usize> {
        let channel = self.channel.take()?;
        let remaining = dma.remaining(channel);
        dma.abort(channel);
        Some(self.descriptor.len.saturating_sub(remaining))
    }

    /// Bytes transferred so far by the outstanding copy.
    pub fn transferred<D: DmaController>(&self, dma: &D) -> Option<usize> {
        self.channel
            .map(|channel| self.descriptor.len.saturating_sub(dma.remaining(channel)))
    }

    /// Marks the copy on `channel` finished.
    ///
    /// Returns `false` if `channel` is not the outstanding one, for example a
    /// late completion of an already aborted copy.
    pub fn complete(&mut self, channel: DmaChannel) -> bool {
        if self.channel == Some(channel) {
            self.channel = None;
            true
        } else {
            false
        }
    }

    /// Drops the channel handle without touching the controller.
    pub const fn forget(&mut self) {
        self.channel = None;
    }
}

/// Flushes the controller's one-byte artifact when a port switches from
/// programmed I/O to DMA without a full re-initialization: a one-byte read
/// and a one-byte write are started and immediately aborted.
///
/// Both contexts are left without a channel.
pub fn errata_preroll<D: DmaController>(
    dma: &D,
    rx: &mut DmaContext,
    tx: &mut DmaContext,
) -> Result<(), Error> {
    let mut scratch = 0_u8;
    let addr = ptr::addr_of_mut!(scratch) as usize;

    for ctx in [rx, tx] {
        ctx.set_memory(addr, 1);
        let channel = dma.copy_hw(&ctx.control, &ctx.descriptor, None)?;
        dma.abort(channel);
        ctx.forget();
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::testing::{DmaOp, RecordingDma};
    use super::*;

    const REQUESTS: DmaRequestLines = DmaRequestLines { tx: 4, rx: 5 };

    #[test]
    fn test_channel_parameters() {
        let tx = DmaContext::tx(REQUESTS, 0x1020);
        assert_eq!(tx.control().src_addr_ctrl, AddressControl::Increment);
        assert_eq!(tx.control().dst_addr_ctrl, AddressControl::Fixed);
        assert_eq!(tx.control().dst_mode, HandshakeMode::Handshake);
        assert_eq!(tx.control().dst_request, 4);

        let rx = DmaContext::rx(REQUESTS, 0x1020);
        assert_eq!(rx.control().src_addr_ctrl, AddressControl::Fixed);
        assert_eq!(rx.control().dst_addr_ctrl, AddressControl::Increment);
        assert_eq!(rx.control().src_mode, HandshakeMode::Handshake);
        assert_eq!(rx.control().src_request, 5);
        assert_eq!(rx.control().burst, 1);
    }

    #[test]
    fn test_start_and_complete() {
        let dma = RecordingDma::default();
        let mut rx = DmaContext::rx(REQUESTS, 0x1020);
        let ch = rx.start(&dma, 1, 0x2000_0000, 64).unwrap();
        assert_eq!(rx.channel(), Some(ch));

        match dma.copies()[0] {
            DmaOp::Copy {
                descriptor,
                completion,
                ..
            } => {
                assert_eq!(descriptor.src_addr, 0x1020);
                assert_eq!(descriptor.dst_addr, 0x2000_0000);
                assert_eq!(descriptor.len, 64);
                assert_eq!(
                    completion,
                    Some(DmaCompletion {
                        port: 1,
                        direction: Direction::Rx
                    })
                );
            }
            DmaOp::Abort(_) => unreachable!(),
        }

        // Completion for some other channel changes nothing.
        assert!(!rx.complete(DmaChannel(ch.0 + 1)));
        assert_eq!(rx.channel(), Some(ch));
        assert!(rx.complete(ch));
        assert_eq!(rx.channel(), None);
        // Late duplicate.
        assert!(!rx.complete(ch));
    }

    #[test]
    fn test_abort_reports_transferred_bytes() {
        let dma = RecordingDma::default();
        *dma.remaining.borrow_mut() = 40;
        let mut rx = DmaContext::rx(REQUESTS, 0x1020);
        let ch = rx.start(&dma, 0, 0x2000_0000, 64).unwrap();
        assert_eq!(rx.transferred(&dma), Some(24));
        assert_eq!(rx.abort(&dma), Some(24));
        assert_eq!(rx.channel(), None);
        assert_eq!(dma.aborts(), [ch]);
        assert_eq!(rx.abort(&dma), None);
    }

    #[test]
    fn test_rejects_unreachable_buffer() {
        let dma = RecordingDma::default();
        *dma.capable_below.borrow_mut() = Some(0x1000);
        let mut tx = DmaContext::tx(REQUESTS, 0x1020);
        assert_eq!(tx.start(&dma, 0, 0x2000, 8), Err(Error::InvalidArgument));
        assert!(dma.copies().is_empty());

        *dma.capable_below.borrow_mut() = None;
        *dma.fail_copy.borrow_mut() = Some(DmaError::NoChannel);
        assert_eq!(
            tx.start(&dma, 0, 0x2000, 8),
            Err(Error::Dma(DmaError::NoChannel))
        );
        assert_eq!(tx.channel(), None);
    }

    #[test]
    fn test_errata_preroll() {
        let dma = RecordingDma::default();
        let mut rx = DmaContext::rx(REQUESTS, 0x1020);
        let mut tx = DmaContext::tx(REQUESTS, 0x1020);
        errata_preroll(&dma, &mut rx, &mut tx).unwrap();

        let ops = dma.ops.borrow();
        assert_eq!(ops.len(), 4);
        match (ops[0], ops[1], ops[2], ops[3]) {
            (
                DmaOp::Copy {
                    channel: c0,
                    descriptor: d0,
                    completion: None,
                    ..
                },
                DmaOp::Abort(a0),
                DmaOp::Copy {
                    channel: c1,
                    descriptor: d1,
                    completion: None,
                    ..
                },
                DmaOp::Abort(a1),
            ) => {
                assert_eq!((c0, c1), (a0, a1));
                assert_eq!(d0.len, 1);
                assert_eq!(d0.src_addr, 0x1020);
                assert_eq!(d1.len, 1);
                assert_eq!(d1.dst_addr, 0x1020);
            }
            other => panic!("unexpected sequence: {other:?}"),
        }
        assert_eq!(rx.channel(), None);
        assert_eq!(tx.channel(), None);
    }
}
