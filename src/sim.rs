// SPDX-License-Identifier: MIT OR Apache-2.0

//! Simulated register block for unit tests.

use crate::Uart;
use crate::backend::Backend;
use crate::config::{Clock, PinMap, PortConfig};
use crate::dma::DmaController;
use crate::port::Port;
use crate::spec::registers::{FCR, InterruptId, LCR, LSR, offsets};
use core::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

#[derive(Debug)]
struct State {
    regs: [u32; offsets::MAX / 4],
    ier: u32,
    dll: u32,
    dlm: u32,
    iir: u32,
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    line_errors: LSR,
    thr_empty: bool,
    tx_idle: bool,
    writes: Vec<(usize, u32)>,
}

impl State {
    fn dlab(&self) -> bool {
        self.regs[offsets::LCR / 4] & LCR::DLAB.bits() != 0
    }
}

/// Shared handle to a simulated UART. Clones observe the same device.
///
/// Models divisor latch banking, the receive FIFO, a capture of everything
/// written to THR, self-clearing FIFO resets and error bits that clear on an
/// LSR read. The interrupt identification is whatever the test raised.
#[derive(Clone, Debug)]
pub struct SimUart(Rc<RefCell<State>>);

impl SimUart {
    /// A device with `depth` bytes of FIFO and 16x oversampling.
    pub fn new(depth: usize) -> Self {
        let mut regs = [0; offsets::MAX / 4];
        regs[offsets::HWC / 4] = depth.trailing_zeros() - 4;
        regs[offsets::OSC / 4] = 16;
        Self(Rc::new(RefCell::new(State {
            regs,
            ier: 0,
            dll: 0,
            dlm: 0,
            iir: 1,
            rx: VecDeque::new(),
            tx: Vec::new(),
            line_errors: LSR::empty(),
            thr_empty: true,
            tx_idle: true,
            writes: Vec::new(),
        })))
    }

    /// Raw register content, without read side effects.
    pub fn reg(&self, offset: usize) -> u32 {
        let state = self.0.borrow();
        match offset {
            offsets::IER => state.ier,
            _ => state.regs[offset / 4],
        }
    }

    pub fn dll(&self) -> u32 {
        self.0.borrow().dll
    }

    pub fn dlm(&self) -> u32 {
        self.0.borrow().dlm
    }

    /// Every register write so far, in order.
    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.0.borrow().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.0.borrow_mut().writes.clear();
    }

    /// Every FIFO control write so far, in order.
    pub fn fcr_writes(&self) -> Vec<FCR> {
        self.0
            .borrow()
            .writes
            .iter()
            .filter(|(off, _)| *off == offsets::FCR)
            .map(|(_, val)| FCR::from_bits_retain(*val))
            .collect()
    }

    /// Bytes arriving on the wire.
    pub fn inject_rx(&self, bytes: &[u8]) {
        self.0.borrow_mut().rx.extend(bytes);
    }

    pub fn rx_pending(&self) -> usize {
        self.0.borrow().rx.len()
    }

    /// Everything written to THR so far.
    pub fn tx_bytes(&self) -> Vec<u8> {
        self.0.borrow().tx.clone()
    }

    pub fn set_thr_empty(&self, empty: bool) {
        self.0.borrow_mut().thr_empty = empty;
    }

    /// Sets the transmitter-empty (TEMT) flag.
    pub fn set_tx_idle(&self, idle: bool) {
        self.0.borrow_mut().tx_idle = idle;
    }

    /// Makes `id` the pending interrupt.
    pub fn raise(&self, id: InterruptId) {
        self.0.borrow_mut().iir = id.to_bits();
    }

    /// Latches receive error flags until the next LSR read.
    pub fn set_line_errors(&self, errors: LSR) {
        self.0.borrow_mut().line_errors = errors;
    }

    /// Loses all register state, like a power-gated block.
    pub fn power_cycle(&self) {
        let mut state = self.0.borrow_mut();
        let hwc = state.regs[offsets::HWC / 4];
        state.regs = [0; offsets::MAX / 4];
        state.regs[offsets::HWC / 4] = hwc;
        state.ier = 0;
        state.dll = 0;
        state.dlm = 0;
    }
}

impl Backend for SimUart {
    unsafe fn read_register(&mut self, offset: usize) -> u32 {
        let mut state = self.0.borrow_mut();
        match offset {
            offsets::DATA if state.dlab() => state.dll,
            offsets::DATA => state.rx.pop_front().map_or(0, u32::from),
            offsets::IER if state.dlab() => state.dlm,
            offsets::IER => state.ier,
            offsets::IIR => state.iir,
            offsets::LSR => {
                let mut lsr = core::mem::take(&mut state.line_errors);
                lsr.set(LSR::DATA_READY, !state.rx.is_empty());
                lsr.set(LSR::THR_EMPTY, state.thr_empty);
                lsr.set(LSR::TRANSMITTER_EMPTY, state.tx_idle);
                lsr.bits()
            }
            _ => state.regs[offset / 4],
        }
    }

    unsafe fn write_register(&mut self, offset: usize, value: u32) {
        let mut state = self.0.borrow_mut();
        state.writes.push((offset, value));
        match offset {
            offsets::DATA if state.dlab() => state.dll = value,
            offsets::DATA => state.tx.push(value as u8),
            offsets::IER if state.dlab() => state.dlm = value,
            offsets::IER => state.ier = value,
            offsets::FCR => {
                if FCR::from_bits_retain(value).contains(FCR::RX_FIFO_RESET) {
                    state.rx.clear();
                }
            }
            _ => state.regs[offset / 4] = value,
        }
    }

    fn register_address(&self, offset: usize) -> usize {
        0xf020_0000 + offset
    }
}

/// A plain port description: 40 MHz clock, no pins, no DMA, not the console.
pub fn config() -> PortConfig {
    PortConfig {
        clock: Clock::new(40_000_000),
        pins: PinMap::default(),
        console: false,
        dma_requests: None,
    }
}

/// A set-up port (instance 0) on a fresh simulated device.
pub fn port<D: DmaController>(
    depth: usize,
    dma: Option<D>,
    config: PortConfig,
) -> (SimUart, Port<SimUart, D>) {
    let sim = SimUart::new(depth);
    let port = Port::attach(0, Uart::from_backend(sim.clone()), config, dma).unwrap();
    (sim, port)
}
