// SPDX-License-Identifier: MIT OR Apache-2.0

//! Occupancy accounting of the hardware transmit FIFO.

/// Tracks how many bytes were pushed into the hardware transmit FIFO since it
/// was last seen empty.
///
/// The hardware drains the FIFO completely between two THR-empty interrupts,
/// so the fill level only ever grows by pushes and drops back to zero on
/// such an interrupt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FifoState {
    depth: usize,
    fill: usize,
}

impl FifoState {
    /// Creates the state for a FIFO of `depth` bytes, initially empty.
    #[must_use]
    pub const fn new(depth: usize) -> Self {
        Self { depth, fill: 0 }
    }

    /// FIFO capacity in bytes.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Bytes pushed but not yet known to be drained.
    #[must_use]
    pub const fn fill(&self) -> usize {
        self.fill
    }

    /// Whether no further byte may be pushed.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.fill >= self.depth()
    }

    /// Accounts for one pushed byte. Returns `false` (and changes nothing) if
    /// the FIFO is full.
    pub const fn record_push(&mut self) -> bool {
        if self.is_full() {
            return false;
        }
        self.fill += 1;
        true
    }

    /// The hardware reported the FIFO empty.
    pub const fn drained(&mut self) {
        self.fill = 0;
    }
}
