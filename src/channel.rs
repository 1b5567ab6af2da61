// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded byte channel used by the console personality.

/// Fixed-capacity FIFO of bytes.
///
/// All operations are non-blocking and allocation-free, so both the
/// interrupt handler and application code (inside a critical section) may
/// use them. The channel never grows beyond `N` bytes: a push into a full
/// channel is refused.
#[derive(Clone, Debug)]
pub struct ByteChannel<const N: usize> {
    buf: [u8; N],
    head: usize,
    len: usize,
}

impl<const N: usize> ByteChannel<N> {
    /// Creates an empty channel.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buf: [0; N],
            head: 0,
            len: 0,
        }
    }

    /// Number of queued bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether no byte is queued.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether no further byte fits.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.len == N
    }

    /// Appends a byte. Hands the byte back if the channel is full.
    pub const fn try_push(&mut self, byte: u8) -> Result<(), u8> {
        if self.is_full() {
            return Err(byte);
        }
        let tail = (self.head + self.len) % N;
        self.buf[tail] = byte;
        self.len += 1;
        Ok(())
    }

    /// Removes the oldest byte.
    pub const fn try_pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.buf[self.head];
        self.head = (self.head + 1) % N;
        self.len -= 1;
        Some(byte)
    }

    /// Appends as many bytes of `bytes` as fit and returns how many did.
    pub fn push_slice(&mut self, bytes: &[u8]) -> usize {
        bytes
            .iter()
            .map_while(|&byte| self.try_push(byte).ok())
            .count()
    }

    /// Moves queued bytes into `buffer` and returns how many were moved.
    pub fn pop_slice(&mut self, buffer: &mut [u8]) -> usize {
        buffer
            .iter_mut()
            .map_while(|slot| {
                self.try_pop().map(|byte| {
                    *slot = byte;
                })
            })
            .count()
    }

    /// Drops all queued bytes.
    pub const fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}

impl<const N: usize> Default for ByteChannel<N> {
    fn default() -> Self {
        Self::new()
    }
}
