// SPDX-License-Identifier: MIT OR Apache-2.0

//! Polled console output for early boot and panic paths.
//!
//! See [`ConsoleWriter`].

use crate::Uart;
use crate::backend::{Backend, MmioBackend};
use crate::error::InvalidAddressError;
use core::fmt;

/// Busy-waiting text writer on top of a [`Uart`].
///
/// Every byte waits for the transmit holding register to become empty, and
/// `\n` goes out as `\r\n`. No interrupt is involved, so this works before a
/// [`Driver`] is set up and after it stopped working. Do not use it on a
/// register block a [`Driver`] currently owns.
///
/// [`Driver`]: crate::Driver
///
/// # Example
/// ```rust,no_run
/// use atcuart::ConsoleWriter;
/// use core::fmt::Write;
///
/// let mut console = unsafe { ConsoleWriter::new_mmio(0xf020_0000 as *mut u32).unwrap() };
/// writeln!(console, "panicked at {}", "somewhere").unwrap();
/// ```
#[derive(Debug)]
pub struct ConsoleWriter<B: Backend>(Uart<B>);

impl ConsoleWriter<MmioBackend> {
    /// Creates a writer on the register block at `base_address`. The line is
    /// used as the boot firmware left it.
    ///
    /// # Safety
    ///
    /// Callers must ensure that the address is valid and safe to use.
    pub unsafe fn new_mmio(base_address: *mut u32) -> Result<Self, InvalidAddressError> {
        // SAFETY: Upheld by the caller.
        let uart = unsafe { Uart::new_mmio(base_address)? };
        Ok(Self(uart))
    }
}

impl<B: Backend> ConsoleWriter<B> {
    /// Wraps an already configured [`Uart`].
    pub const fn new(uart: Uart<B>) -> Self {
        Self(uart)
    }

    /// Returns the underlying [`Uart`].
    pub fn into_inner(self) -> Uart<B> {
        self.0
    }
}

impl<B: Backend> fmt::Write for ConsoleWriter<B> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for line in s.split_inclusive('\n') {
            match line.strip_suffix('\n') {
                Some(text) => {
                    self.0.send_bytes_all(text.as_bytes());
                    self.0.send_bytes_all(b"\r\n");
                }
                None => self.0.send_bytes_all(line.as_bytes()),
            }
        }
        Ok(())
    }
}
