// SPDX-License-Identifier: MIT OR Apache-2.0

//! The driver instance: a fixed arena of ports indexed by hardware instance.
//!
//! Every entry point masks the interrupt line and locks the addressed port
//! for the duration of the operation. Raw-mode events computed under the lock
//! are delivered only after the lock is released, so a subscriber may call
//! back into the driver right away.

use crate::Uart;
use crate::backend::Backend;
use crate::config::PortConfig;
use crate::dma::{DmaChannel, DmaCompletion, DmaController, DmaStatus};
use crate::error::Error;
use crate::ioctl::{Command, Response};
use crate::port::{Port, Readiness};
use crate::raw::Notification;
use crate::sync::{IrqControl, IrqLock};

/// Diagnostic counters of a port.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PortStats {
    /// Line status interrupts that reported a receive error.
    pub line_errors: u32,
    /// Received console bytes dropped because the RX channel was full.
    pub rx_dropped: u32,
}

/// UART driver for up to `N` instances.
///
/// `B` accesses the register blocks, `D` is the DMA controller used by ports
/// set up with one, and `I` masks the interrupt line shared with the
/// interrupt handlers. All methods take `&self`, so the driver can live in a
/// `static`.
///
/// # Example
/// ```rust,no_run
/// use atcuart::backend::MmioBackend;
/// use atcuart::dma::NoDma;
/// use atcuart::sync::IrqControl;
/// use atcuart::{Clock, Driver, PinMap, PortConfig, Uart};
///
/// #[derive(Debug)]
/// struct Irq;
///
/// impl IrqControl for Irq {
///     type State = ();
///     fn save_and_disable(&self) {}
///     fn restore(&self, _state: ()) {}
/// }
///
/// static DRIVER: Driver<MmioBackend, NoDma, Irq, 2> = Driver::new(Irq);
///
/// let uart = unsafe { Uart::new_mmio(0xf020_0000 as *mut u32).unwrap() };
/// let config = PortConfig {
///     clock: Clock::new(40_000_000),
///     pins: PinMap::default(),
///     console: true,
///     dma_requests: None,
/// };
/// DRIVER.attach(0, uart, config, None).unwrap();
/// DRIVER.console_write_all(0, b"hello\r\n").unwrap();
/// ```
#[derive(Debug)]
pub struct Driver<B: Backend, D: DmaController, I: IrqControl, const N: usize> {
    ports: [IrqLock<Option<Port<B, D>>>; N],
    irq: I,
}

impl<B: Backend, D: DmaController, I: IrqControl, const N: usize> Driver<B, D, I, N> {
    /// Creates a driver with no instance set up.
    pub const fn new(irq: I) -> Self {
        Self {
            ports: [const { IrqLock::new(None) }; N],
            irq,
        }
    }

    /// Runs `f` on the set-up port `id` with its interrupt line masked.
    fn with_port<R>(
        &self,
        id: usize,
        f: impl FnOnce(&mut Port<B, D>) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let slot = self.ports.get(id).ok_or(Error::NotFound)?;
        let mut guard = slot.lock(&self.irq);
        let port = guard.as_mut().ok_or(Error::NotFound)?;
        f(port)
    }

    /// Like [`Self::with_port`], but for operations that may produce an
    /// event. The event is delivered after the lock is dropped.
    fn notify_from(&self, id: usize, f: impl FnOnce(&mut Port<B, D>) -> Option<Notification>) {
        let Some(slot) = self.ports.get(id) else {
            return;
        };
        let notification = slot.lock(&self.irq).as_mut().and_then(f);
        if let Some(notification) = notification {
            notification.deliver();
        }
    }

    /* ----- Lifecycle ------------------------------------------------------ */

    /// Takes over the register block of instance `id`.
    ///
    /// The FIFO depth is read from the hardware and the console line is
    /// programmed: 115200 8N1, with hardware flow control if both CTS and
    /// RTS pins are mapped. `dma` is only used by raw DMA mode, together
    /// with [`PortConfig::dma_requests`].
    ///
    /// Returns [`Error::NotFound`] for an instance beyond `N` and
    /// [`Error::Busy`] if the instance is already set up.
    pub fn attach(
        &self,
        id: usize,
        uart: Uart<B>,
        config: PortConfig,
        dma: Option<D>,
    ) -> Result<(), Error> {
        let slot = self.ports.get(id).ok_or(Error::NotFound)?;
        let mut guard = slot.lock(&self.irq);
        if guard.is_some() {
            return Err(Error::Busy);
        }
        *guard = Some(Port::attach(id, uart, config, dma)?);
        Ok(())
    }

    /// Quiesces instance `id`, frees its slot, and hands the register block
    /// back. Outstanding raw transfers are dropped without an event.
    pub fn shutdown(&self, id: usize) -> Result<Uart<B>, Error> {
        let slot = self.ports.get(id).ok_or(Error::NotFound)?;
        let port = slot.lock(&self.irq).take().ok_or(Error::NotFound)?;
        Ok(port.shutdown())
    }

    /* ----- Commands ------------------------------------------------------- */

    /// Executes a device control command on port `id`.
    ///
    /// # Safety
    ///
    /// For [`Command::Transmit`] and [`Command::Receive`], the buffer must be
    /// valid for reads (respectively writes) of `len` bytes, and must not be
    /// accessed otherwise, until the transfer's completion event was
    /// delivered or the port went through [`Command::Reset`],
    /// [`Command::Deinit`], or [`Self::shutdown`].
    pub unsafe fn ioctl(&self, id: usize, command: Command) -> Result<Response, Error> {
        self.with_port(id, |port| port.execute(command))
    }

    /* ----- Interrupt Entry Points ----------------------------------------- */

    /// Interrupt handler of instance `id`. Instances not set up are ignored.
    pub fn handle_interrupt(&self, id: usize) {
        self.notify_from(id, Port::handle_interrupt);
    }

    /// Completion callback for the DMA controller.
    ///
    /// Completions of aborted channels, or with a status other than
    /// [`DmaStatus::Done`], are ignored.
    pub fn handle_dma_complete(
        &self,
        completion: DmaCompletion,
        channel: DmaChannel,
        status: DmaStatus,
    ) {
        self.notify_from(completion.port, |port| {
            port.dma_complete(completion.direction, channel, status)
        });
    }

    /* ----- Power Management ----------------------------------------------- */

    /// Saves the registers of port `id` before the system sleeps.
    ///
    /// Returns [`Error::Busy`], without touching the hardware, while any
    /// data is in flight.
    pub fn suspend(&self, id: usize) -> Result<(), Error> {
        self.with_port(id, Port::suspend)
    }

    /// Restores the registers saved by [`Self::suspend`].
    pub fn resume(&self, id: usize) -> Result<(), Error> {
        self.with_port(id, |port| {
            port.resume();
            Ok(())
        })
    }

    /* ----- Console -------------------------------------------------------- */

    /// Queues `bytes` for transmission without blocking.
    ///
    /// Returns how many bytes were accepted, or [`Error::WouldBlock`] if
    /// none fit. Fails with [`Error::Busy`] in raw mode.
    pub fn console_write(&self, id: usize, bytes: &[u8]) -> Result<usize, Error> {
        self.with_port(id, |port| port.console_write(bytes))
    }

    /// Queues all of `bytes`, spinning until the interrupt handler makes
    /// room. The interrupt line is unmasked between attempts.
    pub fn console_write_all(&self, id: usize, mut bytes: &[u8]) -> Result<(), Error> {
        while !bytes.is_empty() {
            match self.console_write(id, bytes) {
                Ok(n) => bytes = &bytes[n..],
                Err(Error::WouldBlock) => core::hint::spin_loop(),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Takes received bytes without blocking.
    ///
    /// Returns [`Error::WouldBlock`] if nothing was received.
    pub fn console_read(&self, id: usize, buffer: &mut [u8]) -> Result<usize, Error> {
        self.with_port(id, |port| port.console_read(buffer))
    }

    /// Readiness of the console byte stream.
    pub fn console_poll(&self, id: usize) -> Result<Readiness, Error> {
        self.with_port(id, |port| Ok(port.console_poll()))
    }

    /// Pushes one byte directly into the transmit FIFO, bypassing the TX
    /// channel. Returns [`Error::WouldBlock`] while the FIFO is full, and
    /// [`Error::Busy`] in raw mode.
    pub fn push_byte(&self, id: usize, byte: u8) -> Result<(), Error> {
        self.with_port(id, |port| port.push_byte(byte))
    }

    /// Kicks the transmitter if it is stopped. Fails with [`Error::Busy`]
    /// in raw mode.
    pub fn start_tx(&self, id: usize) -> Result<(), Error> {
        self.with_port(id, Port::start_tx)
    }

    /// Diagnostic counters of port `id`.
    pub fn stats(&self, id: usize) -> Result<PortStats, Error> {
        self.with_port(id, |port| Ok(port.stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DmaRequestLines, LineConfig, RawConfig};
    use crate::dma::Direction;
    use crate::dma::testing::{DmaOp, RecordingDma};
    use crate::error::LineError;
    use crate::raw::UartEvent;
    use crate::raw::testing::EventLog;
    use crate::sim::{self, SimUart};
    use crate::spec::registers::{InterruptId, LSR};
    use crate::sync::testing::FakeIrq;

    type TestDriver<'a> = Driver<SimUart, &'a RecordingDma, &'a FakeIrq, 2>;

    fn attach(driver: &TestDriver<'_>, id: usize) -> SimUart {
        let sim = SimUart::new(16);
        driver
            .attach(id, Uart::from_backend(sim.clone()), sim::config(), None)
            .unwrap();
        sim
    }

    #[test]
    fn test_setup_and_shutdown() {
        let irq = FakeIrq::default();
        let driver = TestDriver::new(&irq);
        let sim = attach(&driver, 1);
        assert!(!irq.is_masked());

        let again = Uart::from_backend(SimUart::new(16));
        assert_eq!(
            driver.attach(1, again, sim::config(), None),
            Err(Error::Busy)
        );
        let beyond = Uart::from_backend(SimUart::new(16));
        assert_eq!(
            driver.attach(2, beyond, sim::config(), None),
            Err(Error::NotFound)
        );
        assert_eq!(driver.stats(0), Err(Error::NotFound));

        let _uart = driver.shutdown(1).unwrap();
        assert!(sim.fcr_writes().last().unwrap().is_empty());
        assert_eq!(driver.stats(1), Err(Error::NotFound));
        assert!(driver.shutdown(1).is_err());
        // Interrupts of instances not set up are ignored.
        driver.handle_interrupt(1);
        driver.handle_interrupt(7);
    }

    #[test]
    fn test_console_stream() {
        let irq = FakeIrq::default();
        let driver = TestDriver::new(&irq);
        let sim = attach(&driver, 0);

        driver.console_write_all(0, b"hi\n").unwrap();
        assert_eq!(sim.tx_bytes(), b"hi\n");

        sim.inject_rx(b"ok");
        sim.raise(InterruptId::ReceiveData);
        driver.handle_interrupt(0);
        let poll = driver.console_poll(0).unwrap();
        assert!(poll.readable && poll.writable);
        let mut buf = [0_u8; 4];
        assert_eq!(driver.console_read(0, &mut buf), Ok(2));
        assert_eq!(&buf[..2], b"ok");
        assert_eq!(driver.console_read(0, &mut buf), Err(Error::WouldBlock));

        assert_eq!(driver.push_byte(0, b'!'), Ok(()));
        assert_eq!(driver.start_tx(0), Ok(()));
        assert_eq!(sim.tx_bytes(), b"hi\n!");
        assert_eq!(irq.max_depth(), 1);
        assert!(!irq.is_masked());
    }

    #[test]
    fn test_console_line_error_is_counted() {
        let irq = FakeIrq::default();
        let driver = TestDriver::new(&irq);
        let sim = attach(&driver, 0);
        sim.set_line_errors(LSR::OVERRUN_ERROR);
        sim.raise(InterruptId::LineStatus);
        driver.handle_interrupt(0);
        assert_eq!(
            driver.stats(0),
            Ok(PortStats {
                line_errors: 1,
                rx_dropped: 0
            })
        );
    }

    #[test]
    fn test_ioctl_raw_pio_cycle() {
        let irq = FakeIrq::default();
        let driver = TestDriver::new(&irq);
        let sim = attach(&driver, 0);
        let log = EventLog::leak();

        // SAFETY: No buffers involved.
        let res = unsafe { driver.ioctl(0, Command::Reset) };
        assert_eq!(res, Err(Error::Permission));

        let init = Command::Init {
            config: RawConfig::default(),
            subscriber: log,
        };
        // SAFETY: No buffers involved.
        assert_eq!(unsafe { driver.ioctl(0, init) }, Ok(Response::Done));
        assert_eq!(driver.console_write(0, b"x"), Err(Error::Busy));

        let data = *b"raw";
        // SAFETY: `data` outlives the transfer and is not written.
        let res = unsafe { driver.ioctl(0, Command::transmit(&data)) };
        assert_eq!(res, Ok(Response::Done));
        sim.raise(InterruptId::ThrEmpty);
        driver.handle_interrupt(0);
        assert_eq!(sim.tx_bytes(), b"raw");
        assert_eq!(log.events(), [(0, UartEvent::TxComplete)]);

        let mut buf = [0_u8; 8];
        // SAFETY: `buf` outlives the transfer, which is reset below.
        unsafe { driver.ioctl(0, Command::receive(&mut buf)) }.unwrap();
        sim.inject_rx(b"abc");
        sim.raise(InterruptId::ReceiveTimeout);
        driver.handle_interrupt(0);
        // SAFETY: No buffers involved.
        let res = unsafe { driver.ioctl(0, Command::GetRxLen) };
        assert_eq!(res, Ok(Response::RxLen(3)));

        // SAFETY: No buffers involved.
        unsafe {
            driver.ioctl(0, Command::Reset).unwrap();
            driver.ioctl(0, Command::Deinit).unwrap();
        }
        assert_eq!(driver.console_write(0, b"x"), Ok(1));
        assert!(!irq.is_masked());
    }

    #[test]
    fn test_ioctl_set_line() {
        let irq = FakeIrq::default();
        let driver = TestDriver::new(&irq);
        let sim = attach(&driver, 0);
        let line = LineConfig {
            baud_rate: crate::BaudRate::Baud57600,
            ..LineConfig::default()
        };
        // SAFETY: No buffers involved.
        unsafe { driver.ioctl(0, Command::SetLine(line)) }.unwrap();
        // 40 MHz / (16 * 57600) = 43.4
        assert_eq!(sim.dll(), 43);
    }

    #[test]
    fn test_dma_completion_routing() {
        let irq = FakeIrq::default();
        let dma = RecordingDma::default();
        let driver = TestDriver::new(&irq);
        let config = PortConfig {
            dma_requests: Some(DmaRequestLines { tx: 4, rx: 5 }),
            ..sim::config()
        };
        let sim = SimUart::new(16);
        driver
            .attach(1, Uart::from_backend(sim.clone()), config, Some(&dma))
            .unwrap();
        let log = EventLog::leak();
        let init = Command::Init {
            config: RawConfig {
                dma: true,
                ..RawConfig::default()
            },
            subscriber: log,
        };
        // SAFETY: No buffers involved.
        unsafe { driver.ioctl(1, init) }.unwrap();

        let mut buf = [0_u8; 64];
        // SAFETY: `buf` outlives the transfer, which ends below.
        unsafe { driver.ioctl(1, Command::receive(&mut buf)) }.unwrap();
        let Some(DmaOp::Copy {
            channel,
            completion: Some(completion),
            ..
        }) = dma.copies().last().copied()
        else {
            unreachable!()
        };
        assert_eq!(
            completion,
            DmaCompletion {
                port: 1,
                direction: Direction::Rx
            }
        );

        sim.set_line_errors(LSR::OVERRUN_ERROR);
        sim.raise(InterruptId::LineStatus);
        driver.handle_interrupt(1);
        assert_eq!(log.events(), [(1, UartEvent::Error(LineError::OVERRUN))]);

        // Late completion of the aborted channel.
        driver.handle_dma_complete(completion, channel, DmaStatus::Done);
        assert_eq!(log.events().len(), 1);
        assert!(!irq.is_masked());
    }

    #[test]
    fn test_suspend_resume() {
        let irq = FakeIrq::default();
        let driver = TestDriver::new(&irq);
        let sim = attach(&driver, 0);
        assert_eq!(driver.push_byte(0, b'a'), Ok(()));
        assert_eq!(driver.suspend(0), Err(Error::Busy));
        sim.raise(InterruptId::ThrEmpty);
        driver.handle_interrupt(0);
        assert_eq!(driver.suspend(0), Ok(()));
        sim.power_cycle();
        assert_eq!(driver.resume(0), Ok(()));
        assert_eq!(sim.dll(), 22);
        assert_eq!(driver.suspend(1), Err(Error::NotFound));
    }
}
