// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interrupt-masked critical sections.
//!
//! State that is touched both by application code and by the interrupt
//! handler of a port lives in an [`IrqLock`]. Locking it first masks the
//! port's interrupt line through [`IrqControl`] and only then takes the spin
//! lock, so the interrupt handler can never spin on a lock held by the code
//! it interrupted. Dropping the guard releases the lock before the line is
//! unmasked again.

use core::fmt::{self, Debug, Formatter};
use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut};
use spin::{Mutex, MutexGuard};

/// Masks and unmasks the interrupt line(s) the driver shares state with.
///
/// This is the only synchronization primitive the driver relies on against
/// its interrupt handlers. Implementations must nest: a save/restore pair
/// inside another one restores the outer state.
pub trait IrqControl {
    /// Opaque saved interrupt state.
    type State: Copy;

    /// Masks the interrupt line and returns the previous state.
    fn save_and_disable(&self) -> Self::State;

    /// Restores a state returned by [`Self::save_and_disable`].
    fn restore(&self, state: Self::State);
}

impl<T: IrqControl + ?Sized> IrqControl for &T {
    type State = T::State;

    fn save_and_disable(&self) -> Self::State {
        (**self).save_and_disable()
    }

    fn restore(&self, state: Self::State) {
        (**self).restore(state);
    }
}

/// Spin lock that is only ever held with the interrupt line masked.
pub struct IrqLock<T> {
    inner: Mutex<T>,
}

impl<T> IrqLock<T> {
    /// Creates a new lock around `data`.
    pub const fn new(data: T) -> Self {
        Self {
            inner: Mutex::new(data),
        }
    }

    /// Masks the interrupt line through `irq` and acquires the lock.
    pub fn lock<'a, I: IrqControl>(&'a self, irq: &'a I) -> IrqGuard<'a, T, I> {
        let state = irq.save_and_disable();
        let guard = self.inner.lock();
        IrqGuard {
            guard: ManuallyDrop::new(guard),
            irq,
            state,
        }
    }

    /// Consumes the lock and returns the data.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: Debug> Debug for IrqLock<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("IrqLock").field("inner", &self.inner).finish()
    }
}

/// Guard of an [`IrqLock`]. The interrupt line stays masked while it lives.
pub struct IrqGuard<'a, T, I: IrqControl> {
    guard: ManuallyDrop<MutexGuard<'a, T>>,
    irq: &'a I,
    state: I::State,
}

impl<T, I: IrqControl> Deref for IrqGuard<'_, T, I> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T, I: IrqControl> DerefMut for IrqGuard<'_, T, I> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T, I: IrqControl> Drop for IrqGuard<'_, T, I> {
    fn drop(&mut self) {
        // SAFETY: The guard is dropped exactly once, here, and never touched
        // afterwards.
        unsafe { ManuallyDrop::drop(&mut self.guard) };
        self.irq.restore(self.state);
    }
}

impl<T: Debug, I: IrqControl> Debug for IrqGuard<'_, T, I> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("IrqGuard")
            .field("data", &**self.guard)
            .finish_non_exhaustive()
    }
}
