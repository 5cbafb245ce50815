//! Masked cells.
//!
//! On the board, every queue access from a worker disables the UART or timer interrupt
//! for exactly one bounded operation. Here the same discipline runs through the
//! `critical-section` crate: `with` enters a critical section, runs the closure, and
//! leaves it. Nested `with` calls on *different* cells share the outer section, which
//! is how multi-cell bursts (drain records + reset counter) stay atomic.

use core::cell::RefCell;
use critical_section::Mutex;

pub struct Masked<T> {
    inner: Mutex<RefCell<T>>,
}

impl<T> Masked<T> {
    pub const fn new(value: T) -> Self {
        Masked {
            inner: Mutex::new(RefCell::new(value)),
        }
    }

    /// Runs `f` with the asynchronous sources masked. Keep `f` short and never block in it.
    ///
    /// Re-entering the same cell from inside `f` panics.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }
}

impl<T: Copy> Masked<T> {
    pub fn get(&self) -> T {
        self.with(|value| *value)
    }
}

impl<T: Default> Default for Masked<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
