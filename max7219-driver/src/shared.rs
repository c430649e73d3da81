//! A MAX7219 driver that can be shared between the main loop and interrupt
//! handlers. Every operation runs inside a critical section so packets from
//! different callers can never interleave on the bus.
//!
//! Initialize the driver before wrapping it. The settle delay during
//! initialization would otherwise hold the critical section for a second.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::max7219::{Max7219Error, Max7219Write};

pub struct SharedMax7219<D> {
    driver: Mutex<RefCell<D>>,
}

impl<D: Max7219Write> SharedMax7219<D> {
    pub const fn new(driver: D) -> Self {
        Self {
            driver: Mutex::new(RefCell::new(driver)),
        }
    }

    /// Runs `f` with exclusive access to the driver.
    pub fn lock<R>(&self, f: impl FnOnce(&mut D) -> R) -> R {
        critical_section::with(|cs| f(&mut *self.driver.borrow_ref_mut(cs)))
    }

    pub fn write_digit_raw(&self, digit_index: u8, value: u8) -> Result<(), Max7219Error<D::Error>> {
        self.lock(|driver| driver.write_digit_raw(digit_index, value))
    }

    pub fn set_intensity(&self, intensity: u8) -> Result<(), Max7219Error<D::Error>> {
        self.lock(|driver| driver.set_intensity(intensity))
    }

    pub fn set_display_on(&self, on: bool) -> Result<(), Max7219Error<D::Error>> {
        self.lock(|driver| driver.set_display_on(on))
    }

    pub fn clear(&self) -> Result<(), Max7219Error<D::Error>> {
        self.lock(|driver| driver.clear())
    }

    /// Consumes `self` and returns the driver.
    pub fn into_inner(self) -> D {
        self.driver.into_inner().into_inner()
    }
}
