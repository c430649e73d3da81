//! The MAX7219 is a serially interfaced LED display driver. It multiplexes up
//! to 8 digits of 7-segment displays (plus decimal point), or equivalently one
//! 8x8 LED matrix, and holds the segment data in an internal 8x8 static RAM so
//! it does not need to be refreshed by the controller.
//!
//! It communicates over SPI. Every command is a 16-bit packet: one byte of
//! register address followed by one byte of data. The packet is latched on the
//! rising edge of LOAD/CS, so chip select must go low before the packet and
//! high after it.
//!
//! The chip powers up in shutdown mode with undefined digit data. Initializing
//! here cycles it through shutdown, waits for it to settle, then configures it
//! for raw segment data (no Code B decoding) and blanks every scanned digit.
//!
//! Limitations of this implementation (done for simplicity):
//! * Only a single device is supported, no daisy chaining.
//! * Digits are written as raw segment bytes. No font or BCD decoding.
//!
//! [MAX7219 Datasheet](https://www.analog.com/media/en/technical-documentation/data-sheets/max7219-max7221.pdf)

use core::convert::Infallible;

use embedded_hal::delay::DelayUs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBusWrite;
use fugit::MillisDurationU32;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

/// The number of digits a single MAX7219 can scan.
pub const MAX_DIGITS: u8 = 8;

const DIGIT_REGISTERS: [u8; MAX_DIGITS as usize] = [
    0x01,
    0x02,
    0x03,
    0x04,
    0x05,
    0x06,
    0x07,
    0x08,
];
const DECODE_MODE_REGISTER: u8 = 0x09;
const INTENSITY_REGISTER: u8 = 0x0A;
const SCAN_LIMIT_REGISTER: u8 = 0x0B;
const SHUTDOWN_REGISTER: u8 = 0x0C;
const DISPLAY_TEST_REGISTER: u8 = 0x0F;

const SHUTDOWN_MODE: u8 = 0x00;
const NORMAL_MODE: u8 = 0x01;
// Every digit takes raw segment data
const NO_DECODE: u8 = 0x00;
const DISPLAY_TEST_OFF: u8 = 0x00;
const DISPLAY_TEST_ON: u8 = 0x01;

/// Digit data with every segment off.
pub const DIGIT_OFF: u8 = 0b0000_0000;
/// Digit data with every segment (and the decimal point) on.
pub const DIGIT_ON: u8 = 0b1111_1111;

/// Intensity is a 4-bit duty cycle, 0x00 (1/32) to 0x0F (31/32).
pub const MAX_INTENSITY: u8 = 0x0F;
/// Middle of the intensity range.
pub const DEFAULT_INTENSITY: u8 = 0x08;

// Time the chip is left in shutdown during initialization before it is woken
// up again.
pub const DEFAULT_SETTLE_TIME: MillisDurationU32 = MillisDurationU32::millis(1000);

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Max7219Error<SPI> {
    /// The digit count or digit index is out of range.
    InvalidConfiguration,
    /// The driver has not been (successfully) initialized.
    NotInitialized,
    /// The SPI transfer failed. The bus error is passed through untouched.
    Spi(SPI),
    Delay,
}

/// Settings applied to the MAX7219 by `initialize_with_config`.
#[derive(Copy, Clone, Debug)]
pub struct Max7219Config {
    digit_count: u8,
    intensity: u8,
    settle_time: MillisDurationU32,
}

impl Max7219Config {
    /// A configuration scanning `digit_count` digits, with mid-scale intensity
    /// and the default settle time. `digit_count` is checked on initialize.
    pub const fn new(digit_count: u8) -> Self {
        Self {
            digit_count,
            intensity: DEFAULT_INTENSITY,
            settle_time: DEFAULT_SETTLE_TIME,
        }
    }

    pub fn digit_count(&self) -> u8 {
        self.digit_count
    }

    pub fn intensity(&self) -> u8 {
        self.intensity
    }

    pub fn settle_time(&self) -> MillisDurationU32 {
        self.settle_time
    }

    /// Sets the intensity applied on initialize. Only the lowest 4 bits are used.
    pub fn set_intensity(&mut self, intensity: u8) {
        self.intensity = intensity & MAX_INTENSITY;
    }

    /// Sets how long the chip is held in shutdown before being woken.
    pub fn set_settle_time(&mut self, settle_time: MillisDurationU32) {
        self.settle_time = settle_time;
    }

    fn is_valid(&self) -> bool {
        (1..=MAX_DIGITS).contains(&self.digit_count)
    }
}

impl Default for Max7219Config {
    /// Single digit, which is all the reduced wiring of a bare MAX7219 on a
    /// one-digit display needs.
    fn default() -> Self {
        Self::new(1)
    }
}

/// Write interface for the MAX7219 driver
pub trait Max7219Write {
    type Error: core::fmt::Debug;

    /// Initializes the device to scan `digit_count` digits (1-8) of raw
    /// segment data with mid-scale intensity, and blanks those digits. The
    /// delay is used to let the device settle after it is shut down.
    fn initialize<DELAY: DelayUs>(&mut self, digit_count: u8, delay: &mut DELAY) -> Result<(), Max7219Error<Self::Error>> {
        self.initialize_with_config(Max7219Config::new(digit_count), delay)
    }

    /// Same as `initialize`, driving only digit 0.
    fn initialize_single_digit<DELAY: DelayUs>(&mut self, delay: &mut DELAY) -> Result<(), Max7219Error<Self::Error>> {
        self.initialize_with_config(Max7219Config::default(), delay)
    }

    /// Initializes the device using every setting in `config`.
    fn initialize_with_config<DELAY: DelayUs>(&mut self, config: Max7219Config, delay: &mut DELAY) -> Result<(), Max7219Error<Self::Error>>;

    /// Writes `value` as the raw segment data of digit `digit_index`. Bit 7 is
    /// the decimal point, bits 6-0 are segments A-G.
    fn write_digit_raw(&mut self, digit_index: u8, value: u8) -> Result<(), Max7219Error<Self::Error>>;

    /// Sets the display intensity. Only the lowest 4 bits of `intensity` are used.
    fn set_intensity(&mut self, intensity: u8) -> Result<(), Max7219Error<Self::Error>>;

    /// Takes the device in or out of shutdown. Digit data is kept while off.
    fn set_display_on(&mut self, on: bool) -> Result<(), Max7219Error<Self::Error>>;

    /// Enables/disables display test mode, which lights every LED regardless
    /// of the digit data.
    fn set_display_test(&mut self, on: bool) -> Result<(), Max7219Error<Self::Error>>;

    /// Turns off every segment of every scanned digit.
    fn clear(&mut self) -> Result<(), Max7219Error<Self::Error>>;

    /// Turns on every segment of every scanned digit.
    fn fill(&mut self) -> Result<(), Max7219Error<Self::Error>>;
}

/// Driver for the MAX7219
pub struct Max7219<SPI, CS> {
    spi: SPI,
    chip_select: CS,
    // None until initialize succeeds
    digit_count: Option<u8>,
}

impl<SPI, CS> Max7219<SPI, CS>
where
    SPI: SpiBusWrite,
    CS: OutputPin<Error = Infallible>,
{
    /// Creates a new driver using `spi` for data and `chip_select` as the
    /// active-low LOAD/CS line. Chip select is driven high; nothing is sent
    /// to the device.
    pub fn new(spi: SPI, chip_select: CS) -> Self {
        let mut device = Self {
            spi,
            chip_select,
            digit_count: None,
        };

        device.deselect();
        device
    }

    /// Number of scanned digits, or `None` if the driver is not initialized.
    pub fn digit_count(&self) -> Option<u8> {
        self.digit_count
    }

    pub fn is_initialized(&self) -> bool {
        self.digit_count.is_some()
    }

    fn initialized_digit_count(&self) -> Result<u8, Max7219Error<SPI::Error>> {
        self.digit_count.ok_or(Max7219Error::NotInitialized)
    }

    /// Writes the same `data` to every scanned digit.
    fn write_all_digits(&mut self, digit_count: u8, data: u8) -> Result<(), Max7219Error<SPI::Error>> {
        for register in &DIGIT_REGISTERS[..digit_count as usize] {
            self.write_register(*register, data)?;
        }
        Ok(())
    }

    /// Sends one address/data packet framed by chip select. Chip select is
    /// released even if the transfer fails.
    fn write_register(&mut self, address: u8, data: u8) -> Result<(), Max7219Error<SPI::Error>> {
        trace!("MAX7219 write 0x{:02x} = 0x{:02x}", address, data);

        self.select();
        let result = self
            .spi
            .write(&[address, data])
            .and_then(|_| self.spi.flush());
        self.deselect();

        result.map_err(|err| {
            warn!("MAX7219 write to 0x{:02x} failed: {:?}", address, err);
            Max7219Error::Spi(err)
        })
    }

    fn select(&mut self) {
        // Ignore errors since it is Infallible
        self.chip_select.set_low().unwrap_or_default();
    }

    fn deselect(&mut self) {
        // Ignore errors since it is Infallible
        self.chip_select.set_high().unwrap_or_default();
    }

    /// Consumes `self` and returns the `spi` and `chip_select` that it owned
    /// so they can be reused.
    #[cfg(test)]
    pub fn destroy(self) -> (SPI, CS) {
        (self.spi, self.chip_select)
    }
}

impl<SPI, CS> Max7219Write for Max7219<SPI, CS>
where
    SPI: SpiBusWrite,
    CS: OutputPin<Error = Infallible>,
{
    type Error = SPI::Error;

    fn initialize_with_config<DELAY: DelayUs>(&mut self, config: Max7219Config, delay: &mut DELAY) -> Result<(), Max7219Error<SPI::Error>> {
        // Forget any previous configuration so a failure leaves us uninitialized
        self.digit_count = None;

        if !config.is_valid() {
            warn!("MAX7219 rejected digit count {}", config.digit_count);
            return Err(Max7219Error::InvalidConfiguration);
        }

        let digit_count = config.digit_count;
        debug!("Initializing MAX7219 with {} digits", digit_count);

        // Shutdown resets the device to a known state
        self.write_register(SHUTDOWN_REGISTER, SHUTDOWN_MODE)?;
        delay
            .delay_ms(config.settle_time.to_millis())
            .map_err(|_| Max7219Error::Delay)?;
        self.write_register(SHUTDOWN_REGISTER, NORMAL_MODE)?;

        self.write_register(SCAN_LIMIT_REGISTER, digit_count - 1)?;
        self.write_register(DECODE_MODE_REGISTER, NO_DECODE)?;
        self.write_register(INTENSITY_REGISTER, config.intensity)?;

        // Digit RAM is undefined at power up
        self.write_all_digits(digit_count, DIGIT_OFF)?;

        self.digit_count = Some(digit_count);
        debug!("MAX7219 initialized");
        Ok(())
    }

    fn write_digit_raw(&mut self, digit_index: u8, value: u8) -> Result<(), Max7219Error<SPI::Error>> {
        let digit_count = self.initialized_digit_count()?;

        if digit_index >= digit_count {
            return Err(Max7219Error::InvalidConfiguration);
        }

        self.write_register(DIGIT_REGISTERS[digit_index as usize], value)
    }

    fn set_intensity(&mut self, intensity: u8) -> Result<(), Max7219Error<SPI::Error>> {
        self.initialized_digit_count()?;
        self.write_register(INTENSITY_REGISTER, intensity & MAX_INTENSITY)
    }

    fn set_display_on(&mut self, on: bool) -> Result<(), Max7219Error<SPI::Error>> {
        self.initialized_digit_count()?;

        if on {
            self.write_register(SHUTDOWN_REGISTER, NORMAL_MODE)
        } else {
            self.write_register(SHUTDOWN_REGISTER, SHUTDOWN_MODE)
        }
    }

    fn set_display_test(&mut self, on: bool) -> Result<(), Max7219Error<SPI::Error>> {
        self.initialized_digit_count()?;

        if on {
            self.write_register(DISPLAY_TEST_REGISTER, DISPLAY_TEST_ON)
        } else {
            self.write_register(DISPLAY_TEST_REGISTER, DISPLAY_TEST_OFF)
        }
    }

    fn clear(&mut self) -> Result<(), Max7219Error<SPI::Error>> {
        let digit_count = self.initialized_digit_count()?;
        self.write_all_digits(digit_count, DIGIT_OFF)
    }

    fn fill(&mut self) -> Result<(), Max7219Error<SPI::Error>> {
        let digit_count = self.initialized_digit_count()?;
        self.write_all_digits(digit_count, DIGIT_ON)
    }
}
