use std::collections::VecDeque;
use embedded_hal::spi::{ErrorType, Error, ErrorKind, SpiBusFlush, SpiBusWrite};

use super::{Event, Trace};

struct Write {
    bytes: Vec<u8>,
    ret: Result<(), MockError>,
}

/// A mock of the write half of embedded_hal::spi::SpiBus for testing purposes.
pub struct MockSpi {
    writes: VecDeque<Write>,
    flushes: usize,
    trace: Option<Trace>,
}

impl MockSpi {
    pub fn new() -> Self {
        Self {
            writes: VecDeque::new(),
            flushes: 0,
            trace: None,
        }
    }

    /// Records every successful write into `trace` as well.
    pub fn with_trace(mut self, trace: &Trace) -> Self {
        self.trace = Some(trace.clone());
        self
    }

    pub fn expect_write(&mut self, bytes: &[u8]) {
        self.writes.push_back(Write {
            bytes: bytes.to_vec(),
            ret: Ok(()),
        });
    }

    pub fn expect_write_err(&mut self, err: MockError) {
        self.writes.push_back(Write {
            bytes: vec!(),
            ret: Err(err),
        });
    }

    /// Number of times the bus was flushed.
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    pub fn verify(&self) {
        assert_eq!(self.writes.len(), 0, "less writes were performed than expected");
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum MockError {
    Bad,
    Timeout,
}

impl Error for MockError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

impl ErrorType for MockSpi {
    type Error = MockError;
}

impl SpiBusFlush for MockSpi {
    fn flush(&mut self) -> Result<(), Self::Error> {
        self.flushes += 1;
        Ok(())
    }
}

impl SpiBusWrite for MockSpi {
    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        if let Some(write) = self.writes.pop_front() {
            if write.ret.is_ok() {
                assert_eq!(words, write.bytes, "Unexpected write bytes: {:x?}", words);

                if let Some(trace) = &self.trace {
                    trace.push(Event::Write(words.to_vec()));
                }
            }

            write.ret
        } else {
            panic!("Unexpected write({:x?})", words);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write() {
        let mut spi = MockSpi::new();

        spi.expect_write(&[0x0C, 0x01]);
        spi.write(&[0x0C, 0x01]).unwrap();

        spi.verify();
    }

    #[test]
    fn test_write_err() {
        let mut spi = MockSpi::new();

        spi.expect_write_err(MockError::Timeout);
        assert_eq!(spi.write(&[0x01, 0x00]), Err(MockError::Timeout));

        spi.verify();
    }

    #[test]
    fn test_write_is_traced() {
        let trace = Trace::new();
        let mut spi = MockSpi::new().with_trace(&trace);

        spi.expect_write(&[1, 2]);
        spi.write(&[1, 2]).unwrap();
        spi.flush().unwrap();

        assert_eq!(trace.events(), vec![Event::Write(vec![1, 2])]);
        assert_eq!(spi.flushes(), 1);
        spi.verify();
    }

    #[test]
    #[should_panic]
    fn test_unexpected_bytes() {
        let mut spi = MockSpi::new();

        spi.expect_write(&[1, 2]);
        spi.write(&[2, 1]).unwrap();
    }

    #[test]
    #[should_panic]
    fn test_multiple_calls_fail() {
        let mut spi = MockSpi::new();

        spi.expect_write(&[0]);
        spi.expect_write(&[1]);
        spi.expect_write(&[2]);
        spi.write(&[0]).unwrap();
        spi.write(&[1]).unwrap();

        spi.verify();
    }
}
