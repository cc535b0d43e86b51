use bitvec::prelude::*;
use embedded_hal::digital::{InputPin, OutputPin, PinState};
use rppal::spi::Spi;
use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("SPI transfer failed: {0}")]
    Spi(#[from] rppal::spi::Error),
    #[error("pin operation failed: {0}")]
    Pin(String),
}

/// One clocked serial line with an explicit chip select.
///
/// Callers never drive the chip select directly; they open a [`Transaction`]
/// and exchange bytes through it. Multiple devices sharing a bus must
/// serialize their transactions externally.
pub trait Transport {
    /// Drives the chip select line; `true` asserts it (low on the wire).
    fn set_chip_select(&mut self, asserted: bool) -> Result<(), TransportError>;

    /// Clocks all of `bytes` out.
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Clocks `response.len()` bytes in.
    fn read(&mut self, response: &mut [u8]) -> Result<(), TransportError>;
}

/// Brackets one framed command with the chip select line.
///
/// The line is asserted when the transaction opens and deasserted when the
/// guard drops, on every exit path. The device commits a write when the line
/// deasserts, so the guard must live until the last byte of the frame has
/// been clocked out.
pub struct Transaction<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
}

impl<'a, T: Transport + ?Sized> Transaction<'a, T> {
    pub fn open(transport: &'a mut T) -> Result<Self, TransportError> {
        transport.set_chip_select(true)?;
        Ok(Self { transport })
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.transport.write(bytes)
    }

    pub fn read(&mut self, response: &mut [u8]) -> Result<(), TransportError> {
        self.transport.read(response)
    }
}

impl<T: Transport + ?Sized> Drop for Transaction<'_, T> {
    fn drop(&mut self) {
        // Nothing useful can be done with a deassert failure here.
        let _ = self.transport.set_chip_select(false);
    }
}

/// Hardware SPI peripheral with a software-driven chip select pin.
///
/// The chip select is a plain GPIO output rather than the peripheral's own
/// slave select, because waking a part from sleep requires asserting the line
/// with no data exchange at all.
pub struct HardwareTransport {
    spi: Spi,
    chip_select: rppal::gpio::OutputPin,
}

impl HardwareTransport {
    /// Wraps an already-configured SPI peripheral (mode 0, MSB first) and a
    /// chip select pin, which must start out high (deasserted).
    pub fn new(spi: Spi, chip_select: rppal::gpio::OutputPin) -> Self {
        Self { spi, chip_select }
    }
}

impl Transport for HardwareTransport {
    fn set_chip_select(&mut self, asserted: bool) -> Result<(), TransportError> {
        if asserted {
            self.chip_select.set_low();
        } else {
            self.chip_select.set_high();
        }
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.spi.write(bytes)?;
        Ok(())
    }

    fn read(&mut self, response: &mut [u8]) -> Result<(), TransportError> {
        self.spi.read(response)?;
        Ok(())
    }
}

/// Manual bit-level SPI over four GPIO pins: mode 0 (idle-low clock, data
/// sampled on the rising edge), MSB first. Slow, but works on any pins.
pub struct BitBangTransport<SCLK, MOSI, MISO, CS> {
    sclk: SCLK,
    mosi: MOSI,
    miso: MISO,
    chip_select: CS,
}

impl<SCLK, MOSI, MISO, CS> BitBangTransport<SCLK, MOSI, MISO, CS>
where
    SCLK: OutputPin,
    MOSI: OutputPin,
    MISO: InputPin,
    CS: OutputPin,
    SCLK::Error: Debug,
    MOSI::Error: Debug,
    MISO::Error: Debug,
    CS::Error: Debug,
{
    /// Takes ownership of the four pins and drives them to their idle levels
    /// (clock low, chip select high).
    pub fn new(sclk: SCLK, mosi: MOSI, miso: MISO, chip_select: CS) -> Result<Self, TransportError> {
        let mut transport = Self { sclk, mosi, miso, chip_select };
        transport.sclk.set_low().map_err(pin_error)?;
        transport.chip_select.set_high().map_err(pin_error)?;
        Ok(transport)
    }

    /// Shifts one byte out while shifting one byte in, most significant bit
    /// first. GPIO access latency alone keeps the clock rate safely low.
    fn exchange(&mut self, byte: u8) -> Result<u8, TransportError> {
        let mut response = 0u8;
        for bit in [byte].view_bits::<Msb0>() {
            self.mosi.set_state(PinState::from(*bit)).map_err(pin_error)?;
            self.sclk.set_high().map_err(pin_error)?;
            response <<= 1;
            if self.miso.is_high().map_err(pin_error)? {
                response |= 1;
            }
            self.sclk.set_low().map_err(pin_error)?;
        }
        Ok(response)
    }
}

impl<SCLK, MOSI, MISO, CS> Transport for BitBangTransport<SCLK, MOSI, MISO, CS>
where
    SCLK: OutputPin,
    MOSI: OutputPin,
    MISO: InputPin,
    CS: OutputPin,
    SCLK::Error: Debug,
    MOSI::Error: Debug,
    MISO::Error: Debug,
    CS::Error: Debug,
{
    fn set_chip_select(&mut self, asserted: bool) -> Result<(), TransportError> {
        self.chip_select
            .set_state(PinState::from(!asserted))
            .map_err(pin_error)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        for byte in bytes {
            self.exchange(*byte)?;
        }
        Ok(())
    }

    fn read(&mut self, response: &mut [u8]) -> Result<(), TransportError> {
        for slot in response.iter_mut() {
            *slot = self.exchange(0)?;
        }
        Ok(())
    }
}

fn pin_error(error: impl Debug) -> TransportError {
    TransportError::Pin(format!("{error:?}"))
}

#[cfg(test)]
mod transaction_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct RecordingTransport {
        select_transitions: Vec<bool>,
        fail_writes: bool,
    }

    impl Transport for RecordingTransport {
        fn set_chip_select(&mut self, asserted: bool) -> Result<(), TransportError> {
            self.select_transitions.push(asserted);
            Ok(())
        }

        fn write(&mut self, _bytes: &[u8]) -> Result<(), TransportError> {
            if self.fail_writes {
                return Err(TransportError::Pin("forced failure".to_string()));
            }
            Ok(())
        }

        fn read(&mut self, _response: &mut [u8]) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[test]
    fn deasserts_chip_select_when_dropped() {
        let mut transport = RecordingTransport::default();
        {
            let _transaction = Transaction::open(&mut transport).unwrap();
        }
        assert_eq!(vec![true, false], transport.select_transitions);
    }

    #[test]
    fn deasserts_chip_select_when_a_write_fails() {
        let mut transport = RecordingTransport { fail_writes: true, ..Default::default() };
        {
            let mut transaction = Transaction::open(&mut transport).unwrap();
            assert!(transaction.write(&[0x42]).is_err());
        }
        assert_eq!(vec![true, false], transport.select_transitions);
    }
}

#[cfg(test)]
mod bit_bang_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::convert::Infallible;
    use std::rc::Rc;

    /// State shared between the fake pins of one emulated bus.
    #[derive(Default)]
    struct Wire {
        sclk_level: bool,
        mosi_level: bool,
        miso_level: bool,
        chip_select_level: bool,
        /// MOSI level captured at each rising clock edge.
        bits_out: Vec<bool>,
        /// Bits the fake device drives onto MISO, one per rising edge.
        bits_in: Vec<bool>,
    }

    impl Wire {
        fn rising_edge(&mut self) {
            self.bits_out.push(self.mosi_level);
            self.miso_level = if self.bits_in.is_empty() { false } else { self.bits_in.remove(0) };
        }
    }

    #[derive(Clone, Copy)]
    enum Role {
        Sclk,
        Mosi,
        Miso,
        ChipSelect,
    }

    struct FakePin {
        wire: Rc<RefCell<Wire>>,
        role: Role,
    }

    impl embedded_hal::digital::ErrorType for FakePin {
        type Error = Infallible;
    }

    impl OutputPin for FakePin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.set(false)
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.set(true)
        }
    }

    impl InputPin for FakePin {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.wire.borrow().miso_level)
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.wire.borrow().miso_level)
        }
    }

    impl FakePin {
        fn set(&mut self, level: bool) -> Result<(), Infallible> {
            let mut wire = self.wire.borrow_mut();
            match self.role {
                Role::Sclk => {
                    if level && !wire.sclk_level {
                        wire.rising_edge();
                    }
                    wire.sclk_level = level;
                }
                Role::Mosi => wire.mosi_level = level,
                Role::Miso => unreachable!("MISO is an input"),
                Role::ChipSelect => wire.chip_select_level = level,
            }
            Ok(())
        }
    }

    fn emulated_bus() -> (Rc<RefCell<Wire>>, BitBangTransport<FakePin, FakePin, FakePin, FakePin>) {
        let wire = Rc::new(RefCell::new(Wire::default()));
        let pin = |role| FakePin { wire: Rc::clone(&wire), role };
        let transport =
            BitBangTransport::new(pin(Role::Sclk), pin(Role::Mosi), pin(Role::Miso), pin(Role::ChipSelect)).unwrap();
        (wire, transport)
    }

    fn bits_of(byte: u8) -> Vec<bool> {
        [byte].view_bits::<Msb0>().iter().map(|bit| *bit).collect()
    }

    #[test]
    fn shifts_bytes_out_most_significant_bit_first() {
        let (wire, mut transport) = emulated_bus();
        transport.write(&[0b1010_0011]).unwrap();
        assert_eq!(
            vec![true, false, true, false, false, false, true, true],
            wire.borrow().bits_out
        );
    }

    #[test]
    fn clocks_exactly_eight_edges_per_byte() {
        let (wire, mut transport) = emulated_bus();
        transport.write(&[0x00, 0xFF]).unwrap();
        assert_eq!(16, wire.borrow().bits_out.len());
    }

    #[test]
    fn shifts_device_response_in_most_significant_bit_first() {
        let (wire, mut transport) = emulated_bus();
        wire.borrow_mut().bits_in = bits_of(0x5A);
        let mut response = [0u8; 1];
        transport.read(&mut response).unwrap();
        assert_eq!(0x5A, response[0]);
    }

    #[test]
    fn idles_with_clock_low_and_chip_select_high() {
        let (wire, _transport) = emulated_bus();
        assert!(!wire.borrow().sclk_level);
        assert!(wire.borrow().chip_select_level);
    }

    #[test]
    fn asserting_chip_select_drives_the_line_low() {
        let (wire, mut transport) = emulated_bus();
        transport.set_chip_select(true).unwrap();
        assert!(!wire.borrow().chip_select_level);
        transport.set_chip_select(false).unwrap();
        assert!(wire.borrow().chip_select_level);
    }
}
