use crate::devices::{self, DeviceDescriptor};
use crate::instructions::*;
use crate::tests;
use crate::transport::{BitBangTransport, HardwareTransport, Transaction, Transport, TransportError};
use log::{debug, warn};
use rppal::gpio::Gpio;
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Minimum recovery time after waking from sleep, counted from the falling
/// edge of chip select (tREC, max 400us on the Fujitsu parts).
const SLEEP_RECOVERY_TIME: Duration = Duration::from_micros(300);
/// Margin kept after releasing chip select; the line must not be asserted
/// again before tREC has elapsed.
const SLEEP_RECOVERY_MARGIN: Duration = Duration::from_micros(100);
/// The MB85RS4MTY wakes from its hibernate mode in 450us rather than 400us.
const HIBERNATE_RECOVERY_EXTRA: Duration = Duration::from_micros(50);

#[derive(Debug, Error)]
pub enum FramError {
    /// The chip select pin could not be claimed at configuration time.
    #[error("chip select not available: {0}")]
    Configuration(rppal::gpio::Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The identified part is not in the capability table.
    #[error("unsupported device: manufacturer ID 0x{manufacturer_id:02X}, product ID 0x{product_id:04X}")]
    UnsupportedDevice { manufacturer_id: u8, product_id: u16 },
    /// The operation requires a capability the identified part lacks.
    #[error("operation not supported by this device")]
    UnsupportedOperation,
}

/// Driver for an SPI FRAM part.
///
/// Every operation frames one command, opens a chip select transaction on the
/// transport, exchanges the frame and closes the transaction before
/// returning. Strictly synchronous; one outstanding transaction at a time.
pub struct FramSpi<T: Transport> {
    transport: T,
    /// Address width in bytes, 2, 3 or 4.
    address_size: u8,
    /// Capability entry for the identified part, set by [`FramSpi::begin`].
    device: Option<&'static DeviceDescriptor>,
}

/// Bit-banged transport over four Raspberry Pi GPIO pins.
pub type GpioBitBang = BitBangTransport<
    rppal::gpio::OutputPin,
    rppal::gpio::OutputPin,
    rppal::gpio::InputPin,
    rppal::gpio::OutputPin,
>;

impl FramSpi<HardwareTransport> {
    /// Opens the hardware SPI peripheral (mode 0, MSB first) with a
    /// software-driven chip select pin.
    ///
    /// The parts clock in data on the first rising edge of the clock signal
    /// (SPI mode 0) and support clock speeds of up to 10 MHz at 3.3 V.
    pub fn hardware(bus: Bus, clock_speed_in_hz: u32, chip_select_pin: u8) -> Result<Self, FramError> {
        let chip_select = Gpio::new()
            .map_err(FramError::Configuration)?
            .get(chip_select_pin)
            .map_err(FramError::Configuration)?
            .into_output_high();
        let spi = Spi::new(bus, SlaveSelect::Ss0, clock_speed_in_hz, Mode::Mode0)
            .map_err(TransportError::Spi)?;
        Ok(Self::new(HardwareTransport::new(spi, chip_select)))
    }
}

impl FramSpi<GpioBitBang> {
    /// Emulates the serial line on arbitrary GPIO pins instead of the SPI
    /// peripheral.
    pub fn bit_banged(sclk_pin: u8, mosi_pin: u8, miso_pin: u8, chip_select_pin: u8) -> Result<Self, FramError> {
        let gpio = Gpio::new().map_err(FramError::Configuration)?;
        let claim = |pin: u8| gpio.get(pin).map_err(FramError::Configuration);
        let transport = BitBangTransport::new(
            claim(sclk_pin)?.into_output_low(),
            claim(mosi_pin)?.into_output_low(),
            claim(miso_pin)?.into_input(),
            claim(chip_select_pin)?.into_output_high(),
        )?;
        Ok(Self::new(transport))
    }
}

impl<T: Transport> FramSpi<T> {
    /// Wraps an already-open transport. The handle starts with 2-byte
    /// addressing and no identified device; call [`FramSpi::begin`] or
    /// [`FramSpi::begin_with_address_size`] before anything else.
    pub fn new(transport: T) -> Self {
        Self { transport, address_size: 2, device: None }
    }

    /// Identifies the attached part and configures addressing from the
    /// capability table: 3 address bytes for parts above 64 KiB, 2 otherwise.
    ///
    /// An unrecognized part leaves the transport open; the caller may still
    /// drive the device by picking an address size explicitly.
    pub fn begin(&mut self) -> Result<(), FramError> {
        let (manufacturer_id, product_id) = self.device_id()?;

        match devices::lookup(manufacturer_id, product_id) {
            Some(device) => {
                self.address_size = if device.capacity > 64 * 1024 { 3 } else { 2 };
                self.device = Some(device);
                debug!(
                    "identified device: manufacturer ID 0x{manufacturer_id:02X}, product ID 0x{product_id:04X}, {} bytes",
                    device.capacity
                );
                Ok(())
            }
            None => {
                warn!(
                    "unexpected device: manufacturer ID 0x{manufacturer_id:02X}, product ID 0x{product_id:04X}"
                );
                self.device = None;
                Err(FramError::UnsupportedDevice { manufacturer_id, product_id })
            }
        }
    }

    /// Initializes with a caller-supplied address size instead of the
    /// capability table. Succeeds on any plausible identification response,
    /// including parts that only report the reserved continuation code; an
    /// all-zeros or all-ones response means nothing answered on the bus.
    pub fn begin_with_address_size(&mut self, address_size: u8) -> Result<(), FramError> {
        let (manufacturer_id, product_id) = self.device_id()?;

        let floating_low = manufacturer_id == 0x00 && product_id == 0x0000;
        let floating_high = manufacturer_id == 0xFF && product_id == 0xFFFF;
        if floating_low || floating_high {
            return Err(FramError::UnsupportedDevice { manufacturer_id, product_id });
        }

        self.address_size = address_size;
        // Keep the capability entry when we happen to know the part.
        self.device = devices::lookup(manufacturer_id, product_id);
        Ok(())
    }

    /// Sets or resets the device's write enable latch. The latch must be set
    /// before every mutating operation; the driver deliberately does not wrap
    /// writes in enable/disable, callers sequence those themselves.
    pub fn write_enable(&mut self, enable: bool) -> Result<(), FramError> {
        let instruction = if enable { SPI_INSTRUCTION_WRITE_ENABLE } else { SPI_INSTRUCTION_WRITE_DISABLE };
        let mut transaction = Transaction::open(&mut self.transport)?;
        transaction.write(&[instruction])?;
        Ok(())
    }

    /// Writes a single byte at `address`.
    pub fn write_byte(&mut self, address: u32, value: u8) -> Result<(), FramError> {
        self.write(address, &[value])
    }

    /// Writes `values` starting at `address`, as one contiguous transaction.
    /// The write is committed by the device when chip select deasserts.
    pub fn write(&mut self, address: u32, values: &[u8]) -> Result<(), FramError> {
        let mut frame = self.command_frame(SPI_INSTRUCTION_WRITE, address);
        frame.extend_from_slice(values);

        let mut transaction = Transaction::open(&mut self.transport)?;
        transaction.write(&frame)?;
        Ok(())
    }

    /// Reads a single byte from `address`.
    pub fn read_byte(&mut self, address: u32) -> Result<u8, FramError> {
        let mut response = [0u8; 1];
        self.read(address, &mut response)?;
        Ok(response[0])
    }

    /// Fills `response` with bytes starting at `address`. The address-bearing
    /// header and the response share a single chip select assertion.
    pub fn read(&mut self, address: u32, response: &mut [u8]) -> Result<(), FramError> {
        let frame = self.command_frame(SPI_INSTRUCTION_READ, address);

        let mut transaction = Transaction::open(&mut self.transport)?;
        transaction.write(&frame)?;
        transaction.read(response)?;
        Ok(())
    }

    /// Reads the 4-byte identification response and splits it into
    /// manufacturer and product IDs.
    pub fn device_id(&mut self) -> Result<(u8, u16), FramError> {
        let mut response = [0u8; 4];
        {
            let mut transaction = Transaction::open(&mut self.transport)?;
            transaction.write(&[SPI_INSTRUCTION_READ_DEVICE_ID])?;
            transaction.read(&mut response)?;
        }
        Ok(parse_device_id(&response))
    }

    /// Reads the status register.
    pub fn status(&mut self) -> Result<u8, FramError> {
        let mut response = [0u8; 1];
        {
            let mut transaction = Transaction::open(&mut self.transport)?;
            transaction.write(&[SPI_INSTRUCTION_READ_STATUS_REGISTER])?;
            transaction.read(&mut response)?;
        }
        Ok(response[0])
    }

    /// Writes the status register.
    pub fn set_status(&mut self, value: u8) -> Result<(), FramError> {
        let mut transaction = Transaction::open(&mut self.transport)?;
        transaction.write(&[SPI_INSTRUCTION_WRITE_STATUS_REGISTER, value])?;
        Ok(())
    }

    /// Enters the part's low-power sleep mode. Fails without touching the bus
    /// when no device was identified or the part does not support sleep.
    pub fn enter_sleep(&mut self) -> Result<(), FramError> {
        self.sleep_capable_device()?;
        let mut transaction = Transaction::open(&mut self.transport)?;
        transaction.write(&[SPI_INSTRUCTION_SLEEP])?;
        Ok(())
    }

    /// Wakes the part from sleep mode. No data is exchanged: chip select is
    /// held asserted through the recovery time, then released.
    pub fn exit_sleep(&mut self) -> Result<(), FramError> {
        let device = self.sleep_capable_device()?;
        {
            let _transaction = Transaction::open(&mut self.transport)?;
            thread::sleep(SLEEP_RECOVERY_TIME);
            // Chip select may go high before tREC elapses, but must not be
            // asserted again until it has.
        }
        thread::sleep(SLEEP_RECOVERY_MARGIN);
        if device.manufacturer_id == 0x04 && device.product_id == 0x490B {
            thread::sleep(HIBERNATE_RECOVERY_EXTRA);
        }
        Ok(())
    }

    /// Capability entry of the identified part, if [`FramSpi::begin`] found one.
    pub fn device(&self) -> Option<&'static DeviceDescriptor> {
        self.device
    }

    /// Current address width in bytes.
    pub fn address_size(&self) -> u8 {
        self.address_size
    }

    /// Overrides the address width (2, 3 or 4 bytes). Addresses are silently
    /// truncated to this width when framed.
    pub fn set_address_size(&mut self, address_size: u8) {
        self.address_size = address_size;
    }

    /// Releases the handle and gives the transport back.
    pub fn into_transport(self) -> T {
        self.transport
    }

    fn sleep_capable_device(&self) -> Result<&'static DeviceDescriptor, FramError> {
        match self.device {
            Some(device) if device.supports_sleep => Ok(device),
            _ => Err(FramError::UnsupportedOperation),
        }
    }

    fn command_frame(&self, instruction: u8, address: u32) -> Vec<u8> {
        let mut frame = Vec::with_capacity(1 + self.address_size as usize);
        frame.push(instruction);
        encode_address(&mut frame, address, self.address_size);
        frame
    }
}

/// Appends `address` to `frame` as exactly `address_size` big-endian bytes.
/// The low two bytes are always emitted; the high bytes only for widths
/// above two. High-order address bits beyond the width are dropped.
fn encode_address(frame: &mut Vec<u8>, address: u32, address_size: u8) {
    if address_size > 3 {
        frame.push((address >> 24) as u8);
    }
    if address_size > 2 {
        frame.push((address >> 16) as u8);
    }
    frame.push((address >> 8) as u8);
    frame.push(address as u8);
}

/// Splits a raw 4-byte identification response into manufacturer and product
/// IDs. Devices carrying the reserved continuation code in their second byte
/// report the product ID one byte later.
pub fn parse_device_id(response: &[u8; 4]) -> (u8, u16) {
    if response[1] == DEVICE_ID_CONTINUATION_CODE {
        (response[0], u16::from(response[2]) << 8 | u16::from(response[3]))
    } else {
        (response[0], u16::from(response[1]) << 8 | u16::from(response[2]))
    }
}

tests! {
    parse_device_id_tests,

    |(response, expected): ([u8; 4], (u8, u16))| {
        let actual = parse_device_id(&response);
        assert_eq!(expected, actual);
    },

    given_fujitsu_response_should_split_after_first_byte: ([0x04, 0x03, 0x02, 0x00], (0x04, 0x0302)),
    given_lapis_response_should_split_after_first_byte: ([0xAE, 0x83, 0x05, 0x00], (0xAE, 0x8305)),
    given_continuation_code_should_skip_second_byte: ([0x7F, 0x7F, 0xAB, 0xCD], (0x7F, 0xABCD)),
    given_cypress_response_should_decode_as_continuation: ([0x7F, 0x7F, 0x7F, 0x7F], (0x7F, 0x7F7F)),
}

tests! {
    address_round_trip_tests,

    |(address_size, address): (u8, u32)| {
        let mut frame = Vec::new();
        encode_address(&mut frame, address, address_size);
        assert_eq!(address_size as usize, frame.len());
        let decoded = frame.iter().fold(0u32, |decoded, byte| decoded << 8 | u32::from(*byte));
        assert_eq!(address, decoded);
    },

    given_two_bytes_should_round_trip_zero: (2, 0x0000),
    given_two_bytes_should_round_trip_highest_address: (2, 0xFFFF),
    given_three_bytes_should_round_trip: (3, 0x01_2345),
    given_three_bytes_should_round_trip_highest_address: (3, 0xFF_FFFF),
    given_four_bytes_should_round_trip: (4, 0xDEAD_BEEF),
    given_four_bytes_should_round_trip_highest_address: (4, 0xFFFF_FFFF),
}

tests! {
    address_truncation_tests,

    |((address_size, address), expected): ((u8, u32), &[u8])| {
        let mut frame = Vec::new();
        encode_address(&mut frame, address, address_size);
        assert_eq!(expected, &frame[..]);
    },

    given_two_bytes_should_drop_high_order_bits: ((2, 0x01_2345), &[0x23, 0x45]),
    given_three_bytes_should_drop_high_order_bits: ((3, 0xAB01_2345), &[0x01, 0x23, 0x45]),
    given_two_bytes_should_emit_big_endian: ((2, 0x1234), &[0x12, 0x34]),
}
