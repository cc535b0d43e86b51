//! Driver for SPI FRAM breakout boards (Fujitsu MB85RS, Cypress FM25V02,
//! Lapis MR45V064B) on a Raspberry Pi 5.
//!
//! The device speaks a small fixed command protocol over a 4-wire clocked
//! serial line; an explicit chip select assertion brackets every command.
//! The driver runs over either the hardware SPI peripheral or a bit-banged
//! emulation on arbitrary GPIO pins.

pub mod devices;
pub mod fram;
pub mod instructions;
mod test_extensions;
pub mod transport;

pub use devices::DeviceDescriptor;
pub use fram::{FramError, FramSpi, GpioBitBang};
pub use transport::{BitBangTransport, HardwareTransport, Transaction, Transport, TransportError};
