use raspberry_pi_5_fram_spi_driver::instructions::{STATUS_WRITE_ENABLE_LATCH, STATUS_WRITE_IN_PROCESS};
use raspberry_pi_5_fram_spi_driver::{FramError, FramSpi};
use rppal::spi::Bus;
use std::error::Error;

/// 1MHz; the parts are good for up to 10MHz at 3.3V.
const SPI_CLOCK_SPEED: u32 = 1_000_000;
/// Chip select wired to GPIO 8 (the CE0 header pin).
const CHIP_SELECT_PIN: u8 = 8;

fn main() -> Result<(), Box<dyn Error>> {
    let mut fram = FramSpi::hardware(Bus::Spi0, SPI_CLOCK_SPEED, CHIP_SELECT_PIN)?;

    match fram.begin() {
        Ok(()) => {}
        Err(FramError::UnsupportedDevice { manufacturer_id, product_id }) => {
            println!(
                "unexpected device (manufacturer ID 0x{manufacturer_id:02X}, product ID 0x{product_id:04X}), assuming 2-byte addressing"
            );
            fram.set_address_size(2);
        }
        Err(error) => return Err(error.into()),
    }

    if let Some(device) = fram.device() {
        println!(
            "found a {} KiB part (sleep mode: {}), using {}-byte addresses",
            device.capacity / 1024,
            if device.supports_sleep { "yes" } else { "no" },
            fram.address_size()
        );
    }

    let status = fram.status()?;
    println!(
        "status register: 0b{status:08b} (write in process: {}, write enable latch: {})",
        status & STATUS_WRITE_IN_PROCESS != 0,
        status & STATUS_WRITE_ENABLE_LATCH != 0,
    );

    // Presence test: read what is there, bump it, read it back.
    let address = 0x0000;
    let previous = fram.read_byte(address)?;
    println!("byte at 0x{address:04X} was 0x{previous:02X}");

    fram.write_enable(true)?;
    fram.write_byte(address, previous.wrapping_add(1))?;
    fram.write_enable(false)?;

    let current = fram.read_byte(address)?;
    println!("byte at 0x{address:04X} is now 0x{current:02X}");

    Ok(())
}
