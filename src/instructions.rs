// Instruction set.
pub const SPI_INSTRUCTION_WRITE_ENABLE: u8 = 0b0110; // Set the write enable latch (enable write operations).
pub const SPI_INSTRUCTION_WRITE_DISABLE: u8 = 0b0100; // Reset the write enable latch (disable write operations).
pub const SPI_INSTRUCTION_READ_STATUS_REGISTER: u8 = 0b0101; // Read the STATUS register.
pub const SPI_INSTRUCTION_WRITE_STATUS_REGISTER: u8 = 0b0001; // Write the STATUS register.
pub const SPI_INSTRUCTION_READ: u8 = 0b0011; // Read data, starting at the selected address.
pub const SPI_INSTRUCTION_WRITE: u8 = 0b0010; // Write data, starting at the selected address.
pub const SPI_INSTRUCTION_READ_DEVICE_ID: u8 = 0b10011111; // Read the 4-byte device identification.
pub const SPI_INSTRUCTION_SLEEP: u8 = 0b10111001; // Enter low-power sleep mode (not supported by every part).

pub const STATUS_WRITE_IN_PROCESS: u8 = 0b0000_0001; // Write-In-Process bit mask for the STATUS register.
pub const STATUS_WRITE_ENABLE_LATCH: u8 = 0b0000_0010; // Write-Enable-Latch bit mask for the STATUS register.

/// Reserved continuation value in a device identification response. When the
/// second response byte equals this value, the product ID lives in bytes 2..=3
/// instead of bytes 1..=2.
pub const DEVICE_ID_CONTINUATION_CODE: u8 = 0x7F;
