//! Error types for mapflash.

use crate::channel::AddressFlags;
use std::io;
use thiserror::Error;

/// Result type for mapflash operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for mapflash operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file operations, transport plumbing).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// No reply from the device within the configured timeout.
    #[error("Timeout: no reply for {len} bytes at {addr:#010X}")]
    Timeout {
        /// Address of the failed request.
        addr: u32,
        /// Requested transfer length in bytes.
        len: usize,
    },

    /// The device replied but rejected the request.
    #[error("Device error {flags:?}: {len} bytes at {addr:#010X}")]
    Device {
        /// Address of the rejected request.
        addr: u32,
        /// Requested transfer length in bytes.
        len: usize,
        /// Error sub-flags carried by the reply.
        flags: AddressFlags,
    },

    /// File header checksum mismatch.
    #[error("Header CRC mismatch: stored {stored:#010X}, computed {computed:#010X}")]
    HeaderCrcMismatch {
        /// CRC stored in the header.
        stored: u32,
        /// CRC computed over the header payload.
        computed: u32,
    },

    /// File payload checksum mismatch.
    #[error("File CRC mismatch: stored {stored:#010X}, computed {computed:#010X}")]
    PayloadCrcMismatch {
        /// CRC stored in the header.
        stored: u32,
        /// CRC computed over the payload.
        computed: u32,
    },

    /// The header size field carries the erased-flash sentinel: no file present.
    #[error("No file present (section erased)")]
    FileAbsent,

    /// File does not fit into the target section.
    #[error("File of {file_len} bytes exceeds section size of {section_size} bytes")]
    SizeExceedsSection {
        /// Total file length including the header.
        file_len: u32,
        /// Capacity of the target section.
        section_size: u32,
    },

    /// Invalid image file (truncated, empty, or structurally broken).
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// A line of an Intel-HEX file could not be parsed.
    #[error("Malformed HEX record at line {line}")]
    MalformedRecord {
        /// 1-based line number of the offending record.
        line: usize,
    },

    /// Read-back of a HEX record did not match what was written.
    #[error("HEX record verification failed at line {line}")]
    HexVerifyMismatch {
        /// 1-based line number of the offending record.
        line: usize,
    },

    /// Read-back after a write did not match the written data.
    #[error(
        "Verification failed at {address:#010X}: wrote {expected:#04X}, read back {actual:#04X}"
    )]
    VerificationMismatch {
        /// Address of the first mismatching byte.
        address: u32,
        /// Byte that was written.
        expected: u8,
        /// Byte that was read back.
        actual: u8,
    },

    /// Buffers handed to the comparator differ in length.
    #[error("Length mismatch: reference {expected} bytes, device {actual} bytes")]
    LengthMismatch {
        /// Reference buffer length.
        expected: usize,
        /// Device read-back length.
        actual: usize,
    },

    /// The device reports a different memory kind than the erase expects.
    #[error("Memory kind mismatch: device reports {actual:#04X}, expected {expected:#04X}")]
    MemoryKindMismatch {
        /// Kind code the configuration expects.
        expected: u8,
        /// Kind code the device reported.
        actual: u8,
    },

    /// Operation interrupted via the cancellation token.
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
