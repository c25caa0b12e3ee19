//! Firmware image formats and file-section operations.

pub mod firmware;
pub mod header;
pub mod ihex;

use crate::error::Error;
use std::fmt;

// Re-export common types
pub use firmware::{FirmwareReader, FirmwareWriter};
pub use header::{FILE_HEADER_LEN, FileHeader, HeaderError};
pub use ihex::{HexLoader, HexRecord};

/// An integrity finding the caller may override.
///
/// Operations offer each concern exactly once to the caller-supplied policy
/// (`FnMut(&Concern) -> bool`); returning `false` aborts with the matching
/// error. Batch callers pass `&mut |_| false`, interactive front ends ask the
/// user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Concern {
    /// The header checksum does not match its payload bytes.
    HeaderCrcMismatch {
        /// CRC stored in the header.
        stored: u32,
        /// CRC computed over the header payload.
        computed: u32,
    },
    /// The payload checksum does not match the payload.
    PayloadCrcMismatch {
        /// CRC stored in the header.
        stored: u32,
        /// CRC computed over the payload.
        computed: u32,
    },
    /// The file does not fit into the target section.
    SizeExceedsSection {
        /// Total file length in bytes.
        file_len: u32,
        /// Capacity of the target section.
        section_size: u32,
    },
    /// The file carries bytes beyond the length its header declares.
    Padding(PaddingKind),
}

/// What the bytes beyond the declared payload look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddingKind {
    /// All padding bytes are `0xFF` (erased-flash fill).
    Ones,
    /// All padding bytes are `0x00`.
    Zeroes,
    /// Mixed trailing bytes, not a recognizable fill.
    Mixed,
}

impl Concern {
    /// The error reported when the caller declines this concern.
    #[must_use]
    pub fn to_error(&self) -> Error {
        match *self {
            Self::HeaderCrcMismatch { stored, computed } => {
                Error::HeaderCrcMismatch { stored, computed }
            },
            Self::PayloadCrcMismatch { stored, computed } => {
                Error::PayloadCrcMismatch { stored, computed }
            },
            Self::SizeExceedsSection {
                file_len,
                section_size,
            } => Error::SizeExceedsSection {
                file_len,
                section_size,
            },
            Self::Padding(_) => Error::Cancelled,
        }
    }
}

impl fmt::Display for Concern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HeaderCrcMismatch { stored, computed } => write!(
                f,
                "header CRC mismatch (stored {stored:#010X}, computed {computed:#010X})"
            ),
            Self::PayloadCrcMismatch { stored, computed } => write!(
                f,
                "file CRC mismatch (stored {stored:#010X}, computed {computed:#010X})"
            ),
            Self::SizeExceedsSection {
                file_len,
                section_size,
            } => write!(
                f,
                "file of {file_len} bytes exceeds section size of {section_size} bytes"
            ),
            Self::Padding(PaddingKind::Ones) => write!(f, "file padded with 0xFF"),
            Self::Padding(PaddingKind::Zeroes) => write!(f, "file padded with 0x00"),
            Self::Padding(PaddingKind::Mixed) => write!(f, "file carries unexpected trailing bytes"),
        }
    }
}
