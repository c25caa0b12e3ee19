//! Byte-wise comparison of device contents against a reference file.

use crate::cancel::CancelToken;
use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::image::Concern;
use crate::image::header::parse_leading_header;
use crate::memory::MemoryAccess;
use crate::section::Section;
use log::{info, warn};

/// First mismatching byte found by a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    /// Device address of the mismatching byte.
    pub address: u32,
    /// Byte the reference holds.
    pub expected: u8,
    /// Byte the device holds.
    pub actual: u8,
}

/// Scan for the first byte where `device` differs from `reference`.
///
/// A length difference between the buffers is a precondition failure,
/// reported before any byte is inspected. The scan stops at the first
/// mismatch; there is no full-diff report.
pub fn first_mismatch(
    reference: &[u8],
    device: &[u8],
    base_address: u32,
) -> Result<Option<Mismatch>> {
    if reference.len() != device.len() {
        return Err(Error::LengthMismatch {
            expected: reference.len(),
            actual: device.len(),
        });
    }

    for (i, (&expected, &actual)) in reference.iter().zip(device).enumerate() {
        if expected != actual {
            return Ok(Some(Mismatch {
                address: base_address + i as u32,
                expected,
                actual,
            }));
        }
    }

    Ok(None)
}

/// Compares section contents against reference files.
pub struct FileComparator<'a, C: Channel> {
    access: MemoryAccess<'a, C>,
}

impl<'a, C: Channel> FileComparator<'a, C> {
    /// Create a new comparator over an open channel.
    pub fn new(channel: &'a mut C) -> Self {
        Self {
            access: MemoryAccess::new(channel),
        }
    }

    /// Compare a raw (headerless) file against the section contents.
    pub fn compare_raw(
        &mut self,
        section: &Section,
        file_data: &[u8],
        cancel: &CancelToken,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<Option<Mismatch>> {
        let flags = section.transfer_flags(false);
        let device = self
            .access
            .read(section.address, file_data.len(), flags, cancel, progress)?;

        let result = first_mismatch(file_data, &device, section.address)?;
        log_outcome(result.as_ref());
        Ok(result)
    }

    /// Compare a headered firmware file against the section contents.
    ///
    /// The file's own header checksum is validated first; a mismatch is
    /// offered to `confirm` once and aborts unless overridden.
    pub fn compare_headered(
        &mut self,
        section: &Section,
        file_data: &[u8],
        cancel: &CancelToken,
        confirm: &mut dyn FnMut(&Concern) -> bool,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<Option<Mismatch>> {
        let header = match parse_leading_header(file_data, section.big_endian_header)? {
            Ok(header) => header,
            Err((header, concern)) => {
                if !confirm(&concern) {
                    warn!("Comparison declined: {concern}");
                    return Err(concern.to_error());
                }
                info!("Continuing comparison despite {concern}");
                header
            },
        };

        info!(
            "File header: size {} bytes, version {:#010X}, file CRC {:#010X}, header CRC {:#010X}",
            header.file_size, header.version, header.file_crc, header.header_crc
        );

        let flags = section.transfer_flags(true);
        let device = self
            .access
            .read(section.address, file_data.len(), flags, cancel, progress)?;

        let result = first_mismatch(file_data, &device, section.address)?;
        log_outcome(result.as_ref());
        Ok(result)
    }
}

fn log_outcome(mismatch: Option<&Mismatch>) {
    match mismatch {
        None => info!("Files match."),
        Some(m) => warn!(
            "Files differ at {:#010X}: expected {:#04X}, actual {:#04X}",
            m.address, m.expected, m.actual
        ),
    }
}
