//! Whole-file write and read-back for file sections.
//!
//! Orchestrates the header codec and the transfer engine: a headered firmware
//! file is validated (header CRC, declared size, payload CRC), written to the
//! section, then read back and compared byte for byte. Integrity findings are
//! offered once each to the caller's override policy; transport failures are
//! never overridable.

use crate::cancel::CancelToken;
use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::image::header::{FILE_HEADER_LEN, FileHeader, HeaderError, parse_leading_header};
use crate::image::{Concern, PaddingKind};
use crate::memory::MemoryAccess;
use crate::memory::compare::first_mismatch;
use crate::protocol::crc::crc32;
use crate::section::Section;
use log::{info, warn};

/// Writes firmware files into file sections.
pub struct FirmwareWriter<'a, C: Channel> {
    access: MemoryAccess<'a, C>,
}

impl<'a, C: Channel> FirmwareWriter<'a, C> {
    /// Create a new writer over an open channel.
    pub fn new(channel: &'a mut C) -> Self {
        Self {
            access: MemoryAccess::new(channel),
        }
    }

    /// Validate and write a headered firmware file, then verify by read-back.
    ///
    /// Integrity checks run in order: header CRC, padding beyond the declared
    /// payload, section fit, payload CRC. Each failure is offered once to
    /// `confirm`; declining aborts with the matching error.
    pub fn write_headered(
        &mut self,
        section: &Section,
        file_data: &[u8],
        cancel: &CancelToken,
        confirm: &mut dyn FnMut(&Concern) -> bool,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<()> {
        let big_endian = section.big_endian_header;
        info!(
            "Header byte order: {}",
            if big_endian { "big-endian" } else { "little-endian" }
        );

        let header = match parse_leading_header(file_data, big_endian)? {
            Ok(header) => header,
            Err((header, concern)) => {
                if !confirm(&concern) {
                    warn!("Write declined: {concern}");
                    return Err(concern.to_error());
                }
                info!("Continuing write despite {concern}");
                header
            },
        };

        let payload_end = FILE_HEADER_LEN as u64 + u64::from(header.file_size);
        if payload_end > file_data.len() as u64 {
            return Err(Error::InvalidImage(format!(
                "header declares {} payload bytes but the file holds {}",
                header.file_size,
                file_data.len() - FILE_HEADER_LEN
            )));
        }
        let payload_end = payload_end as usize;

        if file_data.len() > payload_end {
            let concern = Concern::Padding(classify_padding(&file_data[payload_end..]));
            if !confirm(&concern) {
                warn!("Write declined: {concern}");
                return Err(concern.to_error());
            }
            info!("Continuing write: {concern}");
        }

        if file_data.len() as u64 > u64::from(section.size) {
            let concern = Concern::SizeExceedsSection {
                file_len: file_data.len() as u32,
                section_size: section.size,
            };
            if !confirm(&concern) {
                warn!("Write declined: {concern}");
                return Err(concern.to_error());
            }
            info!("Continuing write despite {concern}");
        }

        let computed = crc32(&file_data[FILE_HEADER_LEN..payload_end]);
        if computed != header.file_crc {
            let concern = Concern::PayloadCrcMismatch {
                stored: header.file_crc,
                computed,
            };
            if !confirm(&concern) {
                warn!("Write declined: {concern}");
                return Err(concern.to_error());
            }
            info!("Continuing write despite {concern}");
        }

        info!(
            "File header: size {} bytes, version {:#010X}, file CRC {:#010X}, header CRC {:#010X}",
            header.file_size, header.version, header.file_crc, header.header_crc
        );

        self.write_and_verify(section, file_data, cancel, progress)
    }

    /// Write a headerless file; the section must be able to hold it.
    pub fn write_raw(
        &mut self,
        section: &Section,
        data: &[u8],
        cancel: &CancelToken,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<()> {
        if data.len() as u64 > u64::from(section.size) {
            warn!(
                "File of {} bytes exceeds section \"{}\" of {} bytes",
                data.len(),
                section.name,
                section.size
            );
            return Err(Error::SizeExceedsSection {
                file_len: data.len() as u32,
                section_size: section.size,
            });
        }

        self.write_and_verify(section, data, cancel, progress)
    }

    fn write_and_verify(
        &mut self,
        section: &Section,
        data: &[u8],
        cancel: &CancelToken,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<()> {
        let flags = section.transfer_flags(true);

        info!(
            "Writing {} bytes to section \"{}\" at {:#010X}",
            data.len(),
            section.name,
            section.address
        );
        self.access
            .write(section.address, data, flags, cancel, progress)?;

        info!("Reading back for verification");
        let read_back = self
            .access
            .read(section.address, data.len(), flags, cancel, progress)?;

        match first_mismatch(data, &read_back, section.address)? {
            Some(m) => {
                warn!(
                    "Write verification failed at {:#010X}: wrote {:#04X}, read back {:#04X}",
                    m.address, m.expected, m.actual
                );
                Err(Error::VerificationMismatch {
                    address: m.address,
                    expected: m.expected,
                    actual: m.actual,
                })
            },
            None => {
                info!("Written and read-back data match.");
                Ok(())
            },
        }
    }
}

/// Reads firmware files back out of file sections.
pub struct FirmwareReader<'a, C: Channel> {
    access: MemoryAccess<'a, C>,
}

impl<'a, C: Channel> FirmwareReader<'a, C> {
    /// Create a new reader over an open channel.
    pub fn new(channel: &'a mut C) -> Self {
        Self {
            access: MemoryAccess::new(channel),
        }
    }

    /// Read the file stored in a section, driven by its on-device header.
    ///
    /// An unreadable header can be overridden into a raw whole-section read;
    /// an erased section and a file that overflows its section abort.
    pub fn read_section(
        &mut self,
        section: &Section,
        cancel: &CancelToken,
        confirm: &mut dyn FnMut(&Concern) -> bool,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<Vec<u8>> {
        let flags = section.transfer_flags(false);

        let head = self.access.read(
            section.address,
            FILE_HEADER_LEN,
            flags,
            cancel,
            &mut |_, _| {},
        )?;
        let mut bytes = [0u8; FILE_HEADER_LEN];
        bytes.copy_from_slice(&head);

        match FileHeader::decode(&bytes, section.big_endian_header) {
            Ok(header) => {
                if !header.fits_in(section.size) {
                    warn!(
                        "File of {} bytes exceeds section \"{}\" of {} bytes",
                        header.total_len(),
                        section.name,
                        section.size
                    );
                    return Err(Error::SizeExceedsSection {
                        file_len: header.total_len().min(u64::from(u32::MAX)) as u32,
                        section_size: section.size,
                    });
                }

                info!(
                    "Reading {} bytes from section \"{}\" (file with header)",
                    header.total_len(),
                    section.name
                );
                self.access.read(
                    section.address,
                    header.total_len() as usize,
                    flags,
                    cancel,
                    progress,
                )
            },
            Err(HeaderError::Absent) => {
                warn!("Section \"{}\" is erased, no file to read", section.name);
                Err(Error::FileAbsent)
            },
            Err(HeaderError::CrcMismatch { header, computed }) => {
                let concern = Concern::HeaderCrcMismatch {
                    stored: header.header_crc,
                    computed,
                };
                if !confirm(&concern) {
                    warn!("Read declined: {concern}");
                    return Err(concern.to_error());
                }

                info!("Reading whole section \"{}\" as headerless data", section.name);
                self.access.read(
                    section.address,
                    section.size as usize,
                    flags,
                    cancel,
                    progress,
                )
            },
        }
    }
}

fn classify_padding(padding: &[u8]) -> PaddingKind {
    if padding.iter().all(|&b| b == 0xFF) {
        PaddingKind::Ones
    } else if padding.iter().all(|&b| b == 0x00) {
        PaddingKind::Zeroes
    } else {
        PaddingKind::Mixed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::mem::MemChannel;

    fn section(size: u32) -> Section {
        Section {
            name: "fw".to_string(),
            address: 0x1000,
            size,
            is_virtual: true,
            big_endian_header: false,
        }
    }

    /// A well-formed headered file around `payload`.
    fn headered_file(payload: &[u8]) -> Vec<u8> {
        let header = FileHeader::new(payload.len() as u32, 0x0101, crc32(payload), false);
        let mut file = header.encode(false).to_vec();
        file.extend_from_slice(payload);
        file
    }

    #[test]
    fn test_write_headered_happy_path() {
        let mut channel = MemChannel::new(0x4000, 32);
        let cancel = CancelToken::new();
        let file = headered_file(&[0xA5; 0x20]);

        let mut writer = FirmwareWriter::new(&mut channel);
        writer
            .write_headered(&section(0x800), &file, &cancel, &mut |_| false, &mut |_, _| {})
            .expect("write should succeed");

        assert_eq!(channel.mem_slice(0x1000, file.len()), &file[..]);
    }

    #[test]
    fn test_write_headered_rejects_bad_header_crc() {
        let mut channel = MemChannel::new(0x4000, 32);
        let cancel = CancelToken::new();
        let mut file = headered_file(&[0xA5; 0x20]);
        file[12] ^= 0xFF;

        let mut writer = FirmwareWriter::new(&mut channel);
        let err = writer
            .write_headered(&section(0x800), &file, &cancel, &mut |_| false, &mut |_, _| {})
            .expect_err("bad header CRC should abort");

        assert!(matches!(err, Error::HeaderCrcMismatch { .. }));
        assert!(channel.writes.is_empty());
    }

    #[test]
    fn test_write_headered_override_continues() {
        let mut channel = MemChannel::new(0x4000, 32);
        let cancel = CancelToken::new();
        let mut file = headered_file(&[0xA5; 0x20]);
        file[12] ^= 0xFF;

        let mut offered = Vec::new();
        let mut writer = FirmwareWriter::new(&mut channel);
        writer
            .write_headered(
                &section(0x800),
                &file,
                &cancel,
                &mut |concern| {
                    offered.push(concern.clone());
                    true
                },
                &mut |_, _| {},
            )
            .expect("override should continue");

        // the mismatch is offered exactly once
        assert_eq!(offered.len(), 1);
        assert!(matches!(offered[0], Concern::HeaderCrcMismatch { .. }));
        assert_eq!(channel.mem_slice(0x1000, file.len()), &file[..]);
    }

    #[test]
    fn test_write_headered_padding_concern() {
        let mut channel = MemChannel::new(0x4000, 32);
        let cancel = CancelToken::new();
        let mut file = headered_file(&[0x11; 8]);
        file.extend_from_slice(&[0xFF; 4]);

        let mut writer = FirmwareWriter::new(&mut channel);
        let err = writer
            .write_headered(
                &section(0x800),
                &file,
                &cancel,
                &mut |concern| !matches!(concern, Concern::Padding(PaddingKind::Ones)),
                &mut |_, _| {},
            )
            .expect_err("declined padding should abort");

        assert!(matches!(err, Error::Cancelled));
        assert!(channel.writes.is_empty());
    }

    #[test]
    fn test_write_headered_size_concern() {
        let mut channel = MemChannel::new(0x4000, 32);
        let cancel = CancelToken::new();
        let file = headered_file(&[0x22; 0x40]);

        let mut writer = FirmwareWriter::new(&mut channel);
        let err = writer
            .write_headered(&section(0x30), &file, &cancel, &mut |_| false, &mut |_, _| {})
            .expect_err("oversized file should abort");

        assert!(matches!(err, Error::SizeExceedsSection { .. }));
    }

    #[test]
    fn test_write_headered_payload_crc_concern() {
        let mut channel = MemChannel::new(0x4000, 32);
        let cancel = CancelToken::new();
        let mut file = headered_file(&[0x33; 0x10]);
        // corrupt one payload byte; the header stays self-consistent
        let last = file.len() - 1;
        file[last] ^= 0xFF;

        let mut offered = Vec::new();
        let mut writer = FirmwareWriter::new(&mut channel);
        let err = writer
            .write_headered(
                &section(0x800),
                &file,
                &cancel,
                &mut |concern| {
                    offered.push(concern.clone());
                    false
                },
                &mut |_, _| {},
            )
            .expect_err("declined payload CRC should abort");

        assert!(matches!(err, Error::PayloadCrcMismatch { .. }));
        assert_eq!(offered.len(), 1);
    }

    #[test]
    fn test_write_headered_truncated_payload() {
        let mut channel = MemChannel::new(0x4000, 32);
        let cancel = CancelToken::new();
        let mut file = headered_file(&[0x44; 0x10]);
        file.truncate(FILE_HEADER_LEN + 4);

        let mut writer = FirmwareWriter::new(&mut channel);
        let err = writer
            .write_headered(&section(0x800), &file, &cancel, &mut |_| true, &mut |_, _| {})
            .expect_err("truncated payload should abort");

        assert!(matches!(err, Error::InvalidImage(_)));
    }

    #[test]
    fn test_write_raw_size_check_is_fatal() {
        let mut channel = MemChannel::new(0x4000, 32);
        let cancel = CancelToken::new();

        let mut writer = FirmwareWriter::new(&mut channel);
        let err = writer
            .write_raw(&section(8), &[0x55; 9], &cancel, &mut |_, _| {})
            .expect_err("oversized raw file should abort");

        assert!(matches!(err, Error::SizeExceedsSection { .. }));
        assert!(channel.writes.is_empty());
    }

    #[test]
    fn test_write_verification_mismatch() {
        let mut channel = MemChannel::new(0x4000, 32);
        channel.corrupt_at = Some(0x1002);
        let cancel = CancelToken::new();

        let mut writer = FirmwareWriter::new(&mut channel);
        let err = writer
            .write_raw(&section(0x800), &[0x66; 16], &cancel, &mut |_, _| {})
            .expect_err("corrupted device should fail verification");

        match err {
            Error::VerificationMismatch {
                address,
                expected,
                actual,
            } => {
                assert_eq!(address, 0x1002);
                assert_eq!(expected, 0x66);
                assert_eq!(actual, 0x67);
            },
            other => panic!("expected verification mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_read_section_round_trip() {
        let mut channel = MemChannel::new(0x4000, 32);
        let cancel = CancelToken::new();
        let file = headered_file(&[0x77; 0x18]);
        channel.load(0x1000, &file);

        let mut reader = FirmwareReader::new(&mut channel);
        let data = reader
            .read_section(&section(0x800), &cancel, &mut |_| false, &mut |_, _| {})
            .expect("read should succeed");

        assert_eq!(data, file);
    }

    #[test]
    fn test_read_section_absent() {
        // erased flash: everything reads back 0xFF
        let mut channel = MemChannel::new(0x4000, 32);
        let cancel = CancelToken::new();

        let mut reader = FirmwareReader::new(&mut channel);
        let err = reader
            .read_section(&section(0x800), &cancel, &mut |_| true, &mut |_, _| {})
            .expect_err("erased section should report absent");

        assert!(matches!(err, Error::FileAbsent));
    }

    #[test]
    fn test_read_section_oversized_file() {
        let mut channel = MemChannel::new(0x4000, 32);
        let cancel = CancelToken::new();
        let header = FileHeader::new(0x800, 1, 0, false);
        channel.load(0x1000, &header.encode(false));

        let mut reader = FirmwareReader::new(&mut channel);
        let err = reader
            .read_section(&section(0x800), &cancel, &mut |_| true, &mut |_, _| {})
            .expect_err("file overflowing its section should abort");

        assert!(matches!(err, Error::SizeExceedsSection { .. }));
    }

    #[test]
    fn test_read_section_header_override_reads_raw() {
        let mut channel = MemChannel::new(0x4000, 32);
        let cancel = CancelToken::new();
        // garbage where the header should be, but not the erased sentinel
        channel.load(0x1000, &[0x12, 0x34, 0x56, 0x00, 0x9A, 0xBC]);

        let mut reader = FirmwareReader::new(&mut channel);
        let data = reader
            .read_section(&section(0x40), &cancel, &mut |_| true, &mut |_, _| {})
            .expect("override should read the raw section");

        // the whole section comes back, header bytes included
        assert_eq!(data.len(), 0x40);
        assert_eq!(&data[..4], &[0x12, 0x34, 0x56, 0x00]);
    }

    #[test]
    fn test_read_section_header_declined() {
        let mut channel = MemChannel::new(0x4000, 32);
        let cancel = CancelToken::new();
        channel.load(0x1000, &[0x12, 0x34, 0x56, 0x00, 0x9A, 0xBC]);

        let mut reader = FirmwareReader::new(&mut channel);
        let err = reader
            .read_section(&section(0x40), &cancel, &mut |_| false, &mut |_, _| {})
            .expect_err("declined override should abort");

        assert!(matches!(err, Error::HeaderCrcMismatch { .. }));
    }
}
