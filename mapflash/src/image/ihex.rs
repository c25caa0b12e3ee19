//! Intel-HEX record parser and loader.
//!
//! Parses the text record format line by line and streams each data record
//! straight into device memory through the transfer engine, reading every
//! record back for verification. Extended linear address records (type 4)
//! accumulate the high 16 bits applied to all subsequent data records; the
//! accumulator is scoped to one load and starts at zero.
//!
//! ```text
//! Record format:
//! +---+----+------+----+--------------+----+
//! | : | BB | AAAA | TT |   DD...DD    | CC |
//! +---+----+------+----+--------------+----+
//!       byte address type  payload     checksum
//!       count               (BB bytes)
//! ```
//!
//! The trailing checksum byte is part of the line but is not verified, and
//! the final two lines of a file are treated as end-of-file framing and never
//! dispatched as memory operations — both kept as observed behavior of the
//! device tooling this loader replaces.

use crate::cancel::CancelToken;
use crate::channel::{AddressFlags, Channel};
use crate::error::{Error, Result};
use crate::memory::MemoryAccess;
use log::{info, warn};
use std::path::Path;

/// Record type for data records.
pub const DATA_RECORD: u32 = 0;

/// Record type for extended linear address records.
pub const EXTENDED_LINEAR_ADDRESS: u32 = 4;

/// One parsed line of an Intel-HEX file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexRecord {
    /// Number of payload bytes the line declares.
    pub byte_count: u32,
    /// 16-bit load address of the record.
    pub address: u16,
    /// Record type.
    pub kind: u32,
    /// Payload bytes.
    pub data: Vec<u8>,
}

impl HexRecord {
    /// Parse one line; `None` for anything that is not a well-formed record.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        if !line.starts_with(':') {
            return None;
        }

        let byte_count = u32::from_str_radix(line.get(1..3)?, 16).ok()?;
        let address = u16::from_str_radix(line.get(3..7)?, 16).ok()?;
        let kind = u32::from_str_radix(line.get(7..9)?, 16).ok()?;
        let data = hex_bytes(line.get(9..9 + byte_count as usize * 2)?)?;

        Some(Self {
            byte_count,
            address,
            kind,
            data,
        })
    }
}

fn hex_bytes(text: &str) -> Option<Vec<u8>> {
    let mut bytes = Vec::with_capacity(text.len() / 2);
    let mut pos = 0;
    while pos < text.len() {
        bytes.push(u8::from_str_radix(text.get(pos..pos + 2)?, 16).ok()?);
        pos += 2;
    }
    Some(bytes)
}

fn hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join("-")
}

/// High 16 bits from a type-4 record payload.
fn extended_address(data: &[u8]) -> Option<u32> {
    let high: [u8; 2] = data.try_into().ok()?;
    Some(u32::from(u16::from_be_bytes(high)) << 16)
}

/// Streams Intel-HEX files into device memory.
pub struct HexLoader<'a, C: Channel> {
    access: MemoryAccess<'a, C>,
}

impl<'a, C: Channel> HexLoader<'a, C> {
    /// Create a new loader over an open channel.
    pub fn new(channel: &'a mut C) -> Self {
        Self {
            access: MemoryAccess::new(channel),
        }
    }

    /// Load a HEX file from disk into device memory.
    pub fn load_file(
        &mut self,
        path: impl AsRef<Path>,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<()> {
        let path = path.as_ref();
        info!("Loading Intel-HEX file \"{}\"", path.display());

        let text = std::fs::read_to_string(path)?;
        let lines: Vec<&str> = text.lines().collect();
        self.load_lines(&lines, cancel, progress)
    }

    /// Load pre-split HEX lines into device memory.
    ///
    /// Any malformed line is fatal: the whole load aborts with its 1-based
    /// line number and nothing after it is dispatched.
    pub fn load_lines(
        &mut self,
        lines: &[&str],
        cancel: &CancelToken,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<()> {
        let result = self.process_lines(lines, cancel, progress);
        progress(0, 1);
        match &result {
            Ok(()) => info!("HEX load complete."),
            Err(err) => warn!("HEX load failed: {err}"),
        }
        result
    }

    fn process_lines(
        &mut self,
        lines: &[&str],
        cancel: &CancelToken,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<()> {
        if lines.is_empty() {
            return Err(Error::InvalidImage("HEX file is empty".into()));
        }

        // The last two lines are assumed to be EOF framing and are excluded
        // from dispatch regardless of their content.
        let max_lines = lines.len().saturating_sub(2);
        let mut extended: u32 = 0;

        progress(0, max_lines);

        for (i, line) in lines.iter().take(max_lines).enumerate() {
            let line_no = i + 1;

            let Some(record) = HexRecord::parse(line) else {
                return Err(Error::MalformedRecord { line: line_no });
            };

            if record.kind == EXTENDED_LINEAR_ADDRESS {
                extended = extended_address(&record.data)
                    .ok_or(Error::MalformedRecord { line: line_no })?;
                continue;
            }

            if !record.data.is_empty() {
                let addr = extended.wrapping_add(u32::from(record.address));
                self.write_and_verify_record(addr, &record.data, line_no, cancel)?;
            }

            progress(i, max_lines);
        }

        Ok(())
    }

    fn write_and_verify_record(
        &mut self,
        addr: u32,
        data: &[u8],
        line: usize,
        cancel: &CancelToken,
    ) -> Result<()> {
        let flags = AddressFlags::USE_REPLY.union(AddressFlags::PHYSICAL_ADDRESS);

        if let Err(err) = self.access.write(addr, data, flags, cancel, &mut |_, _| {}) {
            warn!(
                "Failed to write {} bytes at {addr:#010X} (line {line})",
                data.len()
            );
            return Err(err);
        }

        let read_back = match self.access.read(addr, data.len(), flags, cancel, &mut |_, _| {}) {
            Ok(read_back) => read_back,
            Err(err) => {
                warn!(
                    "Failed to read {} bytes at {addr:#010X} (line {line})",
                    data.len()
                );
                return Err(err);
            },
        };

        if read_back != data {
            warn!(
                "Record mismatch at line {line}: written {}, read back {}",
                hex_string(data),
                hex_string(&read_back)
            );
            return Err(Error::HexVerifyMismatch { line });
        }

        Ok(())
    }
}
