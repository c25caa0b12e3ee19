//! MAP frame codec for the packetized request/reply link.
//!
//! Every request and reply on the link shares one frame layout:
//!
//! ```text
//! +----------+--------+------+-------+-------+---------+-----------+--------+
//! |  Magic   | Length |  Op  |  ~Op  | Flags | Address |  Payload  | CRC32  |
//! +----------+--------+------+-------+-------+---------+-----------+--------+
//! | 4 bytes  | 2 bytes|  1   |   1   |   2   |    4    | variable  | 4 bytes|
//! +----------+--------+------+-------+-------+---------+-----------+--------+
//! |  "MAP5"  | total  |  op  |  ~op  | flags |  addr   |   data    |  CRC   |
//! +----------+--------+------+-------+-------+---------+-----------+--------+
//! ```
//!
//! All multi-byte fields are little-endian. The CRC-32 (custom polynomial,
//! see [`crate::protocol::crc`]) covers everything before the CRC field.
//! Read requests carry the requested size as a 2-byte payload; write requests
//! carry the data; replies carry read data (or nothing) and report rejections
//! through the error bits of the flags field.

use crate::channel::AddressFlags;
use crate::protocol::crc::crc32;
use byteorder::{LittleEndian, WriteBytesExt};

/// Frame magic, "MAP5" on the wire.
pub const FRAME_MAGIC: u32 = 0x3550_414D;

/// Fixed frame size without payload:
/// magic(4) + length(2) + op(1) + ~op(1) + flags(2) + addr(4) + crc(4).
pub const FRAME_OVERHEAD: usize = 18;

/// Frame operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Memory read request (0x1E).
    Read = 0x1E,
    /// Memory write request (0x2D).
    Write = 0x2D,
    /// Device reply (0x3C).
    Reply = 0x3C,
}

impl Opcode {
    /// Get the complement byte (~op) stored next to the opcode.
    #[must_use]
    pub fn complement(self) -> u8 {
        !(self as u8)
    }

    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x1E => Some(Self::Read),
            0x2D => Some(Self::Write),
            0x3C => Some(Self::Reply),
            _ => None,
        }
    }
}

/// One frame on the link, either direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Operation code.
    pub opcode: Opcode,
    /// Capability/error flags.
    pub flags: AddressFlags,
    /// Target address of the request, echoed in replies.
    pub address: u32,
    /// Payload bytes.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Build a read request for `size` bytes at `addr`.
    pub fn read_request(addr: u32, size: u16, flags: AddressFlags) -> Self {
        Self {
            opcode: Opcode::Read,
            flags,
            address: addr,
            payload: size.to_le_bytes().to_vec(),
        }
    }

    /// Build a write request carrying `data`.
    pub fn write_request(addr: u32, data: &[u8], flags: AddressFlags) -> Self {
        Self {
            opcode: Opcode::Write,
            flags,
            address: addr,
            payload: data.to_vec(),
        }
    }

    /// Build a reply frame (device side; used by tests and simulators).
    pub fn reply(addr: u32, payload: Vec<u8>, flags: AddressFlags) -> Self {
        Self {
            opcode: Opcode::Reply,
            flags,
            address: addr,
            payload,
        }
    }

    /// Serialize the frame for the wire.
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
    pub fn build(&self) -> Vec<u8> {
        let total_len = FRAME_OVERHEAD + self.payload.len();
        let mut buf = Vec::with_capacity(total_len);

        buf.write_u32::<LittleEndian>(FRAME_MAGIC).unwrap();
        // Safe cast, frame size < 64KB (payload bounded by the packet size)
        buf.write_u16::<LittleEndian>(total_len as u16).unwrap();
        buf.push(self.opcode as u8);
        buf.push(self.opcode.complement());
        buf.write_u16::<LittleEndian>(self.flags.bits()).unwrap();
        buf.write_u32::<LittleEndian>(self.address).unwrap();
        buf.extend_from_slice(&self.payload);

        let crc = crc32(&buf);
        buf.write_u32::<LittleEndian>(crc).unwrap();

        buf
    }

    /// Parse the first complete, checksum-valid frame out of `data`.
    ///
    /// Returns `None` while no such frame is present; the caller keeps
    /// accumulating bytes until its reply deadline expires.
    #[must_use]
    pub fn parse(data: &[u8]) -> Option<Self> {
        let magic_pos = data
            .windows(4)
            .position(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]) == FRAME_MAGIC)?;

        let frame = &data[magic_pos..];
        if frame.len() < FRAME_OVERHEAD {
            return None;
        }

        let total_len = usize::from(u16::from_le_bytes([frame[4], frame[5]]));
        if total_len < FRAME_OVERHEAD || frame.len() < total_len {
            return None;
        }

        let opcode = Opcode::from_byte(frame[6])?;
        if frame[7] != opcode.complement() {
            return None;
        }

        let stored_crc = u32::from_le_bytes([
            frame[total_len - 4],
            frame[total_len - 3],
            frame[total_len - 2],
            frame[total_len - 1],
        ]);
        if crc32(&frame[..total_len - 4]) != stored_crc {
            return None;
        }

        let flags = AddressFlags::from_bits_truncate(u16::from_le_bytes([frame[8], frame[9]]));
        let address = u32::from_le_bytes([frame[10], frame[11], frame[12], frame[13]]);
        let payload = frame[14..total_len - 4].to_vec();

        Some(Self {
            opcode,
            flags,
            address,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_complement() {
        assert_eq!(Opcode::Read.complement(), 0xE1);
        assert_eq!(Opcode::Write.complement(), 0xD2);
        assert_eq!(Opcode::Reply.complement(), 0xC3);
    }

    #[test]
    fn test_read_request_layout() {
        let frame = Frame::read_request(0x0080_0000, 0x40, AddressFlags::PHYSICAL_ADDRESS);
        let data = frame.build();

        // magic + len + op/~op + flags + addr + 2-byte size payload + crc
        assert_eq!(data.len(), FRAME_OVERHEAD + 2);
        assert_eq!(&data[0..4], b"MAP5");
        assert_eq!(&data[4..6], &[0x14, 0x00]); // 20 in little-endian
        assert_eq!(data[6], 0x1E);
        assert_eq!(data[7], 0xE1);
        assert_eq!(&data[10..14], &[0x00, 0x00, 0x80, 0x00]);
        assert_eq!(&data[14..16], &[0x40, 0x00]);
    }

    #[test]
    fn test_write_request_round_trip() {
        let frame = Frame::write_request(
            0x1000,
            &[0xDE, 0xAD, 0xBE, 0xEF],
            AddressFlags::USE_REPLY | AddressFlags::PHYSICAL_ADDRESS,
        );
        let parsed = Frame::parse(&frame.build()).expect("frame should parse");
        assert_eq!(parsed, frame);
    }

    #[test]
    fn test_parse_skips_leading_noise() {
        let frame = Frame::reply(0x2000, vec![0x55; 8], AddressFlags::empty());
        let mut wire = vec![0x00, 0xC1, 0x7F];
        wire.extend_from_slice(&frame.build());
        let parsed = Frame::parse(&wire).expect("frame should parse after noise");
        assert_eq!(parsed.address, 0x2000);
        assert_eq!(parsed.payload, vec![0x55; 8]);
    }

    #[test]
    fn test_parse_incomplete_frame() {
        let wire = Frame::write_request(0, &[0xAA; 16], AddressFlags::USE_REPLY).build();
        assert!(Frame::parse(&wire[..wire.len() - 1]).is_none());
    }

    #[test]
    fn test_parse_rejects_corrupt_crc() {
        let mut wire = Frame::reply(0, vec![1, 2, 3], AddressFlags::empty()).build();
        let last = wire.len() - 1;
        wire[last] ^= 0xFF;
        assert!(Frame::parse(&wire).is_none());
    }

    #[test]
    fn test_reply_carries_error_flags() {
        let frame = Frame::reply(0x3000, Vec::new(), AddressFlags::ADDRESS_ERROR);
        let parsed = Frame::parse(&frame.build()).expect("frame should parse");
        assert_eq!(parsed.flags.error_flags(), AddressFlags::ADDRESS_ERROR);
    }
}
