//! # mapflash
//!
//! A library for programming and verifying the memory of an embedded device
//! over a packetized MAP request/reply link.
//!
//! This crate provides the core functionality for moving arbitrary-length
//! byte ranges between a host and a device address space, including:
//!
//! - Chunked transfers sized to the device-reported maximum packet
//! - File-section header encoding/decoding with CRC-32 integrity checks
//! - Intel-HEX parsing with write-and-verify streaming into device memory
//! - Sector and region erase
//! - Byte-wise comparison of device contents against reference files
//!
//! ## Supported Platforms
//!
//! - Linux, macOS, Windows via the `serialport` crate (`native` feature)
//!
//! ## Features
//!
//! - `native` (default): serial transport support
//! - `serde`: serialization support for configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use mapflash::{CancelToken, FirmwareWriter, Section, SerialChannel};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut channel = SerialChannel::open("/dev/ttyUSB0", 115200)?;
//!
//!     let section = Section {
//!         name: "firmware".to_string(),
//!         address: 0x0080_0000,
//!         size: 0x0004_0000,
//!         is_virtual: false,
//!         big_endian_header: false,
//!     };
//!
//!     let file = std::fs::read("firmware.rbin")?;
//!     let cancel = CancelToken::new();
//!
//!     let mut writer = FirmwareWriter::new(&mut channel);
//!     writer.write_headered(
//!         &section,
//!         &file,
//!         &cancel,
//!         &mut |_concern| false, // batch mode: abort on any integrity finding
//!         &mut |current, total| println!("Writing: {current}/{total}"),
//!     )?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod channel;
pub mod error;
pub mod image;
pub mod memory;
pub mod protocol;
pub mod section;

// Re-exports for convenience
// Native-specific re-exports
#[cfg(feature = "native")]
pub use channel::serial::SerialChannel;
pub use {
    cancel::CancelToken,
    channel::{AddressFlags, Channel, ChannelError, ErrorPacket},
    error::{Error, Result},
    image::{
        Concern, FirmwareReader, FirmwareWriter, HexLoader, HexRecord, PaddingKind,
        header::{FILE_HEADER_LEN, FileHeader, HeaderError},
    },
    memory::{
        DEFAULT_PACKET_SIZE, MemoryAccess, PACKET_SIZE_ADDR,
        compare::{FileComparator, Mismatch, first_mismatch},
        erase::{MEMORY_KIND_ADDR, SectorEraser},
    },
    protocol::crc::crc32,
    protocol::frame::{Frame, Opcode},
    section::{EraseConfig, MemoryKind, Section},
};
