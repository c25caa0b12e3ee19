//! Chunked memory transfer engine.
//!
//! Moves arbitrary-length byte ranges between the host and the device address
//! space through the [`Channel`] request/reply link. The device cannot accept
//! arbitrarily large payloads, so every transfer is split into packets no
//! larger than the maximum the device reports at a fixed control address; the
//! maximum is re-queried at the start of every top-level operation because the
//! device may resize its buffer between connections.
//!
//! Transfers report progress per chunk and poll a [`CancelToken`] at chunk
//! boundaries. A single packet failure fails the whole call; there are no
//! automatic retries, and a partial result is never treated as success. Every
//! exit path finishes with a `(0, 1)` terminal progress reset so a caller's
//! progress display is never left hanging.

pub mod compare;
pub mod erase;

use crate::cancel::CancelToken;
use crate::channel::{AddressFlags, Channel, ChannelError};
use crate::error::{Error, Result};
use log::{debug, warn};

/// Control address holding the device's maximum packet size (4 bytes LE).
pub const PACKET_SIZE_ADDR: u32 = 0x0000_0000;

/// Packet size used when the device does not report one.
pub const DEFAULT_PACKET_SIZE: u32 = 128;

/// Chunked read/write access to the device address space.
pub struct MemoryAccess<'a, C: Channel> {
    channel: &'a mut C,
}

impl<'a, C: Channel> MemoryAccess<'a, C> {
    /// Create a new accessor over an open channel.
    pub fn new(channel: &'a mut C) -> Self {
        Self { channel }
    }

    /// Get a mutable reference to the underlying channel.
    pub fn channel_mut(&mut self) -> &mut C {
        self.channel
    }

    /// Query the device's maximum packet size.
    ///
    /// Falls back to [`DEFAULT_PACKET_SIZE`] when the control read times out,
    /// is rejected, or reports a useless value; negotiation failure never
    /// fails the enclosing operation.
    pub fn max_packet_size(&mut self) -> u32 {
        match self
            .channel
            .try_read(PACKET_SIZE_ADDR, 4, AddressFlags::empty())
        {
            Ok(data) if data.len() == 4 => {
                let size = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
                if size == 0 {
                    warn!("Device reported packet size 0; using {DEFAULT_PACKET_SIZE} bytes");
                    DEFAULT_PACKET_SIZE
                } else {
                    debug!("Device packet size: {size} bytes");
                    size
                }
            },
            Ok(data) => {
                warn!(
                    "Packet size reply of {} bytes is unusable; using {DEFAULT_PACKET_SIZE} bytes",
                    data.len()
                );
                DEFAULT_PACKET_SIZE
            },
            Err(ChannelError { message, packet: None }) => {
                warn!(
                    "Reply timeout reading packet size; using {DEFAULT_PACKET_SIZE} bytes: {message}"
                );
                DEFAULT_PACKET_SIZE
            },
            Err(ChannelError {
                message,
                packet: Some(packet),
            }) => {
                warn!(
                    "Packet size read rejected {:?}; using {DEFAULT_PACKET_SIZE} bytes: {message}",
                    packet.flags.error_flags()
                );
                DEFAULT_PACKET_SIZE
            },
        }
    }

    /// Read `size` bytes at `addr`.
    ///
    /// Progress is reported as `(bytes_so_far, size)` after each chunk and
    /// reset with `(0, 1)` on every exit path. Cancellation is observed at
    /// chunk boundaries only; everything read before the abort is discarded.
    pub fn read(
        &mut self,
        mut addr: u32,
        size: usize,
        flags: AddressFlags,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<Vec<u8>> {
        let max_packet = self.max_packet_size() as usize;
        let total = size;
        let mut remaining = size;
        let mut data = Vec::with_capacity(size);

        progress(0, total);

        while remaining != 0 {
            if cancel.take() {
                warn!("Read interrupted at {addr:#010X}");
                progress(0, 1);
                return Err(Error::Cancelled);
            }

            let packet = remaining.min(max_packet);
            match self.channel.try_read(addr, packet, flags) {
                Ok(chunk) => data.extend_from_slice(&chunk),
                Err(err) => {
                    progress(0, 1);
                    return Err(classify(addr, packet, err, true));
                },
            }

            addr += packet as u32;
            remaining -= packet;
            progress(total - remaining, total);
        }

        progress(0, 1);
        Ok(data)
    }

    /// Write `data` at `addr`.
    ///
    /// Same chunking discipline as [`read`](Self::read); the final partial
    /// chunk is sent as-is, never padded.
    pub fn write(
        &mut self,
        mut addr: u32,
        data: &[u8],
        flags: AddressFlags,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<()> {
        let max_packet = self.max_packet_size() as usize;
        let total = data.len();
        let mut offset = 0;

        progress(0, total);

        while offset != total {
            if cancel.take() {
                warn!("Write interrupted at {addr:#010X}");
                progress(0, 1);
                return Err(Error::Cancelled);
            }

            let packet = (total - offset).min(max_packet);
            let chunk = &data[offset..offset + packet];
            if let Err(err) = self.channel.try_write(addr, chunk, flags) {
                progress(0, 1);
                return Err(classify(addr, packet, err, false));
            }

            addr += packet as u32;
            offset += packet;
            progress(offset, total);
        }

        progress(0, 1);
        Ok(())
    }
}

/// Turn a channel failure into the transfer error taxonomy.
fn classify(addr: u32, len: usize, err: ChannelError, reading: bool) -> Error {
    let verb = if reading { "read" } else { "write" };
    match err.packet {
        None => {
            warn!(
                "Reply timeout: failed to {verb} {len} bytes at {addr:#010X}: {}",
                err.message
            );
            Error::Timeout { addr, len }
        },
        Some(packet) => {
            let flags = packet.flags.error_flags();
            warn!(
                "Device rejected {verb} of {len} bytes at {addr:#010X} {flags:?}: {}",
                err.message
            );
            Error::Device { addr, len, flags }
        },
    }
}
