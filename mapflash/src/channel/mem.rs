//! In-memory channel double backing the engine tests.
//!
//! Models a device with a flat address space, a reported maximum packet size
//! at the control address, and optional fault injection per address. Unlike a
//! real transport it never blocks, which keeps the chunk-loop tests fast.

use super::{AddressFlags, Channel, ChannelError};
use crate::memory::PACKET_SIZE_ADDR;
use crate::memory::erase::MEMORY_KIND_ADDR;
use std::time::Duration;

pub(crate) struct MemChannel {
    /// Flat device memory starting at `base`.
    pub mem: Vec<u8>,
    /// Device address of `mem[0]`.
    pub base: u32,
    /// Packet size served at the control address.
    pub max_packet: u32,
    /// Memory kind code served at the kind control address, when set.
    pub kind_code: Option<u8>,
    /// Reads of this address are rejected with `OPERATION_ERROR`.
    pub fail_read_at: Option<u32>,
    /// Writes to this address are rejected with `OPERATION_ERROR`.
    pub fail_write_at: Option<u32>,
    /// Reads of this address never get a reply.
    pub timeout_read_at: Option<u32>,
    /// Memory byte silently flipped after any write covering this address.
    pub corrupt_at: Option<u32>,
    /// Every write request, in order, including rejected ones.
    pub writes: Vec<(u32, Vec<u8>)>,
    /// Every read request, in order.
    pub read_requests: Vec<(u32, usize)>,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl MemChannel {
    pub fn new(len: usize, max_packet: u32) -> Self {
        Self {
            mem: vec![0xFF; len],
            base: 0,
            max_packet,
            kind_code: None,
            fail_read_at: None,
            fail_write_at: None,
            timeout_read_at: None,
            corrupt_at: None,
            writes: Vec::new(),
            read_requests: Vec::new(),
            read_timeout: Duration::from_millis(1000),
            write_timeout: Duration::from_millis(1000),
        }
    }

    /// Preload device memory at `addr`.
    pub fn load(&mut self, addr: u32, bytes: &[u8]) {
        let start = (addr - self.base) as usize;
        self.mem[start..start + bytes.len()].copy_from_slice(bytes);
    }

    pub fn mem_slice(&self, addr: u32, len: usize) -> &[u8] {
        let start = (addr - self.base) as usize;
        &self.mem[start..start + len]
    }
}

impl Channel for MemChannel {
    fn try_read(
        &mut self,
        addr: u32,
        size: usize,
        _flags: AddressFlags,
    ) -> Result<Vec<u8>, ChannelError> {
        self.read_requests.push((addr, size));

        if self.timeout_read_at == Some(addr) {
            return Err(ChannelError::timeout(format!("no reply at {addr:#010X}")));
        }
        if self.fail_read_at == Some(addr) {
            return Err(ChannelError::rejected(
                format!("read rejected at {addr:#010X}"),
                AddressFlags::OPERATION_ERROR,
            ));
        }
        if addr == PACKET_SIZE_ADDR && size == 4 {
            return Ok(self.max_packet.to_le_bytes().to_vec());
        }
        if addr == MEMORY_KIND_ADDR && size == 4 {
            if let Some(code) = self.kind_code {
                return Ok(vec![code, 0, 0, 0]);
            }
        }
        if size as u32 > self.max_packet {
            return Err(ChannelError::rejected(
                format!("read of {size} bytes exceeds packet size"),
                AddressFlags::SIZE_ERROR,
            ));
        }

        let Some(start) = addr.checked_sub(self.base) else {
            return Err(ChannelError::rejected(
                format!("read below memory base at {addr:#010X}"),
                AddressFlags::ADDRESS_ERROR,
            ));
        };
        let start = start as usize;
        let end = start + size;
        if end > self.mem.len() {
            return Err(ChannelError::rejected(
                format!("read past end of memory at {addr:#010X}"),
                AddressFlags::ADDRESS_ERROR,
            ));
        }
        Ok(self.mem[start..end].to_vec())
    }

    fn try_write(
        &mut self,
        addr: u32,
        data: &[u8],
        _flags: AddressFlags,
    ) -> Result<(), ChannelError> {
        self.writes.push((addr, data.to_vec()));

        if self.fail_write_at == Some(addr) {
            return Err(ChannelError::rejected(
                format!("write rejected at {addr:#010X}"),
                AddressFlags::OPERATION_ERROR,
            ));
        }
        if data.len() as u32 > self.max_packet {
            return Err(ChannelError::rejected(
                format!("write of {} bytes exceeds packet size", data.len()),
                AddressFlags::SIZE_ERROR,
            ));
        }

        if let Some(start) = addr.checked_sub(self.base) {
            let start = start as usize;
            let end = start + data.len();
            if end <= self.mem.len() {
                self.mem[start..end].copy_from_slice(data);
                if let Some(corrupt) = self.corrupt_at {
                    let at = (corrupt - self.base) as usize;
                    if (start..end).contains(&at) {
                        self.mem[at] ^= 0x01;
                    }
                }
            }
        }
        Ok(())
    }

    fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    fn set_write_timeout(&mut self, timeout: Duration) {
        self.write_timeout = timeout;
    }

    fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    fn write_timeout(&self) -> Duration {
        self.write_timeout
    }
}
