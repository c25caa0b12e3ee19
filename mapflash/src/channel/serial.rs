//! Serial channel implementation using the `serialport` crate.
//!
//! Wraps a serial link in the MAP frame codec: each request is one frame on
//! the wire, and the reply (when one is expected) is accumulated until a
//! checksum-valid frame appears or the per-operation deadline expires.

use crate::channel::{AddressFlags, Channel, ChannelError};
use crate::error::Result;
use crate::protocol::frame::{Frame, Opcode};
use log::trace;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

/// Poll interval for the underlying port while waiting for a reply.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default reply timeout until the caller configures one.
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// MAP channel over a serial port.
pub struct SerialChannel {
    port: Box<dyn serialport::SerialPort>,
    name: String,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl SerialChannel {
    /// Open a serial port and wrap it in a MAP channel.
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(POLL_INTERVAL)
            .open()?;

        Ok(Self {
            port,
            name: port_name.to_string(),
            read_timeout: DEFAULT_TIMEOUT,
            write_timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Get the port name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send one request frame and wait for the reply frame.
    fn transact(&mut self, request: &Frame, deadline: Duration) -> std::result::Result<Frame, ChannelError> {
        let _ = self.port.clear(serialport::ClearBuffer::Input);

        let wire = request.build();
        trace!("Sending {:?} frame: {} bytes", request.opcode, wire.len());
        self.port
            .write_all(&wire)
            .and_then(|()| self.port.flush())
            .map_err(|e| ChannelError::timeout(format!("send failed: {e}")))?;

        let start = Instant::now();
        let mut acc: Vec<u8> = Vec::new();
        let mut buf = [0u8; 256];

        while start.elapsed() < deadline {
            match self.port.read(&mut buf) {
                Ok(n) if n > 0 => {
                    acc.extend_from_slice(&buf[..n]);
                    if let Some(frame) = Frame::parse(&acc) {
                        if frame.opcode == Opcode::Reply {
                            trace!("Reply frame: {} payload bytes", frame.payload.len());
                            return Ok(frame);
                        }
                        // Not a reply (echo or stray traffic); keep listening.
                        acc.clear();
                    }
                },
                Ok(_) => {},
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {},
                Err(e) => {
                    return Err(ChannelError::timeout(format!("receive failed: {e}")));
                },
            }
        }

        Err(ChannelError::timeout(format!(
            "no reply within {} ms",
            deadline.as_millis()
        )))
    }
}

impl Channel for SerialChannel {
    fn try_read(
        &mut self,
        addr: u32,
        size: usize,
        flags: AddressFlags,
    ) -> std::result::Result<Vec<u8>, ChannelError> {
        let Ok(request_size) = u16::try_from(size) else {
            return Err(ChannelError::rejected(
                format!("read of {size} bytes cannot be framed"),
                AddressFlags::SIZE_ERROR,
            ));
        };

        let request = Frame::read_request(addr, request_size, flags);
        let reply = self.transact(&request, self.read_timeout)?;

        let errors = reply.flags.error_flags();
        if !errors.is_empty() {
            return Err(ChannelError::rejected(
                format!("device rejected read at {addr:#010X}"),
                errors,
            ));
        }
        if reply.payload.len() != size {
            return Err(ChannelError::rejected(
                format!(
                    "short reply: requested {size} bytes, received {}",
                    reply.payload.len()
                ),
                AddressFlags::empty(),
            ));
        }

        Ok(reply.payload)
    }

    fn try_write(
        &mut self,
        addr: u32,
        data: &[u8],
        flags: AddressFlags,
    ) -> std::result::Result<(), ChannelError> {
        let request = Frame::write_request(addr, data, flags);

        if !flags.contains(AddressFlags::USE_REPLY) {
            // Fire-and-forget write; nothing to wait for.
            let wire = request.build();
            return self
                .port
                .write_all(&wire)
                .and_then(|()| self.port.flush())
                .map_err(|e| ChannelError::timeout(format!("send failed: {e}")));
        }

        let reply = self.transact(&request, self.write_timeout)?;
        let errors = reply.flags.error_flags();
        if !errors.is_empty() {
            return Err(ChannelError::rejected(
                format!("device rejected write at {addr:#010X}"),
                errors,
            ));
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
