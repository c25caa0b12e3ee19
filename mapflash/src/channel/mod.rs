//! Channel abstraction for the packetized request/reply link.
//!
//! The transfer engine is transport-agnostic: it only requires the [`Channel`]
//! trait, which exposes a single read/write request pair against the device
//! address space. Concrete transports implement the trait once per link type.
//!
//! ```text
//! +---------------------+
//! |   Transfer Engine   |
//! |  (memory, image)    |
//! +----------+----------+
//!            |
//!            v
//! +----------+----------+
//! |    Channel Trait    |
//! +----------+----------+
//!            |
//!            v
//! +----------+----------+
//! |    SerialChannel    |
//! |    (serialport)     |
//! +---------------------+
//! ```
//!
//! A failed request distinguishes two cases: the device never replied
//! ([`ChannelError::packet`] is `None`, a timeout) or the device replied with
//! error flags set (the packet carries the rejection reason).

#[cfg(test)]
pub(crate) mod mem;

#[cfg(feature = "native")]
pub mod serial;

use bitflags::bitflags;
use std::fmt;
use std::time::Duration;

bitflags! {
    /// Capability and error flags attached to every memory request.
    ///
    /// The error sub-flags are only meaningful on device replies.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AddressFlags: u16 {
        /// Wait for a confirmation reply to the request.
        const USE_REPLY = 1 << 0;
        /// Address the physical space instead of the virtual/logical one.
        const PHYSICAL_ADDRESS = 1 << 1;
        /// Reply flag: the request length was rejected.
        const SIZE_ERROR = 1 << 2;
        /// Reply flag: the request address was rejected.
        const ADDRESS_ERROR = 1 << 3;
        /// Reply flag: the operation itself was rejected.
        const OPERATION_ERROR = 1 << 4;
    }
}

impl AddressFlags {
    /// The subset of flags a reply may carry to reject a request.
    pub const ERROR_MASK: AddressFlags = AddressFlags::SIZE_ERROR
        .union(AddressFlags::ADDRESS_ERROR)
        .union(AddressFlags::OPERATION_ERROR);

    /// Error sub-flags present in this set.
    #[must_use]
    pub fn error_flags(self) -> AddressFlags {
        self & Self::ERROR_MASK
    }
}

/// Error reply received from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPacket {
    /// Flags field of the rejecting reply.
    pub flags: AddressFlags,
}

/// A failed channel request.
///
/// `packet == None` means the device never replied (timeout); a present
/// packet means the device rejected the request and carries the error flags.
#[derive(Debug)]
pub struct ChannelError {
    /// Human-readable description of the failure.
    pub message: String,
    /// Error reply, when the device produced one.
    pub packet: Option<ErrorPacket>,
}

impl ChannelError {
    /// A timeout: no reply at all.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            packet: None,
        }
    }

    /// A device-flagged rejection.
    pub fn rejected(message: impl Into<String>, flags: AddressFlags) -> Self {
        Self {
            message: message.into(),
            packet: Some(ErrorPacket { flags }),
        }
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.packet {
            Some(packet) => write!(f, "{} ({:?})", self.message, packet.flags.error_flags()),
            None => write!(f, "{} (no reply)", self.message),
        }
    }
}

/// Request/reply access to the device address space.
///
/// One implementation per transport; the engine drives exactly one request at
/// a time, so implementations need no internal locking.
pub trait Channel {
    /// Read `size` bytes at `addr`.
    fn try_read(
        &mut self,
        addr: u32,
        size: usize,
        flags: AddressFlags,
    ) -> std::result::Result<Vec<u8>, ChannelError>;

    /// Write `data` at `addr`.
    fn try_write(
        &mut self,
        addr: u32,
        data: &[u8],
        flags: AddressFlags,
    ) -> std::result::Result<(), ChannelError>;

    /// Set the reply timeout for read requests.
    fn set_read_timeout(&mut self, timeout: Duration);

    /// Set the reply timeout for write requests.
    fn set_write_timeout(&mut self, timeout: Duration);

    /// Get the current read timeout.
    fn read_timeout(&self) -> Duration;

    /// Get the current write timeout.
    fn write_timeout(&self) -> Duration;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mask_extraction() {
        let flags = AddressFlags::USE_REPLY | AddressFlags::SIZE_ERROR | AddressFlags::ADDRESS_ERROR;
        assert_eq!(
            flags.error_flags(),
            AddressFlags::SIZE_ERROR | AddressFlags::ADDRESS_ERROR
        );
    }

    #[test]
    fn test_timeout_has_no_packet() {
        let err = ChannelError::timeout("no reply");
        assert!(err.packet.is_none());
        assert!(err.to_string().contains("no reply"));
    }

    #[test]
    fn test_rejected_carries_flags() {
        let err = ChannelError::rejected("rejected", AddressFlags::OPERATION_ERROR);
        assert_eq!(
            err.packet.as_ref().map(|p| p.flags),
            Some(AddressFlags::OPERATION_ERROR)
        );
    }
}
