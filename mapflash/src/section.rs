//! Memory section and erase configuration types.
//!
//! A [`Section`] is a named, bounded region of the device address space. The
//! engine never owns sections: the configuration layer creates them and every
//! operation borrows one for its duration. Bounds are assumed to be validated
//! by the caller.

use crate::channel::AddressFlags;
use std::time::Duration;

/// A named, bounded, flagged region of device address space.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Section {
    /// Human-readable section name.
    pub name: String,
    /// Base address of the section.
    pub address: u32,
    /// Section capacity in bytes.
    pub size: u32,
    /// Virtual (translated) vs physical addressing for this section.
    pub is_virtual: bool,
    /// Whether file headers in this section use big-endian byte order.
    pub big_endian_header: bool,
}

impl Section {
    /// Addressing flags for a transfer against this section.
    ///
    /// Virtual sections use the device's logical translation (no flag);
    /// physical sections set [`AddressFlags::PHYSICAL_ADDRESS`]. Writes
    /// additionally wait for a confirmation reply.
    #[must_use]
    pub fn transfer_flags(&self, use_reply: bool) -> AddressFlags {
        let mut flags = if self.is_virtual {
            AddressFlags::empty()
        } else {
            AddressFlags::PHYSICAL_ADDRESS
        };
        if use_reply {
            flags |= AddressFlags::USE_REPLY;
        }
        flags
    }
}

/// A memory device kind as reported by the module.
///
/// The device exposes the code of its populated memory at a fixed control
/// address; an erase is only meaningful when the configured kind matches.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemoryKind {
    /// Kind code as reported by the device.
    pub code: u8,
    /// Human-readable name.
    pub name: String,
    /// Erase sector size in bytes.
    pub sector_size: u32,
}

/// Erase parameters for a device configuration.
#[derive(Debug, Clone)]
pub struct EraseConfig {
    /// Trigger address for erasing virtual sections.
    pub virtual_trigger: u32,
    /// Trigger address for erasing physical sections.
    pub physical_trigger: u32,
    /// Synchronous delay after each sector erase command.
    pub sector_timeout: Duration,
    /// Memory kind the erase targets; checked against the device when set.
    pub kind: Option<MemoryKind>,
    /// Sector size in bytes, used when `kind` does not supply one.
    pub sector_size: u32,
}

impl EraseConfig {
    /// Effective sector size: the kind's when configured, the fallback otherwise.
    #[must_use]
    pub fn effective_sector_size(&self) -> u32 {
        self.kind
            .as_ref()
            .map_or(self.sector_size, |k| k.sector_size)
    }
}
