//! Sector erase operations.
//!
//! The device erases flash through a trigger address: writing a 4-byte
//! little-endian sector address to the trigger starts the erase of that
//! sector. Completion is not polled; the engine waits the configured
//! per-sector timeout before issuing the next command. An erase has no undo,
//! so a failed sector aborts the operation without rolling back sectors that
//! are already blank.

use crate::cancel::CancelToken;
use crate::channel::{AddressFlags, Channel};
use crate::error::{Error, Result};
use crate::memory::MemoryAccess;
use crate::section::{EraseConfig, Section};
use log::{info, warn};
use std::thread;

/// Control address holding the populated memory kind code (4 bytes).
pub const MEMORY_KIND_ADDR: u32 = 0x0000_0400;

/// Sector-granular eraser over a channel.
pub struct SectorEraser<'a, C: Channel> {
    access: MemoryAccess<'a, C>,
}

impl<'a, C: Channel> SectorEraser<'a, C> {
    /// Create a new eraser over an open channel.
    pub fn new(channel: &'a mut C) -> Self {
        Self {
            access: MemoryAccess::new(channel),
        }
    }

    /// Read the memory kind code the device reports.
    pub fn read_memory_kind(&mut self, cancel: &CancelToken) -> Result<u8> {
        let data = self.access.read(
            MEMORY_KIND_ADDR,
            4,
            AddressFlags::empty(),
            cancel,
            &mut |_, _| {},
        )?;
        Ok(data[0])
    }

    /// Erase every sector covered by `section`.
    ///
    /// When the configuration names a memory kind, the device-reported kind is
    /// checked first and a mismatch aborts before any sector is touched.
    pub fn erase_section(
        &mut self,
        section: &Section,
        config: &EraseConfig,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<()> {
        let result = self.erase_section_inner(section, config, cancel, progress);
        progress(0, 1);
        match &result {
            Ok(()) => info!("Erase of section \"{}\" complete", section.name),
            Err(err) => warn!("Failed to erase section \"{}\": {err}", section.name),
        }
        result
    }

    fn erase_section_inner(
        &mut self,
        section: &Section,
        config: &EraseConfig,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<()> {
        if let Some(kind) = &config.kind {
            let code = self.read_memory_kind(cancel)?;
            if code != kind.code {
                return Err(Error::MemoryKindMismatch {
                    expected: kind.code,
                    actual: code,
                });
            }
            info!("Selected memory kind: {}", kind.name);
        }

        let sector_size = config.effective_sector_size();
        if sector_size == 0 {
            return Err(Error::Config("erase sector size is zero".into()));
        }

        let count = section.size.div_ceil(sector_size) as usize;
        let trigger = if section.is_virtual {
            config.virtual_trigger
        } else {
            config.physical_trigger
        };

        info!(
            "Erasing section \"{}\" of {} bytes ({count} sectors)",
            section.name, section.size
        );

        for i in 0..count {
            if cancel.take() {
                warn!("Erase interrupted");
                return Err(Error::Cancelled);
            }

            let addr = section.address + sector_size * i as u32;
            info!("Erasing sector at {addr:#010X}");
            progress(i, count);

            if let Err(err) = self.access.write(
                trigger,
                &addr.to_le_bytes(),
                AddressFlags::USE_REPLY,
                cancel,
                &mut |_, _| {},
            ) {
                warn!("Failed to erase sector at {addr:#010X}");
                return Err(err);
            }

            // The device signals nothing on completion; wait it out.
            thread::sleep(config.sector_timeout);
        }

        Ok(())
    }

    /// Erase a whole region with a single `{address, size}` command.
    ///
    /// Some modules erase a region at once instead of per sector; the trigger
    /// then takes an 8-byte little-endian address/size record and needs the
    /// erase timeout as its reply timeout.
    pub fn erase_region(
        &mut self,
        section: &Section,
        config: &EraseConfig,
        cancel: &CancelToken,
    ) -> Result<()> {
        let trigger = if section.is_virtual {
            config.virtual_trigger
        } else {
            config.physical_trigger
        };

        let mut record = Vec::with_capacity(8);
        record.extend_from_slice(&section.address.to_le_bytes());
        record.extend_from_slice(&section.size.to_le_bytes());

        info!(
            "Erasing region \"{}\" of {} bytes at {:#010X}",
            section.name, section.size, section.address
        );

        let saved = self.access.channel_mut().write_timeout();
        self.access.channel_mut().set_write_timeout(config.sector_timeout);
        let result = self.access.write(
            trigger,
            &record,
            AddressFlags::USE_REPLY,
            cancel,
            &mut |_, _| {},
        );
        self.access.channel_mut().set_write_timeout(saved);

        match &result {
            Ok(()) => info!("Erase of region \"{}\" complete", section.name),
            Err(err) => warn!("Failed to erase region \"{}\": {err}", section.name),
        }
        result
    }
}
