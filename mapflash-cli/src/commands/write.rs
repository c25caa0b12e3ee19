//! Write command implementation.

use super::{Context, confirm_policy, progress_sink};
use anyhow::{Context as _, Result, bail};
use console::style;
use mapflash::{FirmwareWriter, HexLoader};
use std::path::Path;

/// Extensions carrying the 16-byte integrity header.
const HEADERED_EXTENSIONS: &[&str] = &["rbin", "rrbf", "relf"];

pub(crate) fn cmd_write(ctx: &Context, section_name: &str, file: &Path) -> Result<()> {
    let ext = file
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let mut channel = ctx.open_channel()?;
    let pb = ctx.progress_bar("Writing");

    let result = if ext == "hex" {
        // HEX records carry their own addresses; the section is not used.
        let mut loader = HexLoader::new(&mut channel);
        loader.load_file(file, &ctx.cancel, &mut progress_sink(&pb))
    } else {
        let data = std::fs::read(file)
            .with_context(|| format!("failed to read \"{}\"", file.display()))?;
        if data.is_empty() {
            bail!("file \"{}\" is empty", file.display());
        }

        let section = ctx.config.section(section_name)?;
        if !ctx.quiet {
            eprintln!(
                "{} Writing \"{}\" ({} bytes) to section \"{}\" at {:#010X}",
                style("→").cyan(),
                file.display(),
                data.len(),
                section.name,
                section.address
            );
        }

        let mut writer = FirmwareWriter::new(&mut channel);
        let mut confirm = confirm_policy(ctx.yes);
        if HEADERED_EXTENSIONS.contains(&ext.as_str()) {
            writer.write_headered(
                &section,
                &data,
                &ctx.cancel,
                &mut confirm,
                &mut progress_sink(&pb),
            )
        } else {
            writer.write_raw(&section, &data, &ctx.cancel, &mut progress_sink(&pb))
        }
    };

    pb.finish_and_clear();
    result?;
    if !ctx.quiet {
        eprintln!("{} Write complete", style("✓").green());
    }
    Ok(())
}
