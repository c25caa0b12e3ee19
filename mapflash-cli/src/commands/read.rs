//! Read command implementation.

use super::{Context, confirm_policy, progress_sink};
use anyhow::{Context as _, Result};
use console::style;
use mapflash::FirmwareReader;
use std::path::Path;

pub(crate) fn cmd_read(ctx: &Context, section_name: &str, output: &Path) -> Result<()> {
    let section = ctx.config.section(section_name)?;
    let mut channel = ctx.open_channel()?;
    let pb = ctx.progress_bar("Reading");

    let mut reader = FirmwareReader::new(&mut channel);
    let mut confirm = confirm_policy(ctx.yes);
    let result = reader.read_section(
        &section,
        &ctx.cancel,
        &mut confirm,
        &mut progress_sink(&pb),
    );
    pb.finish_and_clear();
    let data = result?;

    std::fs::write(output, &data)
        .with_context(|| format!("failed to write \"{}\"", output.display()))?;

    if !ctx.quiet {
        eprintln!(
            "{} Read {} bytes from section \"{}\" into \"{}\"",
            style("✓").green(),
            data.len(),
            section.name,
            output.display()
        );
    }
    Ok(())
}
