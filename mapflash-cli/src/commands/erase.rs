//! Erase command implementation.

use super::{Context, progress_sink};
use anyhow::Result;
use console::style;
use mapflash::SectorEraser;

pub(crate) fn cmd_erase(ctx: &Context, section_name: &str, region: bool) -> Result<()> {
    let section = ctx.config.section(section_name)?;
    let erase_config = ctx.config.erase_config();

    let mut channel = ctx.open_channel()?;
    let pb = ctx.progress_bar("Erasing");

    let mut eraser = SectorEraser::new(&mut channel);
    let result = if region {
        eraser.erase_region(&section, &erase_config, &ctx.cancel)
    } else {
        eraser.erase_section(&section, &erase_config, &ctx.cancel, &mut progress_sink(&pb))
    };
    pb.finish_and_clear();
    result?;

    if !ctx.quiet {
        eprintln!(
            "{} Erased section \"{}\" ({} bytes)",
            style("✓").green(),
            section.name,
            section.size
        );
    }
    Ok(())
}
