//! Verify command implementation.

use super::{Context, confirm_policy, progress_sink};
use anyhow::{Context as _, Result, bail};
use console::style;
use mapflash::FileComparator;
use std::path::Path;

pub(crate) fn cmd_verify(ctx: &Context, section_name: &str, file: &Path) -> Result<()> {
    let data = std::fs::read(file)
        .with_context(|| format!("failed to read \"{}\"", file.display()))?;
    if data.is_empty() {
        bail!("file \"{}\" is empty", file.display());
    }

    let section = ctx.config.section(section_name)?;
    let ext = file
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let mut channel = ctx.open_channel()?;
    let pb = ctx.progress_bar("Verifying");

    let mut comparator = FileComparator::new(&mut channel);
    let result = if matches!(ext.as_str(), "rbin" | "rrbf") {
        let mut confirm = confirm_policy(ctx.yes);
        comparator.compare_headered(
            &section,
            &data,
            &ctx.cancel,
            &mut confirm,
            &mut progress_sink(&pb),
        )
    } else {
        comparator.compare_raw(&section, &data, &ctx.cancel, &mut progress_sink(&pb))
    };
    pb.finish_and_clear();
    let mismatch = result?;

    match mismatch {
        None => {
            if !ctx.quiet {
                eprintln!(
                    "{} Section \"{}\" matches \"{}\"",
                    style("✓").green(),
                    section.name,
                    file.display()
                );
            }
            Ok(())
        },
        Some(m) => bail!(
            "files differ at {:#010X}: expected {:#04X}, actual {:#04X}",
            m.address,
            m.expected,
            m.actual
        ),
    }
}
