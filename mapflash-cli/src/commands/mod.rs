//! Command implementations.

pub(crate) mod erase;
pub(crate) mod info;
pub(crate) mod read;
pub(crate) mod verify;
pub(crate) mod write;

use crate::config::Config;
use anyhow::{Context as _, Result, bail};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use mapflash::{CancelToken, Channel, Concern, SerialChannel};

/// Shared state every command needs.
pub(crate) struct Context {
    pub port: Option<String>,
    pub baud: u32,
    pub yes: bool,
    pub quiet: bool,
    pub config: Config,
    pub cancel: CancelToken,
}

impl Context {
    /// Open the serial channel and apply the configured timeouts.
    pub(crate) fn open_channel(&self) -> Result<SerialChannel> {
        let Some(port) = &self.port else {
            bail!("no serial port given (use --port or MAPFLASH_PORT)");
        };

        let mut channel = SerialChannel::open(port, self.baud)
            .with_context(|| format!("failed to open serial port {port}"))?;
        channel.set_read_timeout(self.config.read_timeout());
        channel.set_write_timeout(self.config.write_timeout());

        if !self.quiet {
            eprintln!(
                "{} Using port {} at {} baud",
                style("→").cyan(),
                port,
                self.baud
            );
        }
        Ok(channel)
    }

    /// Progress bar for one operation, hidden in quiet mode.
    pub(crate) fn progress_bar(&self, label: &str) -> ProgressBar {
        if self.quiet || !console::user_attended_stderr() {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(1);
        #[allow(clippy::unwrap_used)] // Static template string
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:40.cyan/blue}] {pos}/{len}")
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb.set_message(label.to_string());
        pb
    }
}

/// Adapt a progress bar to the engine's `(current, total)` callback.
///
/// The engine finishes every operation with a `(0, 1)` reset; the bar maps
/// that to an empty position and is torn down by the command afterwards.
pub(crate) fn progress_sink(pb: &ProgressBar) -> impl FnMut(usize, usize) + '_ {
    move |current, total| {
        if current == 0 && total == 1 {
            pb.set_position(0);
        } else {
            pb.set_length(total as u64);
            pb.set_position(current as u64);
        }
    }
}

/// Override policy for integrity findings.
///
/// `--yes` continues through every finding; otherwise the user is asked once
/// per finding, and non-interactive runs abort (the engine default).
pub(crate) fn confirm_policy(assume_yes: bool) -> impl FnMut(&Concern) -> bool {
    move |concern| {
        if assume_yes {
            log::warn!("Continuing despite {concern} (--yes)");
            return true;
        }
        if !console::user_attended() {
            return false;
        }
        dialoguer::Confirm::new()
            .with_prompt(format!("{concern}. Continue?"))
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}
