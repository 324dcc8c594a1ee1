//! Progress bar for the install phase

use super::context::UiContext;
use crate::install::AssetResult;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// One tick per manifest asset; plain lines in CI
pub struct InstallProgress {
    bar: Option<ProgressBar>,
}

impl InstallProgress {
    /// Create a progress indicator for `total` assets
    pub fn new(ctx: &UiContext, total: usize) -> Self {
        let bar = if ctx.use_fancy_output() {
            let bar = ProgressBar::new(total as u64);
            if let Ok(bar_style) = ProgressStyle::default_bar()
                .template("  {spinner:.cyan} Staging  {bar:20.cyan/dim} {pos}/{len} {msg:.dim}")
            {
                bar.set_style(bar_style.progress_chars("━╸─"));
            }
            bar.enable_steady_tick(std::time::Duration::from_millis(120));
            Some(bar)
        } else {
            println!("Staging {} assets...", total);
            None
        };
        Self { bar }
    }

    /// Record one settled asset
    pub fn on_asset(&self, result: &AssetResult) {
        match (&self.bar, result) {
            (Some(bar), _) => {
                bar.set_message(result.identifier().to_string());
                bar.inc(1);
            }
            (None, AssetResult::Staged { identifier }) => {
                println!("  {} {}", style("[OK]").green(), identifier);
            }
            (None, AssetResult::Failed { identifier, reason }) => {
                println!("  {} {} ({})", style("[FAIL]").red(), identifier, reason);
            }
        }
    }

    /// Finish and clear the progress bar
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}
