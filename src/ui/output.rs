//! Output functions for consistent CLI formatting

use super::context::UiContext;
use console::style;

/// Display intro banner
pub fn intro(_ctx: &UiContext, title: &str) {
    println!("{}", style(title).cyan().bold());
    println!();
}

/// Display a section header
pub fn section(_ctx: &UiContext, title: &str) {
    println!();
    println!("{}", style(title).bold());
}

/// Display a success step
pub fn step_ok(ctx: &UiContext, message: &str) {
    let mark = if ctx.use_fancy_output() { "✓" } else { "[OK]" };
    println!("  {} {}", style(mark).green(), message);
}

/// Display a warning step
pub fn step_warn(ctx: &UiContext, message: &str) {
    let mark = if ctx.use_fancy_output() { "!" } else { "[WARN]" };
    println!("  {} {}", style(mark).yellow(), message);
}

/// Display an error step
pub fn step_error(ctx: &UiContext, message: &str) {
    let mark = if ctx.use_fancy_output() { "✗" } else { "[FAIL]" };
    println!("  {} {}", style(mark).red(), message);
}

/// Display an aligned key/value line
pub fn key_value(_ctx: &UiContext, key: &str, value: &str) {
    println!("  {:<18} {}", style(key).dim(), value);
}

/// Display success outro
pub fn outro_success(_ctx: &UiContext, message: &str) {
    println!();
    println!("{}", style(message).green().bold());
}

/// Display error outro
pub fn outro_error(_ctx: &UiContext, message: &str) {
    println!();
    println!("{}", style(message).red().bold());
}
