//! Terminal output for the CLI
//!
//! Styled output and progress bars in interactive terminals, plain
//! line-oriented output in CI and pipes.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{
    intro, key_value, outro_error, outro_success, section, step_error, step_ok, step_warn,
};
pub use progress::InstallProgress;
