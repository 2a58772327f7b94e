//! Terminal output for dircache commands
//!
//! Uses `cliclack` spinners and log lines in interactive terminals and
//! falls back to plain `[OK]`/`[WARN]` lines in CI, where cache
//! commands mostly run.

mod context;
mod output;
mod progress;
mod theme;

pub use context::UiContext;
pub use output::{
    format_bytes, key_value, step_info, step_ok_detail, step_warn_hint,
};
pub use progress::TaskSpinner;
pub use theme::{init_theme, DircacheTheme};
