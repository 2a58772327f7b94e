//! Spinner for transfers with CI fallback

use super::context::UiContext;
use console::style;

/// How a spinner finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Finish {
    Ok,
    Warn,
    Error,
}

/// A task spinner that degrades to plain lines outside a terminal
pub struct TaskSpinner {
    spinner: Option<cliclack::ProgressBar>,
    interactive: bool,
}

impl TaskSpinner {
    /// Create a spinner matching the terminal mode
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.use_fancy_output(),
        }
    }

    /// Start the spinner with a message
    pub fn start(&mut self, message: &str) {
        if self.interactive {
            let spinner = cliclack::spinner();
            spinner.start(message);
            self.spinner = Some(spinner);
        } else {
            println!("{} {}", style("...").dim(), message);
        }
    }

    /// Update the spinner message; silent in plain mode
    pub fn message(&mut self, message: &str) {
        if let Some(ref spinner) = self.spinner {
            spinner.start(message);
        }
    }

    pub fn stop(&mut self, message: &str) {
        self.finish(Finish::Ok, message);
    }

    pub fn stop_warn(&mut self, message: &str) {
        self.finish(Finish::Warn, message);
    }

    pub fn stop_error(&mut self, message: &str) {
        self.finish(Finish::Error, message);
    }

    fn finish(&mut self, how: Finish, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            match how {
                Finish::Error => spinner.error(message),
                Finish::Ok | Finish::Warn => spinner.stop(message),
            }
            return;
        }

        let tag = match how {
            Finish::Ok => style("[OK]").green(),
            Finish::Warn => style("[WARN]").yellow(),
            Finish::Error => style("[FAIL]").red(),
        };
        println!("{} {}", tag, message);
    }
}

impl Drop for TaskSpinner {
    // An early `?` return must not leave a live spinner on the terminal
    fn drop(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.clear();
        }
    }
}
