//! Spinner shown while waiting on a request

use super::context::UiContext;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner in a terminal, a single line otherwise
pub struct WaitSpinner {
    bar: Option<ProgressBar>,
}

impl WaitSpinner {
    pub fn start(ctx: &UiContext, message: &str) -> Self {
        let bar = if ctx.is_interactive() {
            let bar = ProgressBar::new_spinner();
            if let Ok(spinner_style) =
                ProgressStyle::default_spinner().template("  {spinner:.cyan} {msg}  {elapsed:.dim}")
            {
                bar.set_style(spinner_style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
            }
            bar.set_message(message.to_string());
            bar.enable_steady_tick(Duration::from_millis(120));
            Some(bar)
        } else {
            println!("{} {}", style("...").dim(), message);
            None
        };
        Self { bar }
    }

    /// Replace the message; silent in plain mode
    pub fn set_message(&self, message: &str) {
        if let Some(ref bar) = self.bar {
            bar.set_message(message.to_string());
        }
    }

    /// Remove the spinner line
    pub fn finish(self) {
        if let Some(bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_spinner() {
        let spinner = WaitSpinner::start(&UiContext::non_interactive(), "Waiting");
        spinner.set_message("Still waiting");
        spinner.finish();
    }
}
