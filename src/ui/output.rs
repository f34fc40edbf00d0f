//! Line-oriented output

use super::context::UiContext;
use crate::ledger::RequestStatus;
use console::{style, StyledObject};

/// Bold section title
pub fn heading(ctx: &UiContext, title: &str) {
    if ctx.is_interactive() {
        println!("{}", style(title).cyan().bold());
    } else {
        println!("{}", title);
    }
}

pub fn step_ok(ctx: &UiContext, message: &str) {
    step(ctx, style("✓").green(), "[OK]", message);
}

pub fn step_info(ctx: &UiContext, message: &str) {
    step(ctx, style("•").cyan(), "[INFO]", message);
}

pub fn step_warn(ctx: &UiContext, message: &str) {
    step(ctx, style("!").yellow(), "[WARN]", message);
}

pub fn step_error(ctx: &UiContext, message: &str) {
    step(ctx, style("✗").red(), "[FAIL]", message);
}

fn step(ctx: &UiContext, symbol: StyledObject<&str>, tag: &str, message: &str) {
    if ctx.is_interactive() {
        println!("  {} {}", symbol, message);
    } else {
        println!("  {} {}", tag, message);
    }
}

/// Aligned `key: value` line
pub fn key_value(ctx: &UiContext, key: &str, value: &str) {
    if ctx.is_interactive() {
        println!("  {:<12} {}", style(format!("{}:", key)).dim(), value);
    } else {
        println!("  {:<12} {}", format!("{}:", key), value);
    }
}

/// Status word colored by state
pub fn status_label(status: RequestStatus) -> StyledObject<String> {
    let label = style(status.to_string());
    match status {
        RequestStatus::Pending => label.dim(),
        RequestStatus::Processing => label.yellow(),
        RequestStatus::Done => label.green(),
        RequestStatus::Failed => label.red(),
    }
}
