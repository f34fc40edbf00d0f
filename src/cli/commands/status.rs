//! Status command - show one request

use crate::app::App;
use crate::cli::args::{OutputFormat, StatusArgs};
use crate::error::PrimeResult;
use crate::ledger::TaskRequest;
use crate::ui::{self, UiContext};

/// Execute the status command
pub async fn execute(args: StatusArgs, app: &App) -> PrimeResult<()> {
    let request = app.service().status(&args.id).await?;
    print_request(&request, args.format)
}

/// Print a request in the chosen format
pub fn print_request(request: &TaskRequest, format: OutputFormat) -> PrimeResult<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(request)?),
        OutputFormat::Plain => match (&request.result, &request.error) {
            (Some(primes), _) => println!("{}", join(primes)),
            (None, Some(error)) => println!("{}: {}", request.status, error),
            (None, None) => println!("{}", request.status),
        },
        OutputFormat::Table => print_table(request),
    }
    Ok(())
}

fn print_table(request: &TaskRequest) {
    let ctx = UiContext::detect();
    ui::heading(&ctx, &format!("Request {}", request.id));
    ui::key_value(&ctx, "status", &ui::status_label(request.status).to_string());
    ui::key_value(&ctx, "n", &request.n.to_string());
    ui::key_value(
        &ctx,
        "created",
        &request.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    ui::key_value(
        &ctx,
        "updated",
        &request.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    );

    if let Some(ref primes) = request.result {
        ui::key_value(&ctx, "result", &abbreviate(primes, 20));
    }
    if let Some(ref error) = request.error {
        ui::key_value(&ctx, "error", error);
    }
}

fn join(primes: &[u64]) -> String {
    primes
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// First `keep` primes, then an ellipsis and the last one
fn abbreviate(primes: &[u64], keep: usize) -> String {
    match primes.last() {
        Some(last) if primes.len() > keep + 1 => {
            format!("{} ... {} ({} primes)", join(&primes[..keep]), last, primes.len())
        }
        _ => join(primes),
    }
}
