//! List command - show submitted requests

use crate::app::App;
use crate::cli::args::{ListArgs, OutputFormat};
use crate::error::PrimeResult;
use crate::ledger::{RequestStatus, TaskRequest};
use crate::ui::{self, UiContext};
use console::style;

/// Execute the list command
pub async fn execute(args: ListArgs, app: &App) -> PrimeResult<()> {
    let mut requests = app.service().list().await?;
    if let Some(filter) = args.status {
        let wanted = RequestStatus::from(filter);
        requests.retain(|r| r.status == wanted);
    }

    if requests.is_empty() {
        match args.format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => ui::step_info(&UiContext::detect(), "No requests"),
        }
        return Ok(());
    }

    match args.format {
        OutputFormat::Table => print_table(&requests),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&requests)?),
        OutputFormat::Plain => {
            for request in &requests {
                println!("{} {} {}", request.id, request.status, request.n);
            }
        }
    }

    Ok(())
}

fn print_table(requests: &[TaskRequest]) {
    println!(
        "{:<34} {:<12} {:>10} {:<20}",
        style("ID").bold(),
        style("STATUS").bold(),
        style("N").bold(),
        style("SUBMITTED").bold()
    );
    println!("{}", "-".repeat(78));

    for request in requests {
        // pad before styling so ANSI codes do not break alignment
        let status = format!("{:<12}", request.status.to_string());
        let status = match request.status {
            RequestStatus::Pending => style(status).dim(),
            RequestStatus::Processing => style(status).yellow(),
            RequestStatus::Done => style(status).green(),
            RequestStatus::Failed => style(status).red(),
        };

        println!(
            "{:<34} {} {:>10} {:<20}",
            request.id,
            status,
            request.n,
            request.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    println!();
    println!("{} request(s)", requests.len());
}
