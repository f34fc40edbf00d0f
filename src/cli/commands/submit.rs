//! Submit command - queue a request and optionally wait for it

use crate::app::App;
use crate::cli::args::{OutputFormat, SubmitArgs};
use crate::cli::commands::status::print_request;
use crate::error::{PrimeError, PrimeResult};
use crate::ledger::{RequestStatus, TaskRequest};
use crate::ui::{self, UiContext, WaitSpinner};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Execute the submit command
pub async fn execute(args: SubmitArgs, app: &App) -> PrimeResult<()> {
    let service = app.service();
    let id = service.submit(args.count).await?;

    if !args.wait {
        match args.format {
            OutputFormat::Json => println!("{}", serde_json::json!({ "id": id })),
            OutputFormat::Plain => println!("{}", id),
            OutputFormat::Table => {
                let ctx = UiContext::detect();
                ui::step_ok(&ctx, &format!("Queued request {} for {} primes", id, args.count));
                ui::step_info(&ctx, &format!("Check progress with: primecache status {}", id));
            }
        }
        return Ok(());
    }

    let poll = Duration::from_millis(app.config().worker.poll_interval_ms.max(10));
    let request = wait_for(app, &id, Duration::from_secs(args.timeout), poll, args.format).await?;
    print_request(&request, args.format)?;

    if request.status == RequestStatus::Failed {
        return Err(PrimeError::RequestFailed {
            id: request.id,
            reason: request.error.unwrap_or_default(),
        });
    }
    Ok(())
}

/// Poll the ledger until the request is terminal or `timeout` passes
async fn wait_for(
    app: &App,
    id: &str,
    timeout: Duration,
    poll: Duration,
    format: OutputFormat,
) -> PrimeResult<TaskRequest> {
    let ctx = if format == OutputFormat::Table {
        UiContext::detect()
    } else {
        UiContext::non_interactive()
    };
    let spinner = (format == OutputFormat::Table)
        .then(|| WaitSpinner::start(&ctx, &format!("Waiting for request {}", id)));

    let deadline = Instant::now() + timeout;
    let service = app.service();
    let result = loop {
        let request = service.status(id).await?;
        if request.status.is_terminal() {
            break Ok(request);
        }

        if let Some(ref spinner) = spinner {
            spinner.set_message(&format!("Request {} is {}", id, request.status));
        }
        if Instant::now() >= deadline {
            debug!(request_id = %id, "Gave up waiting");
            break Err(PrimeError::WaitTimeout {
                id: id.to_string(),
                status: request.status.to_string(),
                waited_secs: timeout.as_secs(),
            });
        }
        sleep(poll).await;
    };

    if let Some(spinner) = spinner {
        spinner.finish();
    }
    result
}
