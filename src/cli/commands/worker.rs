//! Worker command - process queued requests until stopped

use crate::app::App;
use crate::cli::args::WorkerArgs;
use crate::error::PrimeResult;
use crate::ui::{self, UiContext};
use tracing::warn;

/// Execute the worker command
pub async fn execute(args: WorkerArgs, app: &App) -> PrimeResult<()> {
    let ctx = UiContext::detect();
    let pool = app.worker_pool(args.concurrency, args.drain);

    if !args.drain {
        ui::step_info(&ctx, "Worker running, press Ctrl-C to stop");
    }

    let stats = pool
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Could not listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    let summary = format!(
        "{} done, {} failed, {} skipped, {} returned to queue",
        stats.done, stats.failed, stats.skipped, stats.returned
    );
    if stats.failed > 0 || stats.returned > 0 {
        ui::step_warn(&ctx, &summary);
    } else {
        ui::step_ok(&ctx, &summary);
    }

    Ok(())
}
