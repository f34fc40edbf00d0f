//! Cache command - inspect the shared prime sequence

use crate::app::App;
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::error::PrimeResult;
use crate::ui::{self, UiContext};

/// Execute the cache command
pub async fn execute(args: CacheArgs, app: &App) -> PrimeResult<()> {
    match args.action {
        CacheAction::Show { limit, format } => show(app, limit, format).await,
        CacheAction::Info => info(app).await,
    }
}

async fn show(app: &App, limit: usize, format: OutputFormat) -> PrimeResult<()> {
    let snapshot = app.cache(None).snapshot().await?;
    let shown = match limit {
        0 => &snapshot.primes[..],
        limit => &snapshot.primes[..limit.min(snapshot.primes.len())],
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(shown)?),
        OutputFormat::Plain => {
            for prime in shown {
                println!("{}", prime);
            }
        }
        OutputFormat::Table => {
            let ctx = UiContext::detect();
            ui::heading(
                &ctx,
                &format!(
                    "Showing {} of {} cached primes",
                    shown.len(),
                    snapshot.primes.len()
                ),
            );
            for row in shown.chunks(10) {
                let line: Vec<String> = row.iter().map(|p| format!("{:>8}", p)).collect();
                println!("{}", line.join(""));
            }
        }
    }

    Ok(())
}

async fn info(app: &App) -> PrimeResult<()> {
    let ctx = UiContext::detect();
    let cache = app.cache(None);
    let snapshot = cache.snapshot().await?;
    let holder = cache.lock_holder().await?;
    let queued = app.queue().ready_count().await?;

    ui::heading(&ctx, "Prime cache");
    ui::key_value(&ctx, "data dir", &app.data_dir().display().to_string());
    ui::key_value(&ctx, "store", cache.backend_name());
    ui::key_value(&ctx, "primes", &snapshot.primes.len().to_string());
    ui::key_value(
        &ctx,
        "largest",
        &snapshot
            .largest()
            .map_or_else(|| "-".to_string(), |p| p.to_string()),
    );
    ui::key_value(&ctx, "version", &snapshot.version.to_string());
    ui::key_value(
        &ctx,
        "extending",
        &holder.map_or_else(|| "no".to_string(), |owner| format!("yes ({})", owner)),
    );
    ui::key_value(&ctx, "queued", &queued.to_string());

    Ok(())
}
