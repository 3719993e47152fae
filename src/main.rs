use anyhow::Result;
use stampede::config::Settings;
use stampede::report;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new()?;

    // RUST_LOG wins; the configured level is the fallback.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if settings.logging.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("Starting stampede load test");

    let outcome = stampede::run_test(&settings).await?;
    print!("{}", report::render(&outcome));

    if !outcome.passed() {
        std::process::exit(1);
    }
    Ok(())
}
