use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use stressload::config::worker_threads;
use stressload::{Profile, Report, RunConfig, Scheduler};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Load profile to run
    #[arg(long = "test-type", value_enum)]
    test_type: Profile,

    /// Requests per second, total budget, or concurrent requests per URL,
    /// depending on the test type
    #[arg(long)]
    clients: usize,

    /// Duration of the test in seconds
    #[arg(long)]
    duration: u64,

    /// Timeout for each request in seconds
    #[arg(short = 'T', long, default_value_t = 10)]
    timeout: u64,

    /// Number of runtime threads to use
    #[arg(short = 't', long, default_value_t = num_cpus::get())]
    threads: usize,

    /// Target URLs
    #[arg(required = true)]
    urls: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args = Args::parse();

    let config = RunConfig::new(args.urls, args.test_type, args.clients, args.duration)?
        .with_timeout(Duration::from_secs(args.timeout))?;
    let threads = worker_threads(args.threads)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(threads)
        .enable_all()
        .build()?;

    runtime.block_on(run(config))
}

async fn run(config: RunConfig) -> Result<()> {
    println!(
        "Running {}s {} test @ {}",
        config.duration_secs,
        config.profile,
        config.urls.join(", ")
    );
    println!("  {} clients, {}s request timeout", config.clients, config.timeout.as_secs());
    println!();

    let profile = config.profile;
    let duration_secs = config.duration_secs;
    let scheduler = Scheduler::new(config);

    let cancel = scheduler.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping run");
            cancel.cancel();
        }
    });

    let mut progress = scheduler.progress_rx();
    let printer = tokio::spawn(async move {
        loop {
            let pct = *progress.borrow_and_update();
            print!("\rTest in progress... {}%", pct);
            if let Err(e) = std::io::stdout().flush() {
                tracing::debug!("Failed to flush progress line: {}", e);
            }
            if progress.changed().await.is_err() {
                break;
            }
        }
    });

    let snapshot = scheduler.run().await?;
    // The progress sender is gone with the scheduler, so the printer exits.
    if let Err(e) = printer.await {
        tracing::warn!("Progress printer ended abnormally: {}", e);
    }
    println!("\rTest complete.              ");
    println!();

    print!("{}", Report::new(profile, duration_secs, &snapshot));
    Ok(())
}
