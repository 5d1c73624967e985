mod cli;
mod error;
mod models;
mod pipeline;
mod reference;
mod scrapers;

use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cli::Cli;
use pipeline::{Pipeline, RunReport};
use reference::ReferenceData;
use scrapers::{NspdClient, RateLimiter, TorgiClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let started = Local::now();
    info!("🗺️  Land Scout - torgi.gov.ru land lots");
    info!("==========================================");
    info!("Started at {}", started.format("%Y-%m-%d %H:%M:%S"));

    if let Err(e) = run(&cli).await {
        error!("Run failed: {:#}", e);
    }

    let finished = Local::now();
    let elapsed = (finished - started).to_std().unwrap_or_default();
    info!("Finished at {}", finished.format("%Y-%m-%d %H:%M:%S"));
    info!("Elapsed: {:.1}s", elapsed.as_secs_f64());

    Ok(())
}

async fn run(cli: &Cli) -> Result<()> {
    let reference = ReferenceData::load(&cli.reference_dir)?;

    // each upstream gets its own budget, scoped to this run
    let registry = TorgiClient::new(Arc::new(RateLimiter::with_interval(cli.registry_delay())))?;
    let geometry = NspdClient::new(Arc::new(RateLimiter::per_minute(cli.geometry_per_minute)))?;

    let pipeline = Pipeline::new(registry, geometry, reference, cli.pipeline_config());
    let report = pipeline.run(&cli.subjects).await?;
    print_summary(&report);

    Ok(())
}

fn print_summary(report: &RunReport) {
    println!();
    println!("Subjects processed: {}", report.processed.len());
    if !report.skipped.is_empty() {
        println!("Subjects skipped:   {}", report.skipped.join(", "));
    }
    println!("Lots saved:         {}", report.lots);
    if let Some(path) = &report.dataset {
        println!("Dataset:            {}", path.display());
    }

    if let Some(stop) = &report.aborted {
        println!();
        println!("⛔ Run aborted at \"{}\", the registry answered:", stop.subject);
        for message in &stop.messages {
            println!("   {}", message);
        }
    }
    println!();
}
