mod cli;
mod client;
mod logging;
mod model;
mod poller;
mod report;

use std::process::ExitCode;

use clap::Parser;
use client::{Fetcher, FetcherConfig};
use poller::{Exit, Poller};

#[tokio::main(flavor = "current_thread")]
async fn main() -> eyre::Result<ExitCode> {
    // Get args and setup logging.
    let args = cli::Args::parse();
    logging::init(&args.log_level)?;

    let fetcher = Fetcher::new(FetcherConfig {
        url: args.endpoint.clone(),
        ..FetcherConfig::default()
    })?;
    let mut poller = Poller::new(fetcher, args.settings());

    // Poll until done or out of retries.
    let exit = poller.run().await?;
    tracing::debug!(failures = poller.failures(), ?exit, "poller stopped");

    Ok(match exit {
        Exit::Completed => ExitCode::SUCCESS,
        Exit::Failed => ExitCode::FAILURE,
    })
}
