pub mod worker;

mod error;

pub use error::{Error, Result};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rekindle_service::RekindleService;

#[derive(Debug, Parser)]
#[command(
	version = rekindle_cli::VERSION,
	rename_all = "kebab",
	styles = rekindle_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: std::path::PathBuf,
	/// Run a single full scan and exit instead of looping on the schedule.
	#[arg(long)]
	pub once: bool,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = rekindle_config::load(&args.config)?;
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let service = RekindleService::new(config)?;
	let mut state = worker::WorkerState::new(service);

	if args.once {
		let summary = worker::scan(&mut state).await?;

		tracing::info!(?summary, "Single scan finished.");

		return Ok(());
	}

	worker::run_worker(state).await
}
