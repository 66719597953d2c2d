use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = rekindle_worker::Args::parse();

	rekindle_worker::run(args).await
}
