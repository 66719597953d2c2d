use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = rekindle_api::Args::parse();

	rekindle_api::run(args).await
}
