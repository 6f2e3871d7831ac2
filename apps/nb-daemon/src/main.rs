use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = nb_daemon::Args::parse();

	nb_daemon::run(args).await
}
