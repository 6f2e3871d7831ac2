use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre;
use tokio::signal::unix::{SignalKind, signal};
use tracing_subscriber::EnvFilter;

use nb_sync::{SyncEngine, store::RecordPatch};

#[derive(Debug, Parser)]
#[command(
	version = nb_cli::VERSION,
	rename_all = "kebab",
	styles = nb_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Scan the notes root, then keep it in sync until interrupted. SIGHUP restarts the job.
	Run,
	/// Run one initial scan and exit.
	Scan,
	/// Update a stored record and write it back to disk.
	Edit(EditArgs),
}

#[derive(Debug, clap::Args)]
pub struct EditArgs {
	/// Note path relative to the notes root.
	pub path: String,
	#[arg(long)]
	pub content: Option<String>,
	/// Front matter as a JSON object. Wins over `--raw-frontmatter`.
	#[arg(long, value_name = "JSON")]
	pub frontmatter_json: Option<String>,
	#[arg(long, value_name = "YAML")]
	pub raw_frontmatter: Option<String>,
}
impl EditArgs {
	fn into_patch(self) -> eyre::Result<(String, RecordPatch)> {
		if self.content.is_none() && self.frontmatter_json.is_none() && self.raw_frontmatter.is_none()
		{
			return Err(eyre::eyre!(
				"edit needs at least one of --content, --frontmatter-json, or --raw-frontmatter."
			));
		}

		let patch = RecordPatch {
			content: self.content,
			frontmatter_json: self.frontmatter_json,
			raw_frontmatter: self.raw_frontmatter,
		};

		Ok((self.path, patch))
	}
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = nb_config::load(&args.config)?;

	init_tracing(&config)?;

	let engine = SyncEngine::open(&config).await?;
	let result = match args.command {
		Command::Run => serve(&engine).await,
		Command::Scan => scan(&engine).await,
		Command::Edit(edit) => edit_record(&engine, edit).await,
	};

	engine.shutdown().await?;

	result
}

async fn serve(engine: &SyncEngine) -> color_eyre::Result<()> {
	let (manager, control) = engine.manager();
	let manager = tokio::spawn(manager.run());
	let mut hangup = signal(SignalKind::hangup())?;

	control.start().await?;

	loop {
		tokio::select! {
			_ = hangup.recv() => {
				tracing::info!("Received SIGHUP. Restarting sync job.");

				control.restart().await?;
			},
			result = tokio::signal::ctrl_c() => {
				result?;

				tracing::info!("Received interrupt. Shutting down.");

				break;
			},
		}
	}

	drop(control);
	manager.await?;

	Ok(())
}

async fn scan(engine: &SyncEngine) -> color_eyre::Result<()> {
	let report = engine.scan().await?;

	println!(
		"walked={} parsed={} parse_failures={} inserted={} updated={} unchanged={} propagated={} \
		 failed_batches={} elapsed_ms={}",
		report.walked,
		report.parsed,
		report.parse_failures,
		report.inserted,
		report.updated,
		report.unchanged,
		report.propagated,
		report.failed_batches,
		report.elapsed.as_millis(),
	);

	Ok(())
}

async fn edit_record(engine: &SyncEngine, edit: EditArgs) -> color_eyre::Result<()> {
	let (path, patch) = edit.into_patch()?;
	let update = engine.store().update_record(path, patch).await?;

	match &update.propagation {
		Some(propagation) => tracing::info!(
			path = %update.record.path,
			version = %update.record.version,
			?propagation,
			"Record updated."
		),
		None => tracing::warn!(
			path = %update.record.path,
			version = %update.record.version,
			"Record updated but the note was not written back."
		),
	}

	println!("{} {}", update.record.path, update.record.version);

	Ok(())
}

fn init_tracing(config: &nb_config::Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	Ok(())
}
