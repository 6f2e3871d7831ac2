use std::{
	path::{Path, PathBuf},
	sync::Arc,
	time::{Duration, Instant},
};

use tokio::sync::{Mutex, mpsc, watch};
use walkdir::WalkDir;

use nb_domain::{
	exclude::ExclusionFilter,
	note::{self, Note},
};

use crate::{Result, metadata::FileMetadata, parser, store::StoreHandle};

#[derive(Clone)]
pub struct ScanOptions {
	pub root: PathBuf,
	pub filter: Arc<ExclusionFilter>,
	pub workers: usize,
	pub batch_size: usize,
	pub clear_on_startup: bool,
}
impl ScanOptions {
	pub fn from_config(cfg: &nb_config::Sync, filter: Arc<ExclusionFilter>) -> Self {
		Self {
			root: cfg.root.clone(),
			filter,
			workers: cfg.sync_workers.max(1),
			batch_size: cfg.sync_batch_size.max(1),
			clear_on_startup: cfg.clear_on_startup,
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
	pub walked: usize,
	pub parsed: usize,
	pub parse_failures: usize,
	pub inserted: usize,
	pub updated: usize,
	pub unchanged: usize,
	pub propagated: usize,
	pub failed_batches: usize,
	pub elapsed: Duration,
}

#[derive(Debug, Default)]
struct WorkerTally {
	parsed: usize,
	failures: usize,
}

/// Runs one initial scan to completion, or until `stop` turns true.
///
/// The walker feeds a bounded path queue, a fixed pool of workers parses notes into a bounded
/// results queue, and a single saver commits them in batches through the store.
pub async fn run(
	store: &StoreHandle,
	metadata: Arc<dyn FileMetadata>,
	options: &ScanOptions,
	stop: watch::Receiver<bool>,
) -> Result<ScanReport> {
	let started = Instant::now();

	if options.clear_on_startup {
		let cleared = store.clear_all().await?;

		tracing::info!(rows = cleared, "Cleared files table before scan.");
	}

	let batch_size = options.batch_size.max(1);
	let (path_tx, path_rx) = mpsc::channel::<PathBuf>(batch_size);
	let (note_tx, note_rx) = mpsc::channel::<Note>(batch_size);
	let walker = {
		let root = options.root.clone();
		let filter = options.filter.clone();
		let stop = stop.clone();

		tokio::task::spawn_blocking(move || walk(&root, &filter, &path_tx, &stop))
	};
	let path_rx = Arc::new(Mutex::new(path_rx));
	let workers = (0..options.workers.max(1))
		.map(|_| {
			tokio::spawn(parse_worker(
				options.root.clone(),
				metadata.clone(),
				path_rx.clone(),
				note_tx.clone(),
			))
		})
		.collect::<Vec<_>>();

	drop(note_tx);

	let saver = tokio::spawn(save_batches(store.clone(), note_rx, batch_size));
	let walked = walker.await?;
	let mut report = ScanReport { walked, ..Default::default() };

	for worker in workers {
		let tally = worker.await?;

		report.parsed += tally.parsed;
		report.parse_failures += tally.failures;
	}

	let saved = saver.await?;

	report.inserted = saved.inserted;
	report.updated = saved.updated;
	report.unchanged = saved.unchanged;
	report.propagated = saved.propagated;
	report.failed_batches = saved.failed_batches;
	report.elapsed = started.elapsed();

	tracing::info!(
		walked = report.walked,
		parsed = report.parsed,
		parse_failures = report.parse_failures,
		inserted = report.inserted,
		updated = report.updated,
		unchanged = report.unchanged,
		propagated = report.propagated,
		failed_batches = report.failed_batches,
		elapsed_ms = report.elapsed.as_millis() as u64,
		"Initial scan finished."
	);

	Ok(report)
}

fn walk(
	root: &Path,
	filter: &ExclusionFilter,
	paths: &mpsc::Sender<PathBuf>,
	stop: &watch::Receiver<bool>,
) -> usize {
	let mut walked = 0;
	let entries = WalkDir::new(root).follow_links(false).into_iter().filter_entry(|entry| {
		entry.depth() == 0
			|| note::relative_path(root, entry.path())
				.is_none_or(|rel_path| !filter.is_excluded(&rel_path))
	});

	for entry in entries {
		if *stop.borrow() {
			tracing::info!("Initial scan walk stopped early.");

			break;
		}

		let entry = match entry {
			Ok(entry) => entry,
			Err(err) => {
				tracing::warn!(error = %err, "Skipping unreadable entry during scan.");

				continue;
			},
		};

		if !entry.file_type().is_file() || !note::is_markdown(entry.path()) {
			continue;
		}

		walked += 1;

		if paths.blocking_send(entry.into_path()).is_err() {
			break;
		}
	}

	walked
}

async fn parse_worker(
	root: PathBuf,
	metadata: Arc<dyn FileMetadata>,
	paths: Arc<Mutex<mpsc::Receiver<PathBuf>>>,
	notes: mpsc::Sender<Note>,
) -> WorkerTally {
	let mut tally = WorkerTally::default();

	loop {
		let Some(path) = paths.lock().await.recv().await else {
			break;
		};
		let root = root.clone();
		let metadata = metadata.clone();
		let parsed =
			tokio::task::spawn_blocking(move || parser::parse(&root, &path, metadata.as_ref()))
				.await;

		match parsed {
			Ok(Ok(note)) => {
				tally.parsed += 1;

				if notes.send(note).await.is_err() {
					break;
				}
			},
			Ok(Err(err)) => {
				tally.failures += 1;

				tracing::warn!(error = %err, "Failed to parse note during scan.");
			},
			Err(err) => {
				tally.failures += 1;

				tracing::error!(error = %err, "Parse task panicked during scan.");
			},
		}
	}

	tally
}

#[derive(Debug, Default)]
struct SaveTally {
	inserted: usize,
	updated: usize,
	unchanged: usize,
	propagated: usize,
	failed_batches: usize,
}

async fn save_batches(
	store: StoreHandle,
	mut notes: mpsc::Receiver<Note>,
	batch_size: usize,
) -> SaveTally {
	let mut tally = SaveTally::default();
	let mut batch = Vec::with_capacity(batch_size);

	while let Some(note) = notes.recv().await {
		batch.push(note);

		if batch.len() >= batch_size {
			flush(&store, &mut batch, &mut tally).await;
		}
	}

	if !batch.is_empty() {
		flush(&store, &mut batch, &mut tally).await;
	}

	tally
}

async fn flush(store: &StoreHandle, batch: &mut Vec<Note>, tally: &mut SaveTally) {
	let size = batch.len();

	match store.save_batch(std::mem::take(batch)).await {
		Ok(outcome) => {
			tally.inserted += outcome.inserted;
			tally.updated += outcome.updated;
			tally.unchanged += outcome.unchanged;
			tally.propagated += outcome.propagated;

			tracing::debug!(size, "Committed scan batch.");
		},
		Err(err) => {
			tally.failed_batches += 1;

			tracing::error!(error = %err, size, "Failed to commit scan batch. Dropping it.");
		},
	}
}
