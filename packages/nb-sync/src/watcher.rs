use std::{
	path::{Path, PathBuf},
	sync::Arc,
};

use notify::{
	Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
	event::{CreateKind, ModifyKind, RenameMode},
};
use tokio::sync::{mpsc, watch};

use nb_domain::{exclude::ExclusionFilter, note};

use crate::{
	Result,
	metadata::FileMetadata,
	parser,
	store::{StoreHandle, WriteOutcome},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsEventKind {
	Create,
	Write,
	Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
	pub kind: FsEventKind,
	pub path: PathBuf,
}
impl FsEvent {
	pub fn new(kind: FsEventKind, path: impl Into<PathBuf>) -> Self {
		Self { kind, path: path.into() }
	}
}

/// Maps one notify event onto create/write/remove events.
///
/// Metadata-only modifications are dropped so that stamping a file never feeds back into the
/// watcher.
pub fn classify(event: &Event) -> Vec<FsEvent> {
	let each = |kind: FsEventKind| {
		event.paths.iter().map(|path| FsEvent::new(kind, path.clone())).collect::<Vec<_>>()
	};

	match &event.kind {
		EventKind::Create(CreateKind::Folder) => Vec::new(),
		EventKind::Create(_) => each(FsEventKind::Create),
		EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => each(FsEventKind::Write),
		EventKind::Modify(ModifyKind::Name(mode)) => classify_rename(*mode, &event.paths),
		EventKind::Modify(_) => Vec::new(),
		EventKind::Remove(_) => each(FsEventKind::Remove),
		EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
	}
}

fn classify_rename(mode: RenameMode, paths: &[PathBuf]) -> Vec<FsEvent> {
	match mode {
		RenameMode::From =>
			paths.iter().map(|path| FsEvent::new(FsEventKind::Remove, path.clone())).collect(),
		RenameMode::To =>
			paths.iter().map(|path| FsEvent::new(FsEventKind::Create, path.clone())).collect(),
		RenameMode::Both => {
			let mut events = Vec::with_capacity(2);

			if let Some(from) = paths.first() {
				events.push(FsEvent::new(FsEventKind::Remove, from.clone()));
			}
			if let Some(to) = paths.get(1) {
				events.push(FsEvent::new(FsEventKind::Create, to.clone()));
			}

			events
		},
		RenameMode::Any | RenameMode::Other => paths
			.iter()
			.map(|path| {
				let kind = if path.exists() { FsEventKind::Create } else { FsEventKind::Remove };

				FsEvent::new(kind, path.clone())
			})
			.collect(),
	}
}

/// A live recursive subscription on the notes root. Events buffer in the channel until read.
pub struct WatchSubscription {
	watcher: RecommendedWatcher,
	events: mpsc::UnboundedReceiver<FsEvent>,
}
impl WatchSubscription {
	/// The watcher must be kept alive for as long as events are wanted.
	pub fn into_parts(self) -> (RecommendedWatcher, mpsc::UnboundedReceiver<FsEvent>) {
		(self.watcher, self.events)
	}
}

pub fn subscribe(root: &Path) -> Result<WatchSubscription> {
	let (tx, events) = mpsc::unbounded_channel();
	let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
		match result {
			Ok(event) =>
				for fs_event in classify(&event) {
					if tx.send(fs_event).is_err() {
						return;
					}
				},
			Err(err) => tracing::warn!(error = %err, "Filesystem watcher reported an error."),
		}
	})?;

	watcher.watch(root, RecursiveMode::Recursive)?;

	tracing::info!(root = %root.display(), "Watching notes root.");

	Ok(WatchSubscription { watcher, events })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
	/// Dropped by a filter before touching the store.
	Ignored,
	Written(WriteOutcome),
	Deleted(bool),
}

/// Applies watcher events to the store in arrival order.
#[derive(Clone)]
pub struct Dispatcher {
	root: PathBuf,
	filter: Arc<ExclusionFilter>,
	placeholders: Arc<[String]>,
	metadata: Arc<dyn FileMetadata>,
	store: StoreHandle,
}
impl Dispatcher {
	pub fn new(
		root: PathBuf,
		filter: Arc<ExclusionFilter>,
		placeholders: Vec<String>,
		metadata: Arc<dyn FileMetadata>,
		store: StoreHandle,
	) -> Self {
		Self { root, filter, placeholders: placeholders.into(), metadata, store }
	}

	/// Consumes events until the channel closes or `stop` turns true. Per-event failures are
	/// logged and do not end the loop.
	pub async fn run(
		&self,
		mut events: mpsc::UnboundedReceiver<FsEvent>,
		mut stop: watch::Receiver<bool>,
	) {
		loop {
			if *stop.borrow() {
				break;
			}

			let event = tokio::select! {
				biased;
				changed = stop.changed() => {
					if changed.is_err() || *stop.borrow() {
						break;
					}

					continue;
				},
				event = events.recv() => match event {
					Some(event) => event,
					None => break,
				},
			};

			if let Err(err) = self.dispatch(&event).await {
				tracing::warn!(
					error = %err,
					path = %event.path.display(),
					kind = ?event.kind,
					"Failed to apply filesystem event."
				);
			}
		}

		tracing::info!("Watcher dispatch stopped.");
	}

	pub async fn dispatch(&self, event: &FsEvent) -> Result<Dispatch> {
		let Some(rel_path) = self.accept(event) else {
			return Ok(Dispatch::Ignored);
		};

		match event.kind {
			FsEventKind::Create => {
				if event.path.is_dir() {
					return Ok(Dispatch::Ignored);
				}

				let note = self.parse(&event.path).await?;

				if note::is_placeholder(&note.slug, &self.placeholders[..]) {
					tracing::debug!(path = %rel_path, "Ignoring placeholder note.");

					return Ok(Dispatch::Ignored);
				}

				let outcome = self.store.upsert_from_disk(note).await?;

				tracing::debug!(path = %rel_path, ?outcome, "Applied create event.");

				Ok(Dispatch::Written(outcome))
			},
			FsEventKind::Write => {
				let note = self.parse(&event.path).await?;
				let outcome = self.store.update_from_disk(note).await?;

				tracing::debug!(path = %rel_path, ?outcome, "Applied write event.");

				Ok(Dispatch::Written(outcome))
			},
			FsEventKind::Remove => {
				let deleted = self.store.soft_delete(rel_path.clone(), event.path.clone()).await?;

				tracing::debug!(path = %rel_path, deleted, "Applied remove event.");

				Ok(Dispatch::Deleted(deleted))
			},
		}
	}

	/// Returns the relative path when the event concerns a syncable note.
	fn accept(&self, event: &FsEvent) -> Option<String> {
		if !note::is_markdown(&event.path) {
			return None;
		}

		let rel_path = note::relative_path(&self.root, &event.path)?;

		if self.filter.is_excluded(&rel_path) {
			return None;
		}

		Some(rel_path)
	}

	async fn parse(&self, path: &Path) -> Result<nb_domain::note::Note> {
		let root = self.root.clone();
		let path = path.to_path_buf();
		let metadata = self.metadata.clone();

		tokio::task::spawn_blocking(move || parser::parse(&root, &path, metadata.as_ref())).await?
	}
}
