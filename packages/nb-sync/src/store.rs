use std::{path::PathBuf, sync::Arc};

use tokio::{
	sync::{mpsc, oneshot},
	task::JoinHandle,
};

use nb_domain::{
	conflict::{self, Resolution, Side, Snapshot},
	front_matter, hash,
	note::{Note, Origin},
	version,
};
use nb_storage::{
	db::Db,
	models::{FileContent, FileRecord},
	queries,
};

use crate::{
	Error, Result,
	metadata::{FileMetadata, FileStamp},
	propagate::{Propagation, Propagator},
};

const COMMAND_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
	pub inserted: usize,
	pub updated: usize,
	pub unchanged: usize,
	pub propagated: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
	Inserted { version: String },
	Revived { version: String },
	Updated { version: String },
	Unchanged,
	/// The record is newer than the disk copy; the disk write was ignored.
	DbNewer,
	/// No live row exists for the path.
	Missing,
}

/// Changes applied to a record from outside the watcher.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
	pub content: Option<String>,
	/// JSON object text. Takes precedence over `raw_frontmatter`.
	pub frontmatter_json: Option<String>,
	pub raw_frontmatter: Option<String>,
}

#[derive(Debug)]
pub struct RecordUpdate {
	pub record: FileRecord,
	/// `None` when write-back failed; the failure is logged and the row stays committed.
	pub propagation: Option<Propagation>,
}

enum Command {
	SaveBatch { notes: Vec<Note>, reply: oneshot::Sender<Result<BatchOutcome>> },
	UpsertFromDisk { note: Note, reply: oneshot::Sender<Result<WriteOutcome>> },
	UpdateFromDisk { note: Note, reply: oneshot::Sender<Result<WriteOutcome>> },
	SoftDelete { rel_path: String, abs_path: PathBuf, reply: oneshot::Sender<Result<bool>> },
	UpdateRecord { rel_path: String, patch: RecordPatch, reply: oneshot::Sender<Result<RecordUpdate>> },
	ClearAll { reply: oneshot::Sender<Result<u64>> },
	Find { rel_path: String, reply: oneshot::Sender<Result<Option<FileRecord>>> },
}

/// Cloneable front end of the store actor.
#[derive(Clone)]
pub struct StoreHandle {
	tx: mpsc::Sender<Command>,
}
impl StoreHandle {
	/// Commits the notes of one scan batch in a single transaction.
	pub async fn save_batch(&self, notes: Vec<Note>) -> Result<BatchOutcome> {
		self.request(|reply| Command::SaveBatch { notes, reply }).await
	}

	/// Inserts, revives, or refreshes the row for a newly appeared file.
	pub async fn upsert_from_disk(&self, note: Note) -> Result<WriteOutcome> {
		self.request(|reply| Command::UpsertFromDisk { note, reply }).await
	}

	/// Applies a disk edit to an existing row, subject to the conflict rule.
	pub async fn update_from_disk(&self, note: Note) -> Result<WriteOutcome> {
		self.request(|reply| Command::UpdateFromDisk { note, reply }).await
	}

	/// Soft-deletes the live row for a removed file. Returns whether a row was marked.
	pub async fn soft_delete(&self, rel_path: String, abs_path: PathBuf) -> Result<bool> {
		self.request(|reply| Command::SoftDelete { rel_path, abs_path, reply }).await
	}

	/// Applies an external edit to a record, then writes it back to disk.
	pub async fn update_record(&self, rel_path: String, patch: RecordPatch) -> Result<RecordUpdate> {
		self.request(|reply| Command::UpdateRecord { rel_path, patch, reply }).await
	}

	pub async fn clear_all(&self) -> Result<u64> {
		self.request(|reply| Command::ClearAll { reply }).await
	}

	pub async fn find(&self, rel_path: String) -> Result<Option<FileRecord>> {
		self.request(|reply| Command::Find { rel_path, reply }).await
	}

	async fn request<T, F>(&self, build: F) -> Result<T>
	where
		F: FnOnce(oneshot::Sender<Result<T>>) -> Command,
	{
		let (reply, rx) = oneshot::channel();

		self.tx.send(build(reply)).await.map_err(|_| Error::StoreClosed)?;

		rx.await.map_err(|_| Error::StoreClosed)?
	}
}

/// The single writer for the `files` table. Scan batches, watcher events, and record edits all
/// go through its task, so writes for a path never overlap.
pub struct Store {
	db: Db,
	metadata: Arc<dyn FileMetadata>,
	propagator: Propagator,
}
impl Store {
	pub fn new(db: Db, metadata: Arc<dyn FileMetadata>, propagator: Propagator) -> Self {
		Self { db, metadata, propagator }
	}

	/// Starts the actor. It exits once every [`StoreHandle`] has been dropped.
	pub fn spawn(self) -> (StoreHandle, JoinHandle<()>) {
		let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
		let handle = tokio::spawn(self.run(rx));

		(StoreHandle { tx }, handle)
	}

	async fn run(self, mut rx: mpsc::Receiver<Command>) {
		while let Some(command) = rx.recv().await {
			match command {
				Command::SaveBatch { notes, reply } => {
					let _ = reply.send(self.save_batch(notes).await);
				},
				Command::UpsertFromDisk { note, reply } => {
					let _ = reply.send(self.upsert_from_disk(note).await);
				},
				Command::UpdateFromDisk { note, reply } => {
					let _ = reply.send(self.update_from_disk(note).await);
				},
				Command::SoftDelete { rel_path, abs_path, reply } => {
					let _ = reply.send(self.soft_delete(&rel_path, abs_path).await);
				},
				Command::UpdateRecord { rel_path, patch, reply } => {
					let _ = reply.send(self.update_record(&rel_path, patch).await);
				},
				Command::ClearAll { reply } => {
					let _ = reply.send(queries::clear_all(&self.db.pool).await.map_err(Error::from));
				},
				Command::Find { rel_path, reply } => {
					let _ = reply.send(
						queries::find_by_path(&self.db.pool, &rel_path).await.map_err(Error::from),
					);
				},
			}
		}

		tracing::debug!("Store actor stopped.");
	}

	async fn save_batch(&self, notes: Vec<Note>) -> Result<BatchOutcome> {
		let mut outcome = BatchOutcome::default();
		let mut stamps = Vec::new();
		let mut db_newer = Vec::new();
		let mut tx = self.db.pool.begin().await?;

		for note in &notes {
			let new_version = version::now()?;
			let content = note_content(note, Origin::Init, &new_version);
			let existing = queries::find_by_path(&mut *tx, &note.rel_path).await?;

			match existing {
				None => {
					queries::insert_file(&mut *tx, &note.rel_path, &content, &new_version).await?;

					outcome.inserted += 1;
				},
				Some(record) if record.is_deleted() => {
					queries::update_content(&mut *tx, &record.id, &content, &new_version).await?;

					outcome.inserted += 1;
				},
				Some(record) => match resolve_disk_write(&record, note) {
					Resolution::InSync => {
						outcome.unchanged += 1;

						continue;
					},
					Resolution::DiskWins => {
						queries::update_content(&mut *tx, &record.id, &content, &new_version)
							.await?;

						outcome.updated += 1;
					},
					Resolution::DbWins => {
						db_newer.push(record.path);

						continue;
					},
				},
			}

			stamps.push((note.abs_path.clone(), FileStamp::new(new_version, Origin::Init.as_str())));
		}

		tx.commit().await?;

		for (path, err) in self.metadata.write_many(&stamps) {
			tracing::warn!(error = %err, path = %path.display(), "Failed to stamp scanned note.");
		}

		for rel_path in db_newer {
			match self.propagate_path(&rel_path).await {
				Ok(Propagation::Written { .. }) => outcome.propagated += 1,
				Ok(Propagation::Skipped(_)) => outcome.unchanged += 1,
				Err(err) => {
					tracing::error!(error = %err, path = %rel_path, "Write-back after scan failed.");
				},
			}
		}

		Ok(outcome)
	}

	async fn upsert_from_disk(&self, note: Note) -> Result<WriteOutcome> {
		let new_version = version::now()?;
		let content = note_content(&note, Origin::Fs, &new_version);
		let outcome = match queries::find_by_path(&self.db.pool, &note.rel_path).await? {
			None => {
				queries::insert_file(&self.db.pool, &note.rel_path, &content, &new_version).await?;

				WriteOutcome::Inserted { version: new_version.clone() }
			},
			Some(record) if record.is_deleted() => {
				queries::update_content(&self.db.pool, &record.id, &content, &new_version).await?;

				WriteOutcome::Revived { version: new_version.clone() }
			},
			Some(record) => {
				if record_hash(&record) == note.hash() {
					return Ok(WriteOutcome::Unchanged);
				}

				queries::update_content(&self.db.pool, &record.id, &content, &new_version).await?;

				WriteOutcome::Updated { version: new_version.clone() }
			},
		};

		self.stamp(&note, &new_version, Origin::Fs);

		Ok(outcome)
	}

	async fn update_from_disk(&self, note: Note) -> Result<WriteOutcome> {
		let Some(record) = queries::find_live_by_path(&self.db.pool, &note.rel_path).await? else {
			return Ok(WriteOutcome::Missing);
		};

		match resolve_disk_write(&record, &note) {
			Resolution::InSync => Ok(WriteOutcome::Unchanged),
			Resolution::DbWins => {
				tracing::info!(
					path = %note.rel_path,
					db_version = ?record.version(),
					disk_version = ?note.version,
					"Record is newer than the disk edit. Ignoring the edit."
				);

				Ok(WriteOutcome::DbNewer)
			},
			Resolution::DiskWins => {
				// The row takes the file's own stamp so both clocks stay paired.
				let (new_version, stamp_file) = match note.version.clone() {
					Some(version) => (version, false),
					None => (version::now()?, true),
				};
				let content = note_content(&note, Origin::Fs, &new_version);
				let now = version::now()?;

				queries::update_content(&self.db.pool, &record.id, &content, &now).await?;

				if stamp_file {
					self.stamp(&note, &new_version, Origin::Fs);
				}

				Ok(WriteOutcome::Updated { version: new_version })
			},
		}
	}

	async fn soft_delete(&self, rel_path: &str, abs_path: PathBuf) -> Result<bool> {
		let deleted = queries::soft_delete(&self.db.pool, rel_path, &version::now()?).await?;

		if let Err(err) = self.metadata.remove_version(&abs_path) {
			tracing::debug!(error = %err, path = %rel_path, "Failed to clear stamp of removed note.");
		}

		Ok(deleted)
	}

	async fn update_record(&self, rel_path: &str, patch: RecordPatch) -> Result<RecordUpdate> {
		let record = queries::find_live_by_path(&self.db.pool, rel_path)
			.await?
			.ok_or_else(|| Error::NotFound(format!("No live record for {rel_path:?}.")))?;
		let (frontmatter, raw_frontmatter) =
			match (patch.frontmatter_json, patch.raw_frontmatter) {
				(Some(json), _) => {
					let raw = front_matter::to_yaml(&json)?;

					(front_matter::to_json(&raw), raw)
				},
				(None, Some(mut raw)) => {
					if !raw.is_empty() && !raw.ends_with('\n') {
						raw.push('\n');
					}

					(front_matter::to_json(&raw), raw)
				},
				(None, None) => (record.frontmatter.clone(), record.raw_frontmatter.clone()),
			};
		let body = patch.content.unwrap_or_else(|| record.content.clone());
		let new_version = version::now()?;
		let content = FileContent {
			slug: &record.slug,
			content: &body,
			frontmatter: &frontmatter,
			raw_frontmatter: &raw_frontmatter,
			origin: &record.origin,
			version: &new_version,
		};

		queries::update_content(&self.db.pool, &record.id, &content, &new_version).await?;

		let propagation = match self.propagate_path(rel_path).await {
			Ok(propagation) => Some(propagation),
			Err(err) => {
				tracing::error!(error = %err, path = %rel_path, "Write-back after record update failed.");

				None
			},
		};
		let record = queries::find_live_by_path(&self.db.pool, rel_path)
			.await?
			.ok_or_else(|| Error::NotFound(format!("No live record for {rel_path:?}.")))?;

		Ok(RecordUpdate { record, propagation })
	}

	async fn propagate_path(&self, rel_path: &str) -> Result<Propagation> {
		let record = queries::find_by_path(&self.db.pool, rel_path)
			.await?
			.ok_or_else(|| Error::NotFound(format!("No record for {rel_path:?}.")))?;

		self.propagator.propagate(&self.db, &record).await
	}

	fn stamp(&self, note: &Note, version: &str, origin: Origin) {
		if let Err(err) = self.metadata.write(&note.abs_path, &FileStamp::new(version, origin.as_str()))
		{
			tracing::warn!(error = %err, path = %note.rel_path, "Failed to stamp note.");
		}
	}
}

fn note_content<'a>(note: &'a Note, origin: Origin, version: &'a str) -> FileContent<'a> {
	FileContent {
		slug: &note.slug,
		content: &note.body,
		frontmatter: &note.front_matter_json,
		raw_frontmatter: &note.raw_front_matter,
		origin: origin.as_str(),
		version,
	}
}

fn record_hash(record: &FileRecord) -> String {
	hash::digest(&record.raw_frontmatter, &record.content)
}

fn resolve_disk_write(record: &FileRecord, note: &Note) -> Resolution {
	let db_hash = record_hash(record);
	let disk_hash = note.hash();

	conflict::resolve(
		Snapshot::new(&db_hash, record.version()),
		Snapshot::new(&disk_hash, note.version.as_deref()),
		Side::Disk,
	)
}
