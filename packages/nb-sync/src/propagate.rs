use std::{
	io,
	path::{Path, PathBuf},
	sync::Arc,
};

use nb_domain::{
	conflict::{self, Resolution, Side, Snapshot},
	hash,
	note::{Note, Origin},
	version,
};
use nb_storage::{db::Db, models::FileRecord, queries};

use crate::{
	Error, Result,
	metadata::{FileMetadata, FileStamp},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
	Deleted,
	InSync,
	DiskNewer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Propagation {
	Skipped(SkipReason),
	Written { version: String },
}

#[derive(Clone)]
pub struct Propagator {
	root: PathBuf,
	metadata: Arc<dyn FileMetadata>,
}
impl Propagator {
	pub fn new(root: impl Into<PathBuf>, metadata: Arc<dyn FileMetadata>) -> Self {
		Self { root: root.into(), metadata }
	}

	/// Brings the file for `record` in line with the row unless the disk copy is newer.
	///
	/// On a write the file is stamped with a fresh version and origin `db`, and the same
	/// origin/version are stored on the row without touching `updated`.
	pub async fn propagate(&self, db: &Db, record: &FileRecord) -> Result<Propagation> {
		if record.is_deleted() {
			return Ok(Propagation::Skipped(SkipReason::Deleted));
		}

		let abs_path = self.root.join(&record.path);
		// Files that are not UTF-8 are never overwritten.
		let disk_note = match tokio::fs::read(&abs_path).await {
			Ok(bytes) => {
				let content = String::from_utf8(bytes)
					.map_err(|_| Error::InvalidUtf8 { path: abs_path.clone() })?;

				Some(Note::from_content(abs_path.clone(), record.path.clone(), &content))
			},
			Err(err) if err.kind() == io::ErrorKind::NotFound => None,
			Err(err) => return Err(Error::io(&abs_path, err)),
		};
		let disk_version = match disk_note {
			Some(_) => self.read_version(&abs_path),
			None => None,
		};
		let db_hash = hash::digest(&record.raw_frontmatter, &record.content);
		let disk_hash = disk_note.as_ref().map(Note::hash).unwrap_or_default();

		if record.version() == disk_version.as_deref() && db_hash == disk_hash {
			return Ok(Propagation::Skipped(SkipReason::InSync));
		}

		match conflict::resolve(
			Snapshot::new(&db_hash, record.version()),
			Snapshot::new(&disk_hash, disk_version.as_deref()),
			Side::Db,
		) {
			Resolution::InSync => return Ok(Propagation::Skipped(SkipReason::InSync)),
			Resolution::DiskWins => {
				tracing::warn!(
					path = %record.path,
					db_version = ?record.version(),
					disk_version = ?disk_version,
					"Disk copy is newer than the record. Skipping write-back."
				);

				return Ok(Propagation::Skipped(SkipReason::DiskNewer));
			},
			Resolution::DbWins => {},
		}

		if let Some(parent) = abs_path.parent() {
			tokio::fs::create_dir_all(parent).await.map_err(|err| Error::io(parent, err))?;
		}

		let text = hash::canonical_text(&record.raw_frontmatter, &record.content);

		tokio::fs::write(&abs_path, text).await.map_err(|err| Error::io(&abs_path, err))?;

		let new_version = version::now()?;

		if let Err(err) =
			self.metadata.write(&abs_path, &FileStamp::new(&new_version, Origin::Db.as_str()))
		{
			tracing::warn!(error = %err, path = %record.path, "Failed to stamp written note.");
		}

		queries::set_origin_version(&db.pool, &record.id, Origin::Db.as_str(), &new_version)
			.await?;

		tracing::info!(path = %record.path, version = %new_version, "Wrote record back to disk.");

		Ok(Propagation::Written { version: new_version })
	}

	fn read_version(&self, abs_path: &Path) -> Option<String> {
		match self.metadata.read(abs_path) {
			Ok(stamp) => stamp.version,
			Err(err) => {
				tracing::debug!(error = %err, path = %abs_path.display(), "File stamp unreadable.");

				None
			},
		}
	}
}
