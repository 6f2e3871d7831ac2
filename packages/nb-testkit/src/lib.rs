mod error;

pub use error::{Error, Result};

use std::{
	fs,
	path::{Path, PathBuf},
};

use tempfile::TempDir;

use nb_config::{Config, MetadataBackend, Service, Sqlite, Storage, Sync};

/// A SQLite database file inside a temporary directory. Removed on drop.
pub struct TestDatabase {
	dir: TempDir,
	dsn: String,
}
impl TestDatabase {
	pub fn new() -> Result<Self> {
		let dir = tempfile::Builder::new().prefix("nb_test_db_").tempdir()?;
		let path = dir.path().join("notebase.db");
		let dsn = format!("sqlite://{}", path.display());

		Ok(Self { dir, dsn })
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	pub fn path(&self) -> PathBuf {
		self.dir.path().join("notebase.db")
	}

	pub fn config(&self) -> Sqlite {
		Sqlite { dsn: self.dsn.clone(), pool_max_conns: 2 }
	}
}

/// A temporary notes root with helpers for arranging and inspecting files.
pub struct TestNotes {
	_dir: TempDir,
	root: PathBuf,
}
impl TestNotes {
	pub fn new() -> Result<Self> {
		let dir = tempfile::Builder::new().prefix("nb_test_notes_").tempdir()?;
		// Canonical so watcher event paths compare equal to the configured root.
		let root = dir.path().canonicalize()?;

		Ok(Self { _dir: dir, root })
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn path(&self, rel_path: &str) -> PathBuf {
		self.root.join(rel_path)
	}

	pub fn write(&self, rel_path: &str, content: &str) -> Result<PathBuf> {
		let path = self.path(rel_path);

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)?;
		}

		fs::write(&path, content)?;

		Ok(path)
	}

	pub fn read(&self, rel_path: &str) -> Result<String> {
		Ok(fs::read_to_string(self.path(rel_path))?)
	}

	pub fn remove(&self, rel_path: &str) -> Result<()> {
		Ok(fs::remove_file(self.path(rel_path))?)
	}

	pub fn exists(&self, rel_path: &str) -> bool {
		self.path(rel_path).exists()
	}
}

/// A notes root plus a database, wired into a full [`Config`] that uses sidecar metadata so
/// tests run on filesystems without extended attributes.
pub struct TestEnv {
	pub notes: TestNotes,
	pub database: TestDatabase,
	sidecar: TempDir,
}
impl TestEnv {
	pub fn new() -> Result<Self> {
		let notes = TestNotes::new()?;
		let database = TestDatabase::new()?;
		let sidecar = tempfile::Builder::new().prefix("nb_test_meta_").tempdir()?;

		Ok(Self { notes, database, sidecar })
	}

	pub fn sidecar_path(&self) -> PathBuf {
		self.sidecar.path().join("meta.json")
	}

	pub fn sync_config(&self) -> Sync {
		Sync {
			root: self.notes.root().to_path_buf(),
			clear_on_startup: false,
			exclude: Vec::new(),
			sync_workers: 2,
			sync_batch_size: 4,
			placeholder_slugs: vec!["Untitled".to_string()],
			metadata: MetadataBackend::Sidecar,
			sidecar_path: self.sidecar_path(),
			watch_debounce_ms: 0,
		}
	}

	pub fn config(&self) -> Config {
		Config {
			service: Service { log_level: "debug".to_string() },
			storage: Storage { sqlite: self.database.config() },
			sync: self.sync_config(),
		}
	}
}
