use std::{
	collections::BTreeMap,
	fs, io,
	path::{Path, PathBuf},
	sync::{Arc, Mutex},
};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};
use nb_config::MetadataBackend;

pub const VERSION_ATTR: &str = "user.notebase.version";
pub const ORIGIN_ATTR: &str = "user.notebase.origin";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStamp {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub version: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub origin: Option<String>,
}
impl FileStamp {
	pub fn new(version: impl Into<String>, origin: impl Into<String>) -> Self {
		Self { version: Some(version.into()), origin: Some(origin.into()) }
	}
}

/// Storage for file stamps. Calls are blocking and short.
pub trait FileMetadata: Send + Sync {
	fn read(&self, path: &Path) -> Result<FileStamp>;

	fn write(&self, path: &Path, stamp: &FileStamp) -> Result<()>;

	fn remove_version(&self, path: &Path) -> Result<()>;

	/// Writes several stamps, returning the ones that failed.
	fn write_many(&self, entries: &[(PathBuf, FileStamp)]) -> Vec<(PathBuf, Error)> {
		entries
			.iter()
			.filter_map(|(path, stamp)| {
				self.write(path, stamp).err().map(|err| (path.clone(), err))
			})
			.collect()
	}
}

pub fn from_config(cfg: &nb_config::Sync) -> Result<Arc<dyn FileMetadata>> {
	match cfg.metadata {
		MetadataBackend::Xattr => Ok(Arc::new(XattrMetadata)),
		MetadataBackend::Sidecar => Ok(Arc::new(SidecarMetadata::open(&cfg.sidecar_path)?)),
	}
}

/// Stamps stored as `user.notebase.*` extended attributes on the file itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct XattrMetadata;
impl XattrMetadata {
	fn get(path: &Path, name: &str) -> Result<Option<String>> {
		match xattr::get(path, name) {
			Ok(value) => Ok(value.and_then(|bytes| String::from_utf8(bytes).ok())),
			Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
			Err(err) => Err(metadata_error(path, name, err)),
		}
	}
}
impl FileMetadata for XattrMetadata {
	fn read(&self, path: &Path) -> Result<FileStamp> {
		Ok(FileStamp {
			version: Self::get(path, VERSION_ATTR)?,
			origin: Self::get(path, ORIGIN_ATTR)?,
		})
	}

	fn write(&self, path: &Path, stamp: &FileStamp) -> Result<()> {
		if let Some(version) = stamp.version.as_deref() {
			xattr::set(path, VERSION_ATTR, version.as_bytes())
				.map_err(|err| metadata_error(path, VERSION_ATTR, err))?;
		}
		if let Some(origin) = stamp.origin.as_deref() {
			xattr::set(path, ORIGIN_ATTR, origin.as_bytes())
				.map_err(|err| metadata_error(path, ORIGIN_ATTR, err))?;
		}

		Ok(())
	}

	fn remove_version(&self, path: &Path) -> Result<()> {
		match xattr::remove(path, VERSION_ATTR) {
			Ok(()) => Ok(()),
			Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
			Err(err) => Err(metadata_error(path, VERSION_ATTR, err)),
		}
	}
}

/// Stamps stored in a JSON index keyed by absolute path, for filesystems without extended
/// attributes.
#[derive(Debug)]
pub struct SidecarMetadata {
	path: PathBuf,
	entries: Mutex<BTreeMap<String, FileStamp>>,
}
impl SidecarMetadata {
	pub fn open(path: &Path) -> Result<Self> {
		let entries = match fs::read(path) {
			Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
			Ok(bytes) => serde_json::from_slice(&bytes)?,
			Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
			Err(err) => return Err(Error::io(path, err)),
		};

		Ok(Self { path: path.to_path_buf(), entries: Mutex::new(entries) })
	}

	fn key(path: &Path) -> String {
		path.to_string_lossy().into_owned()
	}

	fn persist(&self, entries: &BTreeMap<String, FileStamp>) -> Result<()> {
		if let Some(parent) = self.path.parent() {
			fs::create_dir_all(parent).map_err(|err| Error::io(parent, err))?;
		}

		let payload = serde_json::to_vec_pretty(entries)?;
		let staging = self.path.with_extension("json.tmp");

		fs::write(&staging, payload).map_err(|err| Error::io(&staging, err))?;
		fs::rename(&staging, &self.path).map_err(|err| Error::io(&self.path, err))?;

		Ok(())
	}
}
impl FileMetadata for SidecarMetadata {
	fn read(&self, path: &Path) -> Result<FileStamp> {
		let entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());

		Ok(entries.get(&Self::key(path)).cloned().unwrap_or_default())
	}

	fn write(&self, path: &Path, stamp: &FileStamp) -> Result<()> {
		self.write_many(&[(path.to_path_buf(), stamp.clone())])
			.into_iter()
			.next()
			.map_or(Ok(()), |(_, err)| Err(err))
	}

	fn remove_version(&self, path: &Path) -> Result<()> {
		let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());
		let key = Self::key(path);
		let Some(stamp) = entries.get_mut(&key) else {
			return Ok(());
		};

		stamp.version = None;

		if stamp.origin.is_none() {
			entries.remove(&key);
		}

		self.persist(&entries)
	}

	fn write_many(&self, stamps: &[(PathBuf, FileStamp)]) -> Vec<(PathBuf, Error)> {
		let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());

		for (path, stamp) in stamps {
			let entry = entries.entry(Self::key(path)).or_default();

			if stamp.version.is_some() {
				entry.version = stamp.version.clone();
			}
			if stamp.origin.is_some() {
				entry.origin = stamp.origin.clone();
			}
		}

		match self.persist(&entries) {
			Ok(()) => Vec::new(),
			Err(err) => {
				let message = err.to_string();

				stamps
					.iter()
					.map(|(path, _)| {
						(path.clone(), Error::Metadata { path: path.clone(), message: message.clone() })
					})
					.collect()
			},
		}
	}
}

fn metadata_error(path: &Path, name: &str, err: io::Error) -> Error {
	Error::Metadata { path: path.to_path_buf(), message: format!("{name}: {err}") }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sidecar_stamps_survive_reopen() {
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let index = dir.path().join("meta/index.json");
		let note = dir.path().join("a.md");
		let sidecar = SidecarMetadata::open(&index).expect("Failed to open sidecar.");

		sidecar
			.write(&note, &FileStamp::new("2024-01-01T00:00:00Z", "init"))
			.expect("Failed to write stamp.");

		let reopened = SidecarMetadata::open(&index).expect("Failed to reopen sidecar.");
		let stamp = reopened.read(&note).expect("Failed to read stamp.");

		assert_eq!(stamp, FileStamp::new("2024-01-01T00:00:00Z", "init"));
	}

	#[test]
	fn sidecar_remove_version_keeps_origin() {
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let sidecar =
			SidecarMetadata::open(&dir.path().join("meta.json")).expect("Failed to open sidecar.");
		let note = dir.path().join("a.md");

		sidecar.write(&note, &FileStamp::new("v1", "fs")).expect("Failed to write stamp.");
		sidecar.remove_version(&note).expect("Failed to remove version.");

		let stamp = sidecar.read(&note).expect("Failed to read stamp.");

		assert_eq!(stamp.version, None);
		assert_eq!(stamp.origin.as_deref(), Some("fs"));
	}

	#[test]
	fn unknown_file_has_empty_stamp() {
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let sidecar =
			SidecarMetadata::open(&dir.path().join("meta.json")).expect("Failed to open sidecar.");

		assert_eq!(
			sidecar.read(&dir.path().join("missing.md")).expect("Failed to read stamp."),
			FileStamp::default()
		);
		sidecar.remove_version(&dir.path().join("missing.md")).expect("Failed to remove version.");
	}

	#[test]
	fn xattr_stamps_round_trip_when_supported() {
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let note = dir.path().join("a.md");

		fs::write(&note, "Hello").expect("Failed to write note.");

		let metadata = XattrMetadata;

		if metadata.write(&note, &FileStamp::new("v1", "db")).is_err() {
			eprintln!("Skipping xattr_stamps_round_trip_when_supported; xattrs are unavailable.");

			return;
		}

		assert_eq!(metadata.read(&note).expect("Failed to read stamp."), FileStamp::new("v1", "db"));

		metadata.remove_version(&note).expect("Failed to remove version.");

		assert_eq!(metadata.read(&note).expect("Failed to read stamp.").version, None);
	}
}
