use std::{fs, path::Path};

use nb_domain::note::{self, Note};

use crate::{Error, Result, metadata::FileMetadata};

/// Reads a note from disk along with its metadata stamp.
///
/// A stamp that cannot be read is treated as absent so the note still syncs.
pub fn parse(root: &Path, abs_path: &Path, metadata: &dyn FileMetadata) -> Result<Note> {
	let rel_path = note::relative_path(root, abs_path)
		.ok_or_else(|| Error::OutsideRoot { path: abs_path.to_path_buf() })?;
	let bytes = fs::read(abs_path).map_err(|err| Error::io(abs_path, err))?;
	let content = String::from_utf8(bytes)
		.map_err(|_| Error::InvalidUtf8 { path: abs_path.to_path_buf() })?;
	let mut note = Note::from_content(abs_path.to_path_buf(), rel_path, &content);

	match metadata.read(abs_path) {
		Ok(stamp) => {
			note.version = stamp.version;
			note.origin = stamp.origin.and_then(|origin| origin.parse().ok());
		},
		Err(err) => {
			tracing::debug!(error = %err, path = %abs_path.display(), "File stamp unreadable.");
		},
	}

	Ok(note)
}

#[cfg(test)]
mod tests {
	use nb_domain::note::Origin;

	use super::*;
	use crate::metadata::{FileStamp, SidecarMetadata};

	#[test]
	fn parses_note_with_stamp() {
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let root = dir.path();
		let path = root.join("daily/today.md");
		let sidecar =
			SidecarMetadata::open(&root.join(".meta.json")).expect("Failed to open sidecar.");

		fs::create_dir_all(path.parent().expect("Note must have a parent."))
			.expect("Failed to create note dir.");
		fs::write(&path, "---\ntitle: Today\n---\n\nHello").expect("Failed to write note.");
		sidecar
			.write(&path, &FileStamp::new("2024-01-01T00:00:00Z", "db"))
			.expect("Failed to write stamp.");

		let note = parse(root, &path, &sidecar).expect("Failed to parse note.");

		assert_eq!(note.rel_path, "daily/today.md");
		assert_eq!(note.slug, "today");
		assert_eq!(note.body, "Hello");
		assert_eq!(note.front_matter_json, r#"{"title":"Today"}"#);
		assert_eq!(note.version.as_deref(), Some("2024-01-01T00:00:00Z"));
		assert_eq!(note.origin, Some(Origin::Db));
	}

	#[test]
	fn missing_file_is_an_io_error() {
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let sidecar = SidecarMetadata::open(&dir.path().join(".meta.json"))
			.expect("Failed to open sidecar.");
		let err = parse(dir.path(), &dir.path().join("gone.md"), &sidecar)
			.expect_err("Expected read failure.");

		assert!(matches!(err, Error::Io { .. }), "Unexpected error: {err}");
	}

	#[test]
	fn path_outside_root_is_rejected() {
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let sidecar = SidecarMetadata::open(&dir.path().join(".meta.json"))
			.expect("Failed to open sidecar.");
		let err = parse(&dir.path().join("root"), &dir.path().join("other.md"), &sidecar)
			.expect_err("Expected outside-root failure.");

		assert!(matches!(err, Error::OutsideRoot { .. }), "Unexpected error: {err}");
	}

	#[test]
	fn non_utf8_note_is_rejected() {
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let path = dir.path().join("latin1.md");
		let sidecar = SidecarMetadata::open(&dir.path().join(".meta.json"))
			.expect("Failed to open sidecar.");

		fs::write(&path, b"---\ntitle: B\n---\ncaf\xe9 body").expect("Failed to write note.");

		let err = parse(dir.path(), &path, &sidecar).expect_err("Expected UTF-8 failure.");

		assert!(matches!(err, Error::InvalidUtf8 { .. }), "Unexpected error: {err}");
	}
}
