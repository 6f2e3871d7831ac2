use std::{
	fmt,
	path::{Component, Path, PathBuf},
	str::FromStr,
};

use crate::{front_matter, hash};

/// Who performed the last write of a note. Diagnostic only, never used for conflict decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
	Fs,
	Db,
	Init,
}
impl Origin {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Fs => "fs",
			Self::Db => "db",
			Self::Init => "init",
		}
	}
}
impl fmt::Display for Origin {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for Origin {
	type Err = String;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		match value {
			"fs" => Ok(Self::Fs),
			"db" => Ok(Self::Db),
			"init" => Ok(Self::Init),
			other => Err(format!("Unknown origin {other:?}.")),
		}
	}
}

/// A note as read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
	pub abs_path: PathBuf,
	/// `/`-separated path relative to the notes root. The stable key shared with the table.
	pub rel_path: String,
	pub slug: String,
	pub raw_front_matter: String,
	/// JSON object text; `{}` when the note has no usable front matter.
	pub front_matter_json: String,
	pub body: String,
	pub origin: Option<Origin>,
	/// Version stamp carried by the file, if any.
	pub version: Option<String>,
}
impl Note {
	pub fn from_content(abs_path: PathBuf, rel_path: String, content: &str) -> Self {
		let parts = front_matter::split(content);
		let slug = slug_of(&abs_path);

		Self {
			abs_path,
			rel_path,
			slug,
			raw_front_matter: parts.raw.to_string(),
			front_matter_json: front_matter::to_json(parts.raw),
			body: parts.body.to_string(),
			origin: None,
			version: None,
		}
	}

	pub fn hash(&self) -> String {
		hash::digest(&self.raw_front_matter, &self.body)
	}

	pub fn canonical_text(&self) -> String {
		hash::canonical_text(&self.raw_front_matter, &self.body)
	}
}

/// File stem used as the note's display name.
pub fn slug_of(path: &Path) -> String {
	path.file_stem().map(|stem| stem.to_string_lossy().into_owned()).unwrap_or_default()
}

pub fn is_markdown(path: &Path) -> bool {
	path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}

pub fn is_placeholder<S>(slug: &str, placeholders: &[S]) -> bool
where
	S: AsRef<str>,
{
	placeholders.iter().any(|placeholder| placeholder.as_ref() == slug)
}

/// Path of `abs_path` below `root`, joined with `/`. `None` when the path escapes the root or is
/// the root itself.
pub fn relative_path(root: &Path, abs_path: &Path) -> Option<String> {
	let rest = abs_path.strip_prefix(root).ok()?;
	let mut parts = Vec::new();

	for component in rest.components() {
		match component {
			Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
			Component::CurDir => {},
			_ => return None,
		}
	}

	if parts.is_empty() {
		return None;
	}

	Some(parts.join("/"))
}
