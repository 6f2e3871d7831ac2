/// A row of the `files` table. Timestamps and versions are RFC 3339 text.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FileRecord {
	pub id: String,
	pub path: String,
	pub slug: String,
	pub content: String,
	/// JSON object text.
	pub frontmatter: String,
	pub raw_frontmatter: String,
	pub origin: String,
	pub version: String,
	pub created: String,
	pub updated: String,
	pub deleted: Option<String>,
}
impl FileRecord {
	pub fn is_deleted(&self) -> bool {
		self.deleted.is_some()
	}

	/// Stored version, or `None` when the row was never stamped.
	pub fn version(&self) -> Option<&str> {
		Some(self.version.as_str()).filter(|version| !version.trim().is_empty())
	}
}

/// Content written into a row, either on insert or on update.
#[derive(Debug, Clone)]
pub struct FileContent<'a> {
	pub slug: &'a str,
	pub content: &'a str,
	pub frontmatter: &'a str,
	pub raw_frontmatter: &'a str,
	pub origin: &'a str,
	pub version: &'a str,
}
