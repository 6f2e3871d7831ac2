use sqlx::{Executor, Sqlite};
use uuid::Uuid;

use crate::{
	Error, Result,
	models::{FileContent, FileRecord},
};

const FILE_COLUMNS: &str = "\
id, path, slug, content, frontmatter, raw_frontmatter, origin, version, created, updated, deleted";

/// Returns the live row for `path`, or the most recently deleted one when no live row exists.
pub async fn find_by_path<'e, E>(executor: E, path: &str) -> Result<Option<FileRecord>>
where
	E: Executor<'e, Database = Sqlite>,
{
	let sql = format!(
		"\
SELECT {FILE_COLUMNS}
FROM files
WHERE path = ?1
ORDER BY deleted IS NOT NULL, deleted DESC
LIMIT 1"
	);
	let record = sqlx::query_as::<_, FileRecord>(&sql).bind(path).fetch_optional(executor).await?;

	Ok(record)
}

pub async fn find_live_by_path<'e, E>(executor: E, path: &str) -> Result<Option<FileRecord>>
where
	E: Executor<'e, Database = Sqlite>,
{
	let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE path = ?1 AND deleted IS NULL");
	let record = sqlx::query_as::<_, FileRecord>(&sql).bind(path).fetch_optional(executor).await?;

	Ok(record)
}

pub async fn list_live<'e, E>(executor: E) -> Result<Vec<FileRecord>>
where
	E: Executor<'e, Database = Sqlite>,
{
	let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE deleted IS NULL ORDER BY path");
	let records = sqlx::query_as::<_, FileRecord>(&sql).fetch_all(executor).await?;

	Ok(records)
}

/// Inserts a new live row and returns its id.
pub async fn insert_file<'e, E>(
	executor: E,
	path: &str,
	file: &FileContent<'_>,
	now: &str,
) -> Result<String>
where
	E: Executor<'e, Database = Sqlite>,
{
	if path.is_empty() {
		return Err(Error::InvalidArgument("path must be non-empty.".to_string()));
	}

	let id = Uuid::new_v4().to_string();

	sqlx::query(
		"\
INSERT INTO files (
	id,
	path,
	slug,
	content,
	frontmatter,
	raw_frontmatter,
	origin,
	version,
	created,
	updated,
	deleted
)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9, NULL)",
	)
	.bind(id.as_str())
	.bind(path)
	.bind(file.slug)
	.bind(file.content)
	.bind(file.frontmatter)
	.bind(file.raw_frontmatter)
	.bind(file.origin)
	.bind(file.version)
	.bind(now)
	.execute(executor)
	.await
	.map_err(|err| Error::from_write(err, path))?;

	Ok(id)
}

/// Replaces a row's content and clears any soft-delete marker, reviving deleted rows.
pub async fn update_content<'e, E>(
	executor: E,
	id: &str,
	file: &FileContent<'_>,
	now: &str,
) -> Result<()>
where
	E: Executor<'e, Database = Sqlite>,
{
	let result = sqlx::query(
		"\
UPDATE files
SET slug = ?2,
	content = ?3,
	frontmatter = ?4,
	raw_frontmatter = ?5,
	origin = ?6,
	version = ?7,
	updated = ?8,
	deleted = NULL
WHERE id = ?1",
	)
	.bind(id)
	.bind(file.slug)
	.bind(file.content)
	.bind(file.frontmatter)
	.bind(file.raw_frontmatter)
	.bind(file.origin)
	.bind(file.version)
	.bind(now)
	.execute(executor)
	.await
	.map_err(|err| Error::from_write(err, id))?;

	if result.rows_affected() == 0 {
		return Err(Error::NotFound(format!("File row {id} does not exist.")));
	}

	Ok(())
}

/// Records who last wrote the file and its stamp, leaving content and `updated` untouched.
pub async fn set_origin_version<'e, E>(
	executor: E,
	id: &str,
	origin: &str,
	version: &str,
) -> Result<()>
where
	E: Executor<'e, Database = Sqlite>,
{
	let result = sqlx::query("UPDATE files SET origin = ?2, version = ?3 WHERE id = ?1")
		.bind(id)
		.bind(origin)
		.bind(version)
		.execute(executor)
		.await?;

	if result.rows_affected() == 0 {
		return Err(Error::NotFound(format!("File row {id} does not exist.")));
	}

	Ok(())
}

/// Marks the live row for `path` deleted. Returns whether a row was affected.
pub async fn soft_delete<'e, E>(executor: E, path: &str, now: &str) -> Result<bool>
where
	E: Executor<'e, Database = Sqlite>,
{
	let result = sqlx::query(
		"UPDATE files SET deleted = ?2, updated = ?2 WHERE path = ?1 AND deleted IS NULL",
	)
	.bind(path)
	.bind(now)
	.execute(executor)
	.await?;

	Ok(result.rows_affected() > 0)
}

/// Removes every row, deleted or not. Returns the number of rows removed.
pub async fn clear_all<'e, E>(executor: E) -> Result<u64>
where
	E: Executor<'e, Database = Sqlite>,
{
	let result = sqlx::query("DELETE FROM files").execute(executor).await?;

	Ok(result.rows_affected())
}
