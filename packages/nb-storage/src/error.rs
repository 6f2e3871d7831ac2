#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Conflict: {0}")]
	Conflict(String),
}
impl Error {
	/// Maps a unique-index violation to [`Error::Conflict`].
	pub fn from_write(err: sqlx::Error, path: &str) -> Self {
		match &err {
			sqlx::Error::Database(db_err) if db_err.is_unique_violation() =>
				Self::Conflict(format!("A live row already exists for {path:?}.")),
			_ => Self::Sqlx(err),
		}
	}
}
