use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("I/O failed for {path:?}: {source}")]
	Io { path: PathBuf, source: std::io::Error },
	#[error("Note {path:?} is not valid UTF-8.")]
	InvalidUtf8 { path: PathBuf },
	#[error("Path {path:?} is not inside the notes root.")]
	OutsideRoot { path: PathBuf },
	#[error("File metadata failed for {path:?}: {message}")]
	Metadata { path: PathBuf, message: String },
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("The store actor has shut down.")]
	StoreClosed,
	#[error("The job manager has shut down.")]
	ManagerClosed,
	#[error(transparent)]
	Storage(#[from] nb_storage::Error),
	#[error(transparent)]
	Domain(#[from] nb_domain::Error),
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error(transparent)]
	Watch(#[from] notify::Error),
	#[error(transparent)]
	Json(#[from] serde_json::Error),
	#[error(transparent)]
	Join(#[from] tokio::task::JoinError),
}
impl Error {
	pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		Self::Io { path: path.into(), source }
	}
}
