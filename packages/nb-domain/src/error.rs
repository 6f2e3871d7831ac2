pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Front matter must be a mapping.")]
	FrontMatterNotMapping,
	#[error(transparent)]
	Json(#[from] serde_json::Error),
	#[error(transparent)]
	Yaml(#[from] serde_yaml::Error),
	#[error("Failed to format version timestamp: {0}")]
	Version(#[from] time::error::Format),
}
