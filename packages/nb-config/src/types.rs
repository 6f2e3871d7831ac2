use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub sync: Sync,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub sqlite: Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sqlite {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sync {
	/// Notes root. `~/` and relative paths are resolved when the config is loaded.
	pub root: PathBuf,
	#[serde(default)]
	pub clear_on_startup: bool,
	/// Glob patterns matched against paths relative to `root`.
	#[serde(default)]
	pub exclude: Vec<String>,
	/// Parse workers used by the initial scan. Zero selects the default.
	#[serde(default)]
	pub sync_workers: usize,
	/// Notes per committed batch during the initial scan. Zero selects the default.
	#[serde(default)]
	pub sync_batch_size: usize,
	/// File stems an editor uses for a freshly created, still unnamed note.
	#[serde(default = "default_placeholder_slugs")]
	pub placeholder_slugs: Vec<String>,
	#[serde(default)]
	pub metadata: MetadataBackend,
	/// Index file used by the sidecar backend, relative to `root` unless absolute.
	#[serde(default = "default_sidecar_path")]
	pub sidecar_path: PathBuf,
	/// Quiet window for coalescing watcher events per path. Zero disables debouncing.
	#[serde(default)]
	pub watch_debounce_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataBackend {
	#[default]
	Xattr,
	Sidecar,
}

pub const DEFAULT_SYNC_WORKERS: usize = 5;
pub const DEFAULT_SYNC_BATCH_SIZE: usize = 200;

fn default_placeholder_slugs() -> Vec<String> {
	vec!["Untitled".to_string()]
}

fn default_sidecar_path() -> PathBuf {
	PathBuf::from(".notebase/meta.json")
}
