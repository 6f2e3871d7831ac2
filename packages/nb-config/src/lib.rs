mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, DEFAULT_SYNC_BATCH_SIZE, DEFAULT_SYNC_WORKERS, MetadataBackend, Service, Sqlite,
	Storage, Sync,
};

use std::{
	env, fs,
	path::{Path, PathBuf},
};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg, path.parent().unwrap_or_else(|| Path::new(".")));

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.sync.root.as_os_str().is_empty() {
		return Err(Error::Validation { message: "sync.root must be non-empty.".to_string() });
	}
	if cfg.storage.sqlite.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.sqlite.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.sqlite.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.sqlite.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.sync.sync_workers == 0 {
		return Err(Error::Validation {
			message: "sync.sync_workers must be greater than zero.".to_string(),
		});
	}
	if cfg.sync.sync_batch_size == 0 {
		return Err(Error::Validation {
			message: "sync.sync_batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.sync.metadata == MetadataBackend::Sidecar && cfg.sync.sidecar_path.as_os_str().is_empty()
	{
		return Err(Error::Validation {
			message: "sync.sidecar_path must be non-empty when sync.metadata is sidecar."
				.to_string(),
		});
	}

	for slug in &cfg.sync.placeholder_slugs {
		if slug.trim().is_empty() {
			return Err(Error::Validation {
				message: "sync.placeholder_slugs must not contain empty entries.".to_string(),
			});
		}
	}

	Ok(())
}

/// Resolves `sync.root` against the home directory or `base_dir` and fills zeroed sizes with
/// their defaults.
pub fn normalize(cfg: &mut Config, base_dir: &Path) {
	cfg.sync.root = resolve_root(&cfg.sync.root, base_dir);

	if cfg.sync.sync_workers == 0 {
		cfg.sync.sync_workers = DEFAULT_SYNC_WORKERS;
	}
	if cfg.sync.sync_batch_size == 0 {
		cfg.sync.sync_batch_size = DEFAULT_SYNC_BATCH_SIZE;
	}

	cfg.sync.exclude = cfg
		.sync
		.exclude
		.iter()
		.map(|pattern| pattern.trim().to_string())
		.filter(|pattern| !pattern.is_empty())
		.collect();

	if !cfg.sync.sidecar_path.as_os_str().is_empty() && cfg.sync.sidecar_path.is_relative() {
		cfg.sync.sidecar_path = cfg.sync.root.join(&cfg.sync.sidecar_path);
	}
}

fn resolve_root(root: &Path, base_dir: &Path) -> PathBuf {
	if root.as_os_str().is_empty() {
		return PathBuf::new();
	}
	if let Ok(rest) = root.strip_prefix("~")
		&& let Some(home) = env::var_os("HOME")
	{
		return PathBuf::from(home).join(rest);
	}
	if root.is_relative() {
		return base_dir.join(root);
	}

	root.to_path_buf()
}
