pub mod debounce;
pub mod job;
pub mod manager;
pub mod metadata;
pub mod parser;
pub mod propagate;
pub mod scan;
pub mod store;
pub mod watcher;

mod error;

pub use error::{Error, Result};

use std::sync::Arc;

use tokio::{sync::watch, task::JoinHandle};

use nb_domain::exclude::ExclusionFilter;
use nb_storage::db::Db;

use crate::{
	job::SyncJob,
	manager::{ControlHandle, JobManager},
	metadata::FileMetadata,
	propagate::Propagator,
	scan::{ScanOptions, ScanReport},
	store::{Store, StoreHandle},
};

/// Shared, read-only state handed to every sync job.
pub struct SyncContext {
	pub config: nb_config::Sync,
	pub filter: Arc<ExclusionFilter>,
	pub metadata: Arc<dyn FileMetadata>,
	pub store: StoreHandle,
}

/// Owns the store actor and builds scans, jobs, and the job manager on top of it.
pub struct SyncEngine {
	ctx: Arc<SyncContext>,
	store_task: JoinHandle<()>,
}
impl SyncEngine {
	/// Connects to the database, bootstraps the schema, and starts the store actor.
	pub async fn open(cfg: &nb_config::Config) -> Result<Self> {
		let db = Db::connect(&cfg.storage.sqlite).await?;

		db.ensure_schema().await?;

		let metadata = metadata::from_config(&cfg.sync)?;

		Ok(Self::with_parts(db, cfg.sync.clone(), metadata))
	}

	pub fn with_parts(db: Db, config: nb_config::Sync, metadata: Arc<dyn FileMetadata>) -> Self {
		let (filter, rejected) = ExclusionFilter::new(&config.exclude);

		for pattern in rejected {
			tracing::warn!(
				pattern = %pattern.pattern,
				error = %pattern.error,
				"Skipping invalid exclude pattern."
			);
		}

		let propagator = Propagator::new(config.root.clone(), metadata.clone());
		let (store, store_task) = Store::new(db, metadata.clone(), propagator).spawn();
		let ctx = Arc::new(SyncContext { config, filter: Arc::new(filter), metadata, store });

		Self { ctx, store_task }
	}

	pub fn context(&self) -> &Arc<SyncContext> {
		&self.ctx
	}

	pub fn store(&self) -> &StoreHandle {
		&self.ctx.store
	}

	/// Runs a single initial scan outside of any job.
	pub async fn scan(&self) -> Result<ScanReport> {
		let options = ScanOptions::from_config(&self.ctx.config, self.ctx.filter.clone());
		let (_stop_tx, stop) = watch::channel(false);

		scan::run(&self.ctx.store, self.ctx.metadata.clone(), &options, stop).await
	}

	/// Builds a manager whose jobs scan and then watch the notes root.
	pub fn manager(&self) -> (JobManager<SyncJob>, ControlHandle) {
		JobManager::new(SyncJob::new(self.ctx.clone()))
	}

	/// Stops the store actor once every other handle to it is gone.
	pub async fn shutdown(self) -> Result<()> {
		drop(self.ctx);

		self.store_task.await?;

		Ok(())
	}
}
