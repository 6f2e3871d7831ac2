use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, task::JoinHandle};

use crate::{
	Result, SyncContext, debounce,
	manager::JobFactory,
	scan::{self, ScanOptions},
	watcher::{self, Dispatcher},
};

/// One sync job: subscribe to the notes root, run the initial scan, then apply live events until
/// stopped.
///
/// The subscription is opened before the walk so edits made during the scan are buffered and
/// applied once it has finished. The scan and the dispatcher therefore never write concurrently.
#[derive(Clone)]
pub struct SyncJob {
	ctx: Arc<SyncContext>,
}
impl SyncJob {
	pub fn new(ctx: Arc<SyncContext>) -> Self {
		Self { ctx }
	}

	pub async fn run(self, stop: watch::Receiver<bool>) -> Result<()> {
		let ctx = &self.ctx;
		let subscription = watcher::subscribe(&ctx.config.root)?;
		let options = ScanOptions::from_config(&ctx.config, ctx.filter.clone());

		scan::run(&ctx.store, ctx.metadata.clone(), &options, stop.clone()).await?;

		if *stop.borrow() {
			return Ok(());
		}

		let (_watcher, events) = subscription.into_parts();
		let events = match ctx.config.watch_debounce_ms {
			0 => events,
			window => debounce::debounce_by_path(events, Duration::from_millis(window)),
		};
		let dispatcher = Dispatcher::new(
			ctx.config.root.clone(),
			ctx.filter.clone(),
			ctx.config.placeholder_slugs.clone(),
			ctx.metadata.clone(),
			ctx.store.clone(),
		);

		dispatcher.run(events, stop).await;

		Ok(())
	}
}
impl JobFactory for SyncJob {
	fn spawn(&self, stop: watch::Receiver<bool>) -> JoinHandle<Result<()>> {
		tokio::spawn(self.clone().run(stop))
	}
}
