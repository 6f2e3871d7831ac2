use tokio::{
	sync::{mpsc, watch},
	task::{JoinError, JoinHandle},
};

use crate::{Error, Result};

pub const CONTROL_BUFFER: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
	Start,
	Stop,
	Restart,
}
impl From<bool> for ControlCommand {
	fn from(start: bool) -> Self {
		if start { Self::Start } else { Self::Stop }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
	Stopped,
	Running,
}

/// Spawns a fresh job. The job must return once `stop` turns true.
pub trait JobFactory: Send + Sync + 'static {
	fn spawn(&self, stop: watch::Receiver<bool>) -> JoinHandle<Result<()>>;
}

/// Sending side of the control channel.
#[derive(Clone)]
pub struct ControlHandle {
	tx: mpsc::Sender<ControlCommand>,
}
impl ControlHandle {
	pub async fn send(&self, command: ControlCommand) -> Result<()> {
		self.tx.send(command).await.map_err(|_| Error::ManagerClosed)
	}

	pub async fn start(&self) -> Result<()> {
		self.send(ControlCommand::Start).await
	}

	pub async fn stop(&self) -> Result<()> {
		self.send(ControlCommand::Stop).await
	}

	pub async fn restart(&self) -> Result<()> {
		self.send(ControlCommand::Restart).await
	}
}

enum Wake {
	Command(Option<ControlCommand>),
	JobExited(Result<Result<()>, JoinError>),
}

struct RunningJob {
	stop: watch::Sender<bool>,
	handle: JoinHandle<Result<()>>,
}

pub struct JobManager<F> {
	factory: F,
	rx: mpsc::Receiver<ControlCommand>,
	job: Option<RunningJob>,
	state: watch::Sender<ManagerState>,
}
impl<F> JobManager<F>
where
	F: JobFactory,
{
	pub fn new(factory: F) -> (Self, ControlHandle) {
		let (tx, rx) = mpsc::channel(CONTROL_BUFFER);
		let (state, _) = watch::channel(ManagerState::Stopped);

		(Self { factory, rx, job: None, state }, ControlHandle { tx })
	}

	/// Observes state transitions.
	pub fn subscribe(&self) -> watch::Receiver<ManagerState> {
		self.state.subscribe()
	}

	/// Processes commands until every [`ControlHandle`] is dropped, then stops any running job
	/// and returns. A job that exits on its own is reported as soon as it finishes.
	pub async fn run(mut self) {
		loop {
			let wake = match &mut self.job {
				Some(job) => tokio::select! {
					command = self.rx.recv() => Wake::Command(command),
					joined = &mut job.handle => Wake::JobExited(joined),
				},
				None => Wake::Command(self.rx.recv().await),
			};
			let command = match wake {
				Wake::Command(Some(command)) => command,
				Wake::Command(None) => break,
				Wake::JobExited(joined) => {
					self.job = None;

					match joined {
						Ok(Ok(())) => tracing::info!("Sync job exited on its own."),
						Ok(Err(err)) => tracing::error!(error = %err, "Sync job failed."),
						Err(err) => tracing::error!(error = %err, "Sync job panicked."),
					}

					self.state.send_replace(ManagerState::Stopped);

					continue;
				},
			};

			tracing::debug!(?command, "Job manager received command.");

			match command {
				ControlCommand::Start => self.start(),
				ControlCommand::Stop => self.stop().await,
				ControlCommand::Restart => {
					self.stop().await;
					self.start();
				},
			}
		}

		self.stop().await;

		tracing::info!("Job manager exited.");
	}

	fn start(&mut self) {
		if let Some(job) = &self.job {
			if !job.handle.is_finished() {
				tracing::info!("Sync job already running. Ignoring start.");

				return;
			}

			tracing::info!("Previous sync job exited on its own.");
		}

		let (stop, stop_rx) = watch::channel(false);
		let handle = self.factory.spawn(stop_rx);

		self.job = Some(RunningJob { stop, handle });
		self.state.send_replace(ManagerState::Running);

		tracing::info!("Sync job started.");
	}

	async fn stop(&mut self) {
		let Some(job) = self.job.take() else {
			return;
		};

		let _ = job.stop.send(true);

		match job.handle.await {
			Ok(Ok(())) => tracing::info!("Sync job stopped."),
			Ok(Err(err)) => tracing::error!(error = %err, "Sync job failed."),
			Err(err) => tracing::error!(error = %err, "Sync job panicked."),
		}

		self.state.send_replace(ManagerState::Stopped);
	}
}

#[cfg(test)]
mod tests {
	use std::{
		sync::{
			Arc,
			atomic::{AtomicUsize, Ordering},
		},
		time::Duration,
	};

	use super::*;

	#[derive(Clone, Default)]
	struct CountingFactory {
		started: Arc<AtomicUsize>,
		finished: Arc<AtomicUsize>,
		exit_immediately: bool,
		fail: bool,
	}
	impl JobFactory for CountingFactory {
		fn spawn(&self, mut stop: watch::Receiver<bool>) -> JoinHandle<Result<()>> {
			let finished = self.finished.clone();
			let exit_immediately = self.exit_immediately;
			let fail = self.fail;

			self.started.fetch_add(1, Ordering::SeqCst);

			tokio::spawn(async move {
				if !exit_immediately {
					while !*stop.borrow() {
						if stop.changed().await.is_err() {
							break;
						}
					}
				}

				finished.fetch_add(1, Ordering::SeqCst);

				if fail { Err(Error::NotFound("notes root".to_string())) } else { Ok(()) }
			})
		}
	}

	#[tokio::test]
	async fn duplicate_start_is_ignored_and_close_stops_the_job() {
		let factory = CountingFactory::default();
		let (manager, control) = JobManager::new(factory.clone());
		let runner = tokio::spawn(manager.run());

		control.start().await.expect("Failed to send start.");
		control.start().await.expect("Failed to send start.");
		drop(control);
		runner.await.expect("Manager task panicked.");

		assert_eq!(factory.started.load(Ordering::SeqCst), 1);
		assert_eq!(factory.finished.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn restart_waits_for_the_previous_job() {
		let factory = CountingFactory::default();
		let (manager, control) = JobManager::new(factory.clone());
		let runner = tokio::spawn(manager.run());

		control.start().await.expect("Failed to send start.");
		control.restart().await.expect("Failed to send restart.");
		control.stop().await.expect("Failed to send stop.");
		control.stop().await.expect("Failed to send stop.");
		drop(control);
		runner.await.expect("Manager task panicked.");

		assert_eq!(factory.started.load(Ordering::SeqCst), 2);
		assert_eq!(factory.finished.load(Ordering::SeqCst), 2);
	}

	async fn wait_until_stopped_after(
		factory: &CountingFactory,
		state: &watch::Receiver<ManagerState>,
		started: usize,
	) {
		tokio::time::timeout(Duration::from_secs(5), async {
			while factory.started.load(Ordering::SeqCst) < started
				|| *state.borrow() != ManagerState::Stopped
			{
				tokio::task::yield_now().await;
			}
		})
		.await
		.expect("Manager never reported the job as stopped.");
	}

	#[tokio::test]
	async fn start_after_self_exit_spawns_again() {
		let factory = CountingFactory { exit_immediately: true, ..Default::default() };
		let (manager, control) = JobManager::new(factory.clone());
		let state = manager.subscribe();
		let runner = tokio::spawn(manager.run());

		control.send(true.into()).await.expect("Failed to send start.");
		wait_until_stopped_after(&factory, &state, 1).await;

		control.send(true.into()).await.expect("Failed to send start.");
		wait_until_stopped_after(&factory, &state, 2).await;
		control.send(false.into()).await.expect("Failed to send stop.");
		drop(control);
		runner.await.expect("Manager task panicked.");

		assert_eq!(factory.started.load(Ordering::SeqCst), 2);
		assert_eq!(factory.finished.load(Ordering::SeqCst), 2);
		assert_eq!(*state.borrow(), ManagerState::Stopped);
	}

	#[tokio::test]
	async fn failed_job_is_noticed_without_a_command() {
		let factory = CountingFactory { exit_immediately: true, fail: true, ..Default::default() };
		let (manager, control) = JobManager::new(factory.clone());
		let state = manager.subscribe();
		let runner = tokio::spawn(manager.run());

		control.start().await.expect("Failed to send start.");
		wait_until_stopped_after(&factory, &state, 1).await;

		assert_eq!(factory.finished.load(Ordering::SeqCst), 1);

		// The control channel is still open, so the manager noticed the exit by itself.
		control.start().await.expect("Failed to send start.");
		wait_until_stopped_after(&factory, &state, 2).await;
		drop(control);
		runner.await.expect("Manager task panicked.");

		assert_eq!(factory.started.load(Ordering::SeqCst), 2);
	}

	#[test]
	fn bool_maps_to_start_and_stop() {
		assert_eq!(ControlCommand::from(true), ControlCommand::Start);
		assert_eq!(ControlCommand::from(false), ControlCommand::Stop);
	}
}
