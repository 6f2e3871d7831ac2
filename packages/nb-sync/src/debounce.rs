use std::{collections::HashMap, path::PathBuf, time::Duration};

use tokio::{
	sync::mpsc,
	time::{self, Instant},
};

use crate::watcher::{FsEvent, FsEventKind};

/// Forwards only the last value of each burst, once `window` has passed without a new value.
/// A pending value is flushed when the input closes.
pub fn debounce<T>(mut input: mpsc::UnboundedReceiver<T>, window: Duration) -> mpsc::UnboundedReceiver<T>
where
	T: Send + 'static,
{
	let (tx, output) = mpsc::unbounded_channel();

	tokio::spawn(async move {
		let mut pending: Option<T> = None;
		let mut deadline = Instant::now();

		loop {
			tokio::select! {
				value = input.recv() => match value {
					Some(value) => {
						pending = Some(value);
						deadline = Instant::now() + window;
					},
					None => break,
				},
				_ = time::sleep_until(deadline), if pending.is_some() => {
					if let Some(value) = pending.take()
						&& tx.send(value).is_err()
					{
						return;
					}
				},
			}
		}

		if let Some(value) = pending {
			let _ = tx.send(value);
		}
	});

	output
}

/// Coalesces watcher events per path and releases each path once it has been quiet for
/// `window`. Paths are released in the order their windows expire.
pub fn debounce_by_path(
	mut input: mpsc::UnboundedReceiver<FsEvent>,
	window: Duration,
) -> mpsc::UnboundedReceiver<FsEvent> {
	let (tx, output) = mpsc::unbounded_channel();

	tokio::spawn(async move {
		let mut pending: HashMap<PathBuf, (FsEventKind, Instant)> = HashMap::new();

		loop {
			let next = pending.values().map(|(_, deadline)| *deadline).min();

			tokio::select! {
				event = input.recv() => match event {
					Some(event) => {
						let deadline = Instant::now() + window;
						let kind = match pending.get(&event.path) {
							Some((previous, _)) => merge(*previous, event.kind),
							None => event.kind,
						};

						pending.insert(event.path, (kind, deadline));
					},
					None => break,
				},
				_ = time::sleep_until(next.unwrap_or_else(Instant::now)), if next.is_some() => {
					let now = Instant::now();
					let mut due = pending
						.iter()
						.filter(|(_, (_, deadline))| *deadline <= now)
						.map(|(path, (kind, deadline))| (*deadline, path.clone(), *kind))
						.collect::<Vec<_>>();

					due.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

					for (_, path, kind) in due {
						pending.remove(&path);

						if tx.send(FsEvent::new(kind, path)).is_err() {
							return;
						}
					}
				},
			}
		}

		let mut rest = pending.into_iter().collect::<Vec<_>>();

		rest.sort_by(|a, b| a.1.1.cmp(&b.1.1).then_with(|| a.0.cmp(&b.0)));

		for (path, (kind, _)) in rest {
			if tx.send(FsEvent::new(kind, path)).is_err() {
				return;
			}
		}
	});

	output
}

/// Folds a newer event for a path into the pending one.
pub fn merge(previous: FsEventKind, next: FsEventKind) -> FsEventKind {
	match (previous, next) {
		(_, FsEventKind::Remove) => FsEventKind::Remove,
		(_, FsEventKind::Create) => FsEventKind::Create,
		(FsEventKind::Create | FsEventKind::Remove, FsEventKind::Write) => FsEventKind::Create,
		(FsEventKind::Write, FsEventKind::Write) => FsEventKind::Write,
	}
}
