use std::future::Future;
use std::time::Duration;

use log::debug;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// A repeating background task with a cancellation handle.
///
/// The first run happens one full period after spawning. Each tick spawns
/// the job on its own task, so a job that is still waiting on the network
/// never delays the next tick.
pub struct RepeatingTask {
	name: &'static str,
	handle: Option<JoinHandle<()>>,
}

impl RepeatingTask {
	/// Spawn a task that runs `job` every `period`
	pub fn spawn<F, Fut>(name: &'static str, period: Duration, job: F) -> Self
	where
		F: Fn() -> Fut + Send + Sync + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		let handle = tokio::spawn(async move {
			let mut ticker = interval_at(Instant::now() + period, period);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

			loop {
				ticker.tick().await;
				tokio::spawn(job());
			}
		});

		debug!("Started repeating task '{}' every {:?}", name, period);
		RepeatingTask {
			name,
			handle: Some(handle),
		}
	}

	/// Stop the task. Jobs already in flight run to completion.
	pub fn cancel(&mut self) {
		if let Some(handle) = self.handle.take() {
			handle.abort();
			debug!("Cancelled repeating task '{}'", self.name);
		}
	}

	pub fn is_running(&self) -> bool {
		self.handle.as_ref().map_or(false, |h| !h.is_finished())
	}
}

impl Drop for RepeatingTask {
	fn drop(&mut self) {
		self.cancel();
	}
}
