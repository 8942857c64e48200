use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Lets at most one call through per window
pub struct Throttle {
	window: Duration,
	last_pass: Mutex<Option<Instant>>,
}

impl Throttle {
	pub fn new(window: Duration) -> Self {
		Throttle {
			window,
			last_pass: Mutex::new(None),
		}
	}

	/// Returns true if the caller may proceed, and starts a new window if so
	pub fn try_pass(&self) -> bool {
		let now = Instant::now();
		let mut last = self
			.last_pass
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner());

		match *last {
			Some(at) if now.duration_since(at) < self.window => false,
			_ => {
				*last = Some(now);
				true
			}
		}
	}
}
