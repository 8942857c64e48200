use std::time::Duration;

/// Redirect delay after the session expires
pub const EXPIRY_REDIRECT_DELAY: Duration = Duration::from_secs(2);

/// Minimum spacing between activity-driven session refreshes
pub const AUTO_EXTEND_WINDOW: Duration = Duration::from_secs(60);

/// Session watchdog options
#[derive(Debug, Clone)]
pub struct SessionConfig {
	/// Polling period for `/session/status`
	pub check_interval: Duration,
	/// Informational only. The server's `needs_warning` flag decides when to warn.
	pub warning_threshold_minutes: u32,
	/// Period for keep-alive pings
	pub heartbeat_interval: Duration,
	/// Refresh the session silently on user activity
	pub auto_extend: bool,
	/// Blocking modal when true, passive toast otherwise
	pub show_modal: bool,
	pub logout_url: String,
	pub timeout_logout_url: String,
}

impl Default for SessionConfig {
	fn default() -> Self {
		SessionConfig {
			check_interval: Duration::from_millis(60_000),
			warning_threshold_minutes: 5,
			heartbeat_interval: Duration::from_millis(300_000),
			auto_extend: false,
			show_modal: true,
			logout_url: "/auth/logout".to_string(),
			timeout_logout_url: "/session/logout-timeout".to_string(),
		}
	}
}

impl SessionConfig {
	pub fn with_check_interval(mut self, interval: Duration) -> Self {
		self.check_interval = interval;
		self
	}

	pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
		self.heartbeat_interval = interval;
		self
	}

	pub fn with_warning_threshold(mut self, minutes: u32) -> Self {
		self.warning_threshold_minutes = minutes;
		self
	}

	pub fn with_auto_extend(mut self, enabled: bool) -> Self {
		self.auto_extend = enabled;
		self
	}

	pub fn with_modal(mut self, enabled: bool) -> Self {
		self.show_modal = enabled;
		self
	}
}
