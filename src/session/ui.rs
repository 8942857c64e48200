use std::fmt;
use std::time::Duration;

use log::{error, info, warn};

/// How long a notice stays on screen before removing itself
pub const NOTICE_DISPLAY_TIME: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
	Success,
	Warning,
	Error,
	Info,
}

impl NoticeKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			NoticeKind::Success => "success",
			NoticeKind::Warning => "warning",
			NoticeKind::Error => "error",
			NoticeKind::Info => "info",
		}
	}
}

impl fmt::Display for NoticeKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A transient, non-blocking notice (toast)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
	pub message: String,
	pub kind: NoticeKind,
}

impl Notice {
	pub fn new(message: impl Into<String>, kind: NoticeKind) -> Self {
		Notice {
			message: message.into(),
			kind,
		}
	}

	pub fn expired() -> Self {
		Notice::new("Your session has expired due to inactivity", NoticeKind::Warning)
	}

	pub fn extended() -> Self {
		Notice::new("Session extended successfully", NoticeKind::Success)
	}

	pub fn extend_failed() -> Self {
		Notice::new("Could not extend the session", NoticeKind::Error)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningStyle {
	/// Blocking dialog offering extend and logout
	Modal,
	/// Passive toast
	Toast,
}

/// The expiry warning as it should be rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarningPrompt {
	pub minutes: u64,
	pub style: WarningStyle,
	pub message: String,
}

impl WarningPrompt {
	pub fn new(minutes: u64, style: WarningStyle) -> Self {
		let message = match style {
			WarningStyle::Modal => format!(
				"Your session expires in {} minutes. Do you want to extend it?",
				minutes
			),
			WarningStyle::Toast => format!("Your session expires in {} minutes", minutes),
		};

		WarningPrompt {
			minutes,
			style,
			message,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorStatus {
	Active,
	Warning,
}

impl IndicatorStatus {
	pub fn css_class(&self) -> &'static str {
		match self {
			IndicatorStatus::Active => "active",
			IndicatorStatus::Warning => "warning",
		}
	}
}

/// Content of the optional session indicator element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indicator {
	pub text: String,
	pub status: IndicatorStatus,
}

impl Indicator {
	pub fn new(minutes: u64, warning: bool) -> Self {
		Indicator {
			text: format!("Session: {}m", minutes),
			status: if warning {
				IndicatorStatus::Warning
			} else {
				IndicatorStatus::Active
			},
		}
	}
}

/// Everything the watchdog shows or does to the page.
///
/// Called while the watchdog holds its state lock: implementations must not
/// call back into `SessionMonitor`.
pub trait SessionUi: Send + Sync {
	/// Mount (or update) the single warning element
	fn show_warning(&self, prompt: &WarningPrompt);

	/// Remove the warning element if mounted
	fn hide_warning(&self);

	fn notify(&self, notice: &Notice);

	/// No-op when the page has no indicator element
	fn update_indicator(&self, indicator: &Indicator);

	fn navigate(&self, url: &str);
}

/// Renders watchdog output to the log, for headless hosts
#[derive(Debug, Default)]
pub struct LogSessionUi;

impl SessionUi for LogSessionUi {
	fn show_warning(&self, prompt: &WarningPrompt) {
		warn!("[SESSION] {}", prompt.message);
	}

	fn hide_warning(&self) {
		info!("[SESSION] Warning dismissed");
	}

	fn notify(&self, notice: &Notice) {
		let shown_for = NOTICE_DISPLAY_TIME.as_secs();
		match notice.kind {
			NoticeKind::Error => error!("[{}] {} ({}s)", notice.kind, notice.message, shown_for),
			NoticeKind::Warning => warn!("[{}] {} ({}s)", notice.kind, notice.message, shown_for),
			_ => info!("[{}] {} ({}s)", notice.kind, notice.message, shown_for),
		}
	}

	fn update_indicator(&self, indicator: &Indicator) {
		info!("{} ({})", indicator.text, indicator.status.css_class());
	}

	fn navigate(&self, url: &str) {
		info!("Navigating to {}", url);
	}
}
