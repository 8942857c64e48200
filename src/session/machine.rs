use std::time::Duration;

use log::{info, warn};

use crate::session::api::SessionStatus;
use crate::session::config::{SessionConfig, EXPIRY_REDIRECT_DELAY};
use crate::session::ui::{Indicator, Notice, WarningPrompt, WarningStyle};

/// Watchdog lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
	/// Waiting for the first status probe
	Uninitialized,
	/// Timers running, no warning shown
	Monitoring,
	/// Timers running, expiry warning mounted
	Warned,
	/// Timers stopped, redirect to the timeout page pending
	Expired,
	/// Nothing left to do
	Terminated,
}

impl SessionPhase {
	/// Timers run in these phases
	pub fn is_monitoring(&self) -> bool {
		matches!(self, SessionPhase::Monitoring | SessionPhase::Warned)
	}

	pub fn is_finished(&self) -> bool {
		matches!(self, SessionPhase::Expired | SessionPhase::Terminated)
	}
}

/// Client-held view of the session, rebuilt on each poll
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
	pub is_active: bool,
	pub warning_shown: bool,
	pub time_remaining_minutes: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
	Status(SessionStatus),
	StatusFailed,
	Heartbeat { authenticated: bool },
	HeartbeatFailed,
	ExtendSucceeded,
	ExtendFailed,
	LogoutRequested,
	StopRequested,
	/// The delayed expiry redirect was performed
	Redirected,
}

/// Side effects requested by a transition, applied in order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
	StartTimers,
	StopTimers,
	ShowWarning(WarningPrompt),
	HideWarning,
	Notify(Notice),
	UpdateIndicator(Indicator),
	Navigate { url: String, after: Duration },
}

/// The session watchdog state machine. Pure: it never performs I/O,
/// it only returns the effects a transition requires.
#[derive(Debug, Clone)]
pub struct SessionMachine {
	phase: SessionPhase,
	state: SessionState,
	warning_style: WarningStyle,
	logout_url: String,
	timeout_logout_url: String,
}

impl SessionMachine {
	pub fn new(config: &SessionConfig) -> Self {
		SessionMachine {
			phase: SessionPhase::Uninitialized,
			state: SessionState::default(),
			warning_style: if config.show_modal {
				WarningStyle::Modal
			} else {
				WarningStyle::Toast
			},
			logout_url: config.logout_url.clone(),
			timeout_logout_url: config.timeout_logout_url.clone(),
		}
	}

	pub fn phase(&self) -> SessionPhase {
		self.phase
	}

	pub fn state(&self) -> SessionState {
		self.state
	}

	/// Apply one event and return the effects to perform
	pub fn handle(&mut self, event: SessionEvent) -> Vec<Effect> {
		let before = self.phase;
		let effects = match (self.phase, event) {
			(SessionPhase::Uninitialized, SessionEvent::Status(status)) => self.start(status),
			(SessionPhase::Uninitialized, SessionEvent::StatusFailed) => {
				self.phase = SessionPhase::Terminated;
				Vec::new()
			}

			(phase, SessionEvent::Status(status)) if phase.is_monitoring() => self.observe(status),

			(phase, SessionEvent::Heartbeat { authenticated: false }) if phase.is_monitoring() => {
				warn!("Heartbeat reports the session is no longer authenticated");
				self.expire()
			}

			(SessionPhase::Warned, SessionEvent::ExtendSucceeded) => {
				self.state.warning_shown = false;
				self.phase = SessionPhase::Monitoring;
				vec![Effect::HideWarning, Effect::Notify(Notice::extended())]
			}
			(SessionPhase::Monitoring, SessionEvent::ExtendSucceeded) => {
				vec![Effect::Notify(Notice::extended())]
			}
			(phase, SessionEvent::ExtendFailed) if phase.is_monitoring() => {
				vec![Effect::Notify(Notice::extend_failed())]
			}

			(phase, SessionEvent::LogoutRequested) if !phase.is_finished() => {
				let mut effects = self.halt();
				effects.push(Effect::Navigate {
					url: self.logout_url.clone(),
					after: Duration::ZERO,
				});
				effects
			}

			(phase, SessionEvent::StopRequested) if !phase.is_finished() => self.halt(),

			(SessionPhase::Expired, SessionEvent::Redirected) => {
				self.phase = SessionPhase::Terminated;
				Vec::new()
			}

			// Transient failures and late replies change nothing
			_ => Vec::new(),
		};

		if before != self.phase {
			info!("Session watchdog: {:?} -> {:?}", before, self.phase);
		}

		effects
	}

	fn start(&mut self, status: SessionStatus) -> Vec<Effect> {
		if !status.authenticated {
			self.phase = SessionPhase::Terminated;
			return Vec::new();
		}

		self.state.is_active = true;
		self.phase = SessionPhase::Monitoring;

		let mut effects = self.observe(status);
		if self.phase.is_monitoring() {
			effects.insert(0, Effect::StartTimers);
		}
		effects
	}

	fn observe(&mut self, status: SessionStatus) -> Vec<Effect> {
		if !status.authenticated {
			info!("Server reports no authenticated session, stopping watchdog");
			return self.halt();
		}

		if status.is_expired {
			return self.expire();
		}

		let minutes = status.minutes_remaining();
		self.state.time_remaining_minutes = minutes;

		let mut effects = Vec::new();
		if status.needs_warning {
			if !self.state.warning_shown {
				self.state.warning_shown = true;
				self.phase = SessionPhase::Warned;
				effects.push(Effect::ShowWarning(WarningPrompt::new(
					minutes,
					self.warning_style,
				)));
			}
		} else if self.state.warning_shown {
			// Extended elsewhere (another tab or an auto-refresh)
			self.state.warning_shown = false;
			self.phase = SessionPhase::Monitoring;
			effects.push(Effect::HideWarning);
		}

		effects.push(Effect::UpdateIndicator(Indicator::new(
			minutes,
			status.needs_warning,
		)));
		effects
	}

	fn expire(&mut self) -> Vec<Effect> {
		info!("Session expired, redirecting to {}", self.timeout_logout_url);

		let mut effects = self.halt();
		self.phase = SessionPhase::Expired;
		effects.push(Effect::Notify(Notice::expired()));
		effects.push(Effect::Navigate {
			url: self.timeout_logout_url.clone(),
			after: EXPIRY_REDIRECT_DELAY,
		});
		effects
	}

	fn halt(&mut self) -> Vec<Effect> {
		let mut effects = vec![Effect::StopTimers];
		if self.state.warning_shown {
			effects.push(Effect::HideWarning);
		}

		self.state.is_active = false;
		self.state.warning_shown = false;
		self.phase = SessionPhase::Terminated;
		effects
	}
}
