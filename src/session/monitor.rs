use std::sync::{Arc, Mutex, MutexGuard, Weak};

use log::{debug, error, info, warn};
use tokio::sync::watch;

use crate::session::api::SessionApi;
use crate::session::config::{SessionConfig, AUTO_EXTEND_WINDOW};
use crate::session::machine::{Effect, SessionEvent, SessionMachine, SessionPhase, SessionState};
use crate::session::ui::SessionUi;
use crate::utils::{RepeatingTask, Throttle};

/// User activity that can trigger a silent session refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
	Click,
	KeyPress,
	Scroll,
	PointerMove,
}

/// Session watchdog: polls the session status, sends heartbeats, warns
/// before expiry and redirects once the session is gone.
///
/// Cloning is cheap, clones share the same watchdog.
#[derive(Clone)]
pub struct SessionMonitor {
	inner: Arc<Inner>,
}

struct Inner {
	config: SessionConfig,
	api: Arc<dyn SessionApi>,
	ui: Arc<dyn SessionUi>,
	machine: Mutex<SessionMachine>,
	timers: Mutex<Vec<RepeatingTask>>,
	activity: Throttle,
	phase: watch::Sender<SessionPhase>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SessionMonitor {
	/// Create a watchdog. Nothing runs until `start` is called.
	pub fn new(config: SessionConfig, api: Arc<dyn SessionApi>, ui: Arc<dyn SessionUi>) -> Self {
		let machine = SessionMachine::new(&config);
		let (phase, _) = watch::channel(machine.phase());

		SessionMonitor {
			inner: Arc::new(Inner {
				config,
				api,
				ui,
				machine: Mutex::new(machine),
				timers: Mutex::new(Vec::new()),
				activity: Throttle::new(AUTO_EXTEND_WINDOW),
				phase,
			}),
		}
	}

	/// Probe the session once and start monitoring if it is authenticated
	pub async fn start(&self) -> SessionPhase {
		info!("Starting session timeout watchdog");
		self.check_session().await;

		let phase = self.phase();
		if phase.is_monitoring() {
			info!(
				"Session monitoring active (status every {:?}, heartbeat every {:?})",
				self.inner.config.check_interval, self.inner.config.heartbeat_interval
			);
		} else {
			info!("No active session, watchdog not started");
		}
		phase
	}

	/// One status-check cycle
	pub async fn check_session(&self) {
		let event = match self.inner.api.status().await {
			Ok(status) => SessionEvent::Status(status),
			Err(e) => {
				error!("Error checking session: {}", e);
				SessionEvent::StatusFailed
			}
		};
		self.dispatch(event);
	}

	/// One heartbeat cycle
	pub async fn send_heartbeat(&self) {
		let event = match self.inner.api.heartbeat().await {
			Ok(authenticated) => SessionEvent::Heartbeat { authenticated },
			Err(e) => {
				error!("Error sending heartbeat: {}", e);
				SessionEvent::HeartbeatFailed
			}
		};
		self.dispatch(event);
	}

	/// The "extend" action of the warning
	pub async fn extend_session(&self) {
		let event = match self.inner.api.extend().await {
			Ok(true) => SessionEvent::ExtendSucceeded,
			Ok(false) => {
				warn!("Server refused to extend the session");
				SessionEvent::ExtendFailed
			}
			Err(e) => {
				error!("Error extending session: {}", e);
				SessionEvent::ExtendFailed
			}
		};
		self.dispatch(event);
	}

	/// The "logout" action of the warning
	pub fn logout(&self) {
		self.dispatch(SessionEvent::LogoutRequested);
	}

	/// Cancel both timers and remove any warning
	pub fn stop(&self) {
		info!("Stopping session monitoring");
		self.dispatch(SessionEvent::StopRequested);
	}

	/// Report user activity. With auto-extend enabled this refreshes the
	/// session in the background, at most once per minute.
	///
	/// Returns true if a refresh was started.
	pub fn record_activity(&self, kind: ActivityKind) -> bool {
		if !self.inner.config.auto_extend || !self.phase().is_monitoring() {
			return false;
		}

		if !self.inner.activity.try_pass() {
			return false;
		}

		debug!("Activity ({:?}), refreshing session", kind);
		let api = self.inner.api.clone();
		tokio::spawn(async move {
			match api.refresh().await {
				Ok(true) => info!("Session refreshed after user activity"),
				Ok(false) => warn!("Session refresh was not accepted"),
				Err(e) => error!("Error refreshing session: {}", e),
			}
		});
		true
	}

	pub fn phase(&self) -> SessionPhase {
		*self.inner.phase.borrow()
	}

	pub fn state(&self) -> SessionState {
		lock(&self.inner.machine).state()
	}

	pub fn config(&self) -> &SessionConfig {
		&self.inner.config
	}

	/// Watch phase changes
	pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
		self.inner.phase.subscribe()
	}

	/// Resolves once the watchdog has nothing left to do
	pub async fn wait_terminated(&self) {
		let mut phases = self.subscribe();
		loop {
			if *phases.borrow_and_update() == SessionPhase::Terminated {
				return;
			}
			if phases.changed().await.is_err() {
				return;
			}
		}
	}

	// Effects run under the machine lock: the UI sees them in transition order
	fn dispatch(&self, event: SessionEvent) {
		let mut machine = lock(&self.inner.machine);
		let effects = machine.handle(event);
		self.inner.phase.send_replace(machine.phase());

		for effect in effects {
			self.apply(effect);
		}
	}

	fn apply(&self, effect: Effect) {
		match effect {
			Effect::StartTimers => self.start_timers(),
			Effect::StopTimers => {
				let mut timers = lock(&self.inner.timers);
				for timer in timers.iter_mut() {
					timer.cancel();
				}
				timers.clear();
			}
			Effect::ShowWarning(prompt) => self.inner.ui.show_warning(&prompt),
			Effect::HideWarning => self.inner.ui.hide_warning(),
			Effect::Notify(notice) => self.inner.ui.notify(&notice),
			Effect::UpdateIndicator(indicator) => self.inner.ui.update_indicator(&indicator),
			Effect::Navigate { url, after } => {
				if after.is_zero() {
					self.inner.ui.navigate(&url);
					return;
				}

				let monitor = self.clone();
				tokio::spawn(async move {
					tokio::time::sleep(after).await;
					monitor.inner.ui.navigate(&url);
					monitor.dispatch(SessionEvent::Redirected);
				});
			}
		}
	}

	fn start_timers(&self) {
		let check = {
			let weak = Arc::downgrade(&self.inner);
			RepeatingTask::spawn("session-status", self.inner.config.check_interval, move || {
				let monitor = upgrade(&weak);
				async move {
					if let Some(monitor) = monitor {
						monitor.check_session().await;
					}
				}
			})
		};

		let heartbeat = {
			let weak = Arc::downgrade(&self.inner);
			RepeatingTask::spawn(
				"session-heartbeat",
				self.inner.config.heartbeat_interval,
				move || {
					let monitor = upgrade(&weak);
					async move {
						if let Some(monitor) = monitor {
							monitor.send_heartbeat().await;
						}
					}
				},
			)
		};

		let mut timers = lock(&self.inner.timers);
		for timer in timers.iter_mut() {
			timer.cancel();
		}
		*timers = vec![check, heartbeat];
	}
}

// Timers hold a weak handle so a dropped watchdog stops polling on its own
fn upgrade(weak: &Weak<Inner>) -> Option<SessionMonitor> {
	weak.upgrade().map(|inner| SessionMonitor { inner })
}
