//! Session watchdog driven end to end on tokio's paused clock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use domiflash::error::{Error, Result};
use domiflash::session::ui::Indicator;
use domiflash::session::{
	ActivityKind, Notice, NoticeKind, SessionApi, SessionConfig, SessionMonitor, SessionPhase,
	SessionStatus, SessionUi, WarningPrompt,
};
use tokio::time::sleep;

/// `None` in the script means the request failed. The last entry repeats.
struct FakeApi {
	script: Mutex<VecDeque<Option<SessionStatus>>>,
	last: Mutex<Option<SessionStatus>>,
	heartbeat_authenticated: AtomicBool,
	extend_ok: AtomicBool,
	status_calls: AtomicUsize,
	heartbeat_calls: AtomicUsize,
	refresh_calls: AtomicUsize,
}

impl FakeApi {
	fn new(script: Vec<Option<SessionStatus>>) -> Arc<Self> {
		Arc::new(FakeApi {
			script: Mutex::new(script.into()),
			last: Mutex::new(None),
			heartbeat_authenticated: AtomicBool::new(true),
			extend_ok: AtomicBool::new(true),
			status_calls: AtomicUsize::new(0),
			heartbeat_calls: AtomicUsize::new(0),
			refresh_calls: AtomicUsize::new(0),
		})
	}

	fn status_calls(&self) -> usize {
		self.status_calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl SessionApi for FakeApi {
	async fn status(&self) -> Result<SessionStatus> {
		self.status_calls.fetch_add(1, Ordering::SeqCst);
		let mut script = self.script.lock().unwrap();
		let mut last = self.last.lock().unwrap();
		let next = match script.pop_front() {
			Some(next) => {
				*last = next.clone();
				next
			}
			None => last.clone(),
		};
		next.ok_or_else(|| Error::Network("connection refused".into()))
	}

	async fn extend(&self) -> Result<bool> {
		if self.extend_ok.load(Ordering::SeqCst) {
			Ok(true)
		} else {
			Err(Error::Network("connection reset".into()))
		}
	}

	async fn heartbeat(&self) -> Result<bool> {
		self.heartbeat_calls.fetch_add(1, Ordering::SeqCst);
		Ok(self.heartbeat_authenticated.load(Ordering::SeqCst))
	}

	async fn refresh(&self) -> Result<bool> {
		self.refresh_calls.fetch_add(1, Ordering::SeqCst);
		Ok(true)
	}
}

#[derive(Debug, Clone, PartialEq)]
enum Shown {
	Warning(WarningPrompt),
	Hidden,
	Notice(Notice),
	Indicator(Indicator),
	Navigate(String),
}

#[derive(Default)]
struct RecordingUi {
	events: Mutex<Vec<Shown>>,
}

impl RecordingUi {
	fn events(&self) -> Vec<Shown> {
		self.events.lock().unwrap().clone()
	}

	fn navigations(&self) -> Vec<String> {
		self.events()
			.into_iter()
			.filter_map(|event| match event {
				Shown::Navigate(url) => Some(url),
				_ => None,
			})
			.collect()
	}

	fn push(&self, event: Shown) {
		self.events.lock().unwrap().push(event);
	}
}

impl SessionUi for RecordingUi {
	fn show_warning(&self, prompt: &WarningPrompt) {
		self.push(Shown::Warning(prompt.clone()));
	}

	fn hide_warning(&self) {
		self.push(Shown::Hidden);
	}

	fn notify(&self, notice: &Notice) {
		self.push(Shown::Notice(notice.clone()));
	}

	fn update_indicator(&self, indicator: &Indicator) {
		self.push(Shown::Indicator(indicator.clone()));
	}

	fn navigate(&self, url: &str) {
		self.push(Shown::Navigate(url.to_string()));
	}
}

fn active(minutes: f64) -> Option<SessionStatus> {
	Some(SessionStatus {
		authenticated: true,
		is_expired: false,
		needs_warning: false,
		time_until_timeout: Some(minutes),
	})
}

fn warning(minutes: f64) -> Option<SessionStatus> {
	Some(SessionStatus {
		needs_warning: true,
		..active(minutes).unwrap()
	})
}

fn expired() -> Option<SessionStatus> {
	Some(SessionStatus {
		is_expired: true,
		..active(0.0).unwrap()
	})
}

fn watchdog(
	config: SessionConfig,
	script: Vec<Option<SessionStatus>>,
) -> (SessionMonitor, Arc<FakeApi>, Arc<RecordingUi>) {
	let api = FakeApi::new(script);
	let ui = Arc::new(RecordingUi::default());
	let monitor = SessionMonitor::new(config, api.clone(), ui.clone());
	(monitor, api, ui)
}

#[tokio::test(start_paused = true)]
async fn test_warning_shows_rounded_minutes() {
	let (monitor, _api, ui) = watchdog(SessionConfig::default(), vec![active(30.0), warning(4.2)]);

	assert_eq!(monitor.start().await, SessionPhase::Monitoring);
	sleep(Duration::from_secs(61)).await;

	assert_eq!(monitor.phase(), SessionPhase::Warned);
	let state = monitor.state();
	assert!(state.warning_shown);
	assert_eq!(state.time_remaining_minutes, 5);

	let prompt = ui
		.events()
		.into_iter()
		.find_map(|event| match event {
			Shown::Warning(prompt) => Some(prompt),
			_ => None,
		})
		.expect("warning shown");
	assert!(prompt.message.contains("expires in 5 minutes"));
}

#[tokio::test(start_paused = true)]
async fn test_expiry_redirects_once_after_delay() {
	let (monitor, api, ui) = watchdog(SessionConfig::default(), vec![active(30.0), expired()]);
	monitor.start().await;

	sleep(Duration::from_secs(61)).await;
	assert_eq!(monitor.phase(), SessionPhase::Expired);
	assert!(ui.events().contains(&Shown::Notice(Notice::expired())));
	assert!(ui.navigations().is_empty());

	sleep(Duration::from_secs(2)).await;
	assert_eq!(ui.navigations(), vec!["/session/logout-timeout".to_string()]);
	assert_eq!(monitor.phase(), SessionPhase::Terminated);

	// Both timers are gone
	sleep(Duration::from_secs(600)).await;
	assert_eq!(api.status_calls(), 2);
	assert_eq!(api.heartbeat_calls.load(Ordering::SeqCst), 0);
	assert_eq!(ui.navigations().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_extend_clears_warning_until_next_warning_status() {
	let (monitor, _api, ui) = watchdog(
		SessionConfig::default(),
		vec![active(30.0), warning(4.0), warning(3.0)],
	);
	monitor.start().await;
	sleep(Duration::from_secs(61)).await;
	assert_eq!(monitor.phase(), SessionPhase::Warned);

	monitor.extend_session().await;
	assert_eq!(monitor.phase(), SessionPhase::Monitoring);
	assert!(!monitor.state().warning_shown);
	assert!(ui.events().contains(&Shown::Hidden));
	assert!(ui.events().contains(&Shown::Notice(Notice::extended())));

	// The server still says "warn" on the next poll
	sleep(Duration::from_secs(60)).await;
	assert_eq!(monitor.phase(), SessionPhase::Warned);
}

#[tokio::test(start_paused = true)]
async fn test_extend_failure_keeps_warning() {
	let (monitor, api, ui) = watchdog(SessionConfig::default(), vec![active(30.0), warning(2.0)]);
	api.extend_ok.store(false, Ordering::SeqCst);
	monitor.start().await;
	sleep(Duration::from_secs(61)).await;

	monitor.extend_session().await;

	assert_eq!(monitor.phase(), SessionPhase::Warned);
	assert!(monitor.state().warning_shown);
	let last_notice = ui.events().into_iter().rev().find_map(|event| match event {
		Shown::Notice(notice) => Some(notice),
		_ => None,
	});
	assert_eq!(last_notice.map(|n| n.kind), Some(NoticeKind::Error));
}

#[tokio::test(start_paused = true)]
async fn test_unauthenticated_heartbeat_expires() {
	let (monitor, api, ui) = watchdog(SessionConfig::default(), vec![active(30.0)]);
	api.heartbeat_authenticated.store(false, Ordering::SeqCst);
	monitor.start().await;

	sleep(Duration::from_secs(299)).await;
	assert_eq!(monitor.phase(), SessionPhase::Monitoring);

	sleep(Duration::from_secs(2)).await;
	assert_eq!(monitor.phase(), SessionPhase::Expired);

	sleep(Duration::from_secs(3)).await;
	assert_eq!(ui.navigations(), vec!["/session/logout-timeout".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_request_failures_keep_polling() {
	let (monitor, api, _ui) = watchdog(
		SessionConfig::default(),
		vec![active(30.0), None, None, active(27.0)],
	);
	monitor.start().await;

	sleep(Duration::from_secs(181)).await;

	assert_eq!(monitor.phase(), SessionPhase::Monitoring);
	assert_eq!(api.status_calls(), 4);
	assert_eq!(monitor.state().time_remaining_minutes, 27);
}

#[tokio::test(start_paused = true)]
async fn test_no_session_starts_nothing() {
	let (monitor, api, ui) = watchdog(
		SessionConfig::default(),
		vec![Some(SessionStatus::default())],
	);

	assert_eq!(monitor.start().await, SessionPhase::Terminated);
	sleep(Duration::from_secs(900)).await;

	assert_eq!(api.status_calls(), 1);
	assert_eq!(api.heartbeat_calls.load(Ordering::SeqCst), 0);
	assert!(ui.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_timers_and_hides_warning() {
	let (monitor, api, ui) = watchdog(SessionConfig::default(), vec![active(30.0), warning(4.0)]);
	monitor.start().await;
	sleep(Duration::from_secs(61)).await;

	monitor.stop();
	monitor.wait_terminated().await;

	assert_eq!(ui.events().last(), Some(&Shown::Hidden));
	assert!(!monitor.state().is_active);

	let calls = api.status_calls();
	sleep(Duration::from_secs(600)).await;
	assert_eq!(api.status_calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn test_logout_navigates_immediately() {
	let (monitor, _api, ui) = watchdog(SessionConfig::default(), vec![active(30.0), warning(4.0)]);
	monitor.start().await;
	sleep(Duration::from_secs(61)).await;

	monitor.logout();

	assert_eq!(ui.navigations(), vec!["/auth/logout".to_string()]);
	assert_eq!(monitor.phase(), SessionPhase::Terminated);
}

#[tokio::test(start_paused = true)]
async fn test_activity_refresh_is_rate_limited() {
	let config = SessionConfig::default().with_auto_extend(true);
	let (monitor, api, _ui) = watchdog(config, vec![active(30.0)]);
	monitor.start().await;

	assert!(monitor.record_activity(ActivityKind::Click));
	assert!(!monitor.record_activity(ActivityKind::Scroll));
	assert!(!monitor.record_activity(ActivityKind::PointerMove));

	sleep(Duration::from_secs(60)).await;
	assert!(monitor.record_activity(ActivityKind::KeyPress));

	sleep(Duration::from_millis(10)).await;
	assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_activity_ignored_without_auto_extend() {
	let (monitor, api, _ui) = watchdog(SessionConfig::default(), vec![active(30.0)]);
	monitor.start().await;

	assert!(!monitor.record_activity(ActivityKind::Click));
	sleep(Duration::from_millis(10)).await;
	assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 0);
}

fn warning_visible(events: &[Shown]) -> bool {
	events
		.iter()
		.rev()
		.find_map(|event| match event {
			Shown::Warning(_) => Some(true),
			Shown::Hidden => Some(false),
			_ => None,
		})
		.unwrap_or(false)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_status_and_heartbeat_leave_no_warning_after_expiry() {
	for _ in 0..200 {
		let (monitor, api, ui) = watchdog(SessionConfig::default(), vec![active(30.0), warning(4.0)]);
		api.heartbeat_authenticated.store(false, Ordering::SeqCst);
		monitor.start().await;

		let check = tokio::spawn({
			let monitor = monitor.clone();
			async move { monitor.check_session().await }
		});
		let heartbeat = tokio::spawn({
			let monitor = monitor.clone();
			async move { monitor.send_heartbeat().await }
		});
		check.await.unwrap();
		heartbeat.await.unwrap();

		assert_eq!(monitor.phase(), SessionPhase::Expired);
		assert!(!monitor.state().warning_shown);
		assert!(!warning_visible(&ui.events()));
		monitor.stop();
	}
}
