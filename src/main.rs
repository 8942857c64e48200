use std::env;
use std::sync::Arc;

use domiflash::config::AppConfig;
use domiflash::session::{ActivityKind, HttpSessionApi, LogSessionUi, SessionMonitor, SessionPhase};
use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() {
	env_logger::init();

	let mut config = AppConfig::from_env();

	// Parse command line arguments
	let args: Vec<String> = env::args().collect();
	if let Some(base_url) = args.get(1) {
		config.base_url = base_url.clone();
	}

	if !config.session_context {
		info!("No signed-in session context, watchdog disabled");
		return;
	}

	let api = match HttpSessionApi::new(&config.base_url) {
		Ok(api) => api,
		Err(e) => {
			error!("Failed to set up session client for {}: {}", config.base_url, e);
			return;
		}
	};

	let monitor = SessionMonitor::new(config.session.clone(), Arc::new(api), Arc::new(LogSessionUi));
	if monitor.start().await == SessionPhase::Terminated {
		return;
	}

	// Lines on stdin stand in for the warning buttons and page activity
	let commands = monitor.clone();
	tokio::spawn(async move {
		let mut lines = BufReader::new(tokio::io::stdin()).lines();
		while let Ok(Some(line)) = lines.next_line().await {
			match line.trim() {
				"extend" => commands.extend_session().await,
				"logout" => commands.logout(),
				"stop" => commands.stop(),
				"click" => {
					commands.record_activity(ActivityKind::Click);
				}
				"key" => {
					commands.record_activity(ActivityKind::KeyPress);
				}
				"scroll" => {
					commands.record_activity(ActivityKind::Scroll);
				}
				"move" => {
					commands.record_activity(ActivityKind::PointerMove);
				}
				"" => {}
				other => warn!("Unknown command: {}", other),
			}
		}
	});

	tokio::select! {
		_ = monitor.wait_terminated() => info!("Session watchdog finished"),
		_ = tokio::signal::ctrl_c() => {
			monitor.stop();
			info!("Interrupted, session watchdog stopped");
		}
	}
}
