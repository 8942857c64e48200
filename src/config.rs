use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use log::warn;

use crate::session::SessionConfig;

const DEFAULT_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_ORDER_QUEUE: &str = "offline_orders.json";
const DEFAULT_CACHE_SNAPSHOT: &str = "offline_cache.json";

/// Settings resolved once at startup from the hosting environment
#[derive(Debug, Clone)]
pub struct AppConfig {
	pub base_url: String,
	/// A signed-in page hosts the watchdog. Without it the watchdog never starts.
	pub session_context: bool,
	pub session: SessionConfig,
	pub order_queue_path: PathBuf,
	pub cache_snapshot_path: PathBuf,
}

impl Default for AppConfig {
	fn default() -> Self {
		AppConfig {
			base_url: DEFAULT_BASE_URL.to_string(),
			session_context: true,
			session: SessionConfig::default(),
			order_queue_path: PathBuf::from(DEFAULT_ORDER_QUEUE),
			cache_snapshot_path: PathBuf::from(DEFAULT_CACHE_SNAPSHOT),
		}
	}
}

impl AppConfig {
	/// Read `DOMIFLASH_*` variables, keeping defaults for anything unset or invalid
	pub fn from_env() -> Self {
		Self::from_lookup(|key| env::var(key).ok())
	}

	pub fn from_lookup<F>(lookup: F) -> Self
	where
		F: Fn(&str) -> Option<String>,
	{
		let defaults = AppConfig::default();
		let base = &defaults.session;

		let session = base
			.clone()
			.with_check_interval(
				parse_or(&lookup, "DOMIFLASH_CHECK_INTERVAL_MS", None)
					.map(Duration::from_millis)
					.unwrap_or(base.check_interval),
			)
			.with_heartbeat_interval(
				parse_or(&lookup, "DOMIFLASH_HEARTBEAT_INTERVAL_MS", None)
					.map(Duration::from_millis)
					.unwrap_or(base.heartbeat_interval),
			)
			.with_warning_threshold(
				parse_or(&lookup, "DOMIFLASH_WARNING_MINUTES", None)
					.unwrap_or(base.warning_threshold_minutes),
			)
			.with_auto_extend(
				parse_or(&lookup, "DOMIFLASH_AUTO_EXTEND", None).unwrap_or(base.auto_extend),
			)
			.with_modal(parse_or(&lookup, "DOMIFLASH_SHOW_MODAL", None).unwrap_or(base.show_modal));

		AppConfig {
			base_url: lookup("DOMIFLASH_BASE_URL").unwrap_or(defaults.base_url),
			session_context: parse_or(&lookup, "DOMIFLASH_SESSION_CONTEXT", Some(true))
				.unwrap_or(true),
			session,
			order_queue_path: lookup("DOMIFLASH_ORDER_QUEUE")
				.map(PathBuf::from)
				.unwrap_or(defaults.order_queue_path),
			cache_snapshot_path: lookup("DOMIFLASH_CACHE_SNAPSHOT")
				.map(PathBuf::from)
				.unwrap_or(defaults.cache_snapshot_path),
		}
	}
}

// Unset -> `default`; invalid -> warning and `default`
fn parse_or<F, T>(lookup: &F, key: &str, default: Option<T>) -> Option<T>
where
	F: Fn(&str) -> Option<String>,
	T: FromStr,
{
	match lookup(key) {
		Some(raw) => match raw.trim().parse::<T>() {
			Ok(value) => Some(value),
			Err(_) => {
				warn!("Ignoring invalid {}={:?}", key, raw);
				default
			}
		},
		None => default,
	}
}
