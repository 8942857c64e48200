use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::try_join_all;
use log::{debug, error, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::offline::cache::CacheStore;
use crate::offline::classify::{classify, Route};
use crate::offline::host::ClientHost;
use crate::offline::http::{cache_key, FetchRequest, Fetcher, HttpResponse};
use crate::offline::push::{self, ClickOutcome, NotificationData};
use crate::offline::strategy::CachePolicy;
use crate::offline::sync::{replay_orders, OrderQueue, SyncReport, ORDER_SYNC_TAG};

/// Offline controller settings
#[derive(Debug, Clone)]
pub struct WorkerConfig {
	/// Cache generation name. Bumping it invalidates every older generation.
	pub cache_name: String,
	pub offline_url: String,
	/// Resources cached at install, all or nothing
	pub manifest: Vec<String>,
	pub orders_endpoint: String,
}

impl Default for WorkerConfig {
	fn default() -> Self {
		WorkerConfig {
			cache_name: "domiflash-v1.0.0".to_string(),
			offline_url: "/offline".to_string(),
			manifest: [
				"/",
				"/static/css/tailwind.min.css",
				"/static/js/main.js",
				"/static/img/brand/logo.png",
				"/static/img/brand/favicon.ico",
				"/static/js/tailwind.config.js",
				"/offline",
			]
			.iter()
			.map(|path| path.to_string())
			.collect(),
			orders_endpoint: "/api/orders".to_string(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
	Installing,
	/// Installed, waiting to take over
	Waiting,
	Active,
	/// Install failed, the previous worker stays in charge
	Redundant,
}

/// The offline cache controller
pub struct OfflineWorker {
	config: WorkerConfig,
	origin: Url,
	store: Arc<dyn CacheStore>,
	fetcher: Arc<dyn Fetcher>,
	host: Arc<dyn ClientHost>,
	orders: Arc<dyn OrderQueue>,
	state: Mutex<WorkerState>,
	skip_waiting: AtomicBool,
}

impl OfflineWorker {
	pub fn new(
		config: WorkerConfig,
		origin: Url,
		store: Arc<dyn CacheStore>,
		fetcher: Arc<dyn Fetcher>,
		host: Arc<dyn ClientHost>,
		orders: Arc<dyn OrderQueue>,
	) -> Self {
		OfflineWorker {
			config,
			origin,
			store,
			fetcher,
			host,
			orders,
			state: Mutex::new(WorkerState::Installing),
			skip_waiting: AtomicBool::new(false),
		}
	}

	pub fn state(&self) -> WorkerState {
		*lock(&self.state)
	}

	/// Whether install asked to supersede the previous worker right away
	pub fn skip_waiting_requested(&self) -> bool {
		self.skip_waiting.load(Ordering::SeqCst)
	}

	pub fn config(&self) -> &WorkerConfig {
		&self.config
	}

	fn set_state(&self, state: WorkerState) {
		let mut current = lock(&self.state);
		if *current != state {
			debug!("Offline worker: {:?} -> {:?}", *current, state);
			*current = state;
		}
	}

	/// Cache the manifest into the current generation. Nothing is written
	/// unless every resource was fetched with a 2xx.
	pub async fn install(&self) -> Result<()> {
		info!("Offline worker installing ({})", self.config.cache_name);
		self.set_state(WorkerState::Installing);

		let fetches = self.config.manifest.iter().map(|path| self.precache(path));
		let entries = match try_join_all(fetches).await {
			Ok(entries) => entries,
			Err(e) => {
				error!("Offline worker installation failed: {}", e);
				self.set_state(WorkerState::Redundant);
				return Err(e);
			}
		};

		info!("Caching {} app resources", entries.len());
		if let Err(e) = self.store.put_all(&self.config.cache_name, entries).await {
			error!("Offline worker installation failed: {}", e);
			self.set_state(WorkerState::Redundant);
			return Err(e);
		}

		self.skip_waiting.store(true, Ordering::SeqCst);
		self.set_state(WorkerState::Waiting);
		info!("Offline worker installation complete");
		Ok(())
	}

	async fn precache(&self, path: &str) -> Result<(String, HttpResponse)> {
		let aborted = |reason: String| Error::InstallAborted {
			url: path.to_string(),
			reason,
		};

		let url = self.origin.join(path).map_err(|e| aborted(e.to_string()))?;
		let response = self
			.fetcher
			.fetch(&FetchRequest::get(url.clone()))
			.await
			.map_err(|e| aborted(e.to_string()))?;

		if !response.ok() {
			return Err(aborted(format!("HTTP {}", response.status)));
		}
		Ok((cache_key(&url), response))
	}

	/// Pick up a worker installed by an earlier run: active again if its
	/// generation is still in the store.
	pub async fn resume(&self) -> Result<bool> {
		let installed = self
			.store
			.generations()
			.await?
			.iter()
			.any(|name| *name == self.config.cache_name);

		if installed {
			self.set_state(WorkerState::Active);
			info!("Offline worker resumed with cache {}", self.config.cache_name);
		}
		Ok(installed)
	}

	/// Purge every other cache generation and take control of open pages.
	/// Returns the purged generation names.
	pub async fn activate(&self) -> Result<Vec<String>> {
		let state = self.state();
		if state != WorkerState::Waiting {
			warn!("Offline worker cannot activate from {:?}", state);
			return Ok(Vec::new());
		}

		info!("Offline worker activating");
		let mut purged = Vec::new();
		for name in self.store.generations().await? {
			if name != self.config.cache_name {
				info!("Deleting old cache: {}", name);
				self.store.delete_generation(&name).await?;
				purged.push(name);
			}
		}

		self.host.claim().await?;
		self.set_state(WorkerState::Active);
		info!("Offline worker activation complete");
		Ok(purged)
	}

	/// Answer an intercepted request. `Ok(None)` means the request is not
	/// ours and goes to the network untouched.
	pub async fn handle_fetch(&self, request: &FetchRequest) -> Result<Option<HttpResponse>> {
		if self.state() != WorkerState::Active {
			return Ok(None);
		}

		let strategy = match classify(&self.origin, request) {
			Route::PassThrough => return Ok(None),
			Route::Handle(strategy) => strategy,
		};
		debug!("{:?} for {}", strategy, request.url);

		let policy = CachePolicy {
			store: self.store.as_ref(),
			fetcher: self.fetcher.as_ref(),
			generation: &self.config.cache_name,
			offline_key: &self.config.offline_url,
		};
		policy.resolve(strategy, request).await.map(Some)
	}

	/// Background sync. `Ok(None)` for tags this worker does not handle.
	pub async fn handle_sync(&self, tag: &str) -> Result<Option<SyncReport>> {
		if tag != ORDER_SYNC_TAG {
			debug!("Ignoring sync tag {}", tag);
			return Ok(None);
		}

		info!("Processing background sync for orders");
		let endpoint = self.origin.join(&self.config.orders_endpoint)?;
		let report = replay_orders(self.orders.as_ref(), self.fetcher.as_ref(), &endpoint).await?;
		Ok(Some(report))
	}

	/// Show a notification for a push message. Returns false for an empty push.
	pub async fn handle_push(&self, data: Option<&[u8]>) -> Result<bool> {
		match push::notification_for_push(data)? {
			Some(notification) => {
				self.host.show_notification(&notification).await?;
				Ok(true)
			}
			None => Ok(false),
		}
	}

	pub async fn handle_notification_click(
		&self,
		action: Option<&str>,
		data: &NotificationData,
	) -> Result<ClickOutcome> {
		push::route_click(self.host.as_ref(), &self.origin, action, data).await
	}
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
