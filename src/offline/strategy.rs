use log::{debug, warn};

use crate::error::{Error, Result};
use crate::offline::cache::CacheStore;
use crate::offline::classify::Strategy;
use crate::offline::http::{FetchRequest, Fetcher, HttpResponse};

/// Where responses come from and where fresh ones go
pub struct CachePolicy<'a> {
	pub store: &'a dyn CacheStore,
	pub fetcher: &'a dyn Fetcher,
	/// Generation receiving writes
	pub generation: &'a str,
	/// Cache key of the pre-cached offline page
	pub offline_key: &'a str,
}

impl<'a> CachePolicy<'a> {
	pub async fn resolve(&self, strategy: Strategy, request: &FetchRequest) -> Result<HttpResponse> {
		match strategy {
			Strategy::CacheFirst => self.cache_first(request).await,
			Strategy::NetworkFirst => self.network_first(request).await,
			Strategy::NetworkFirstWithFallback => self.network_first_with_fallback(request).await,
		}
	}

	/// Serve from cache when present, otherwise fetch and keep a copy of 2xx answers
	pub async fn cache_first(&self, request: &FetchRequest) -> Result<HttpResponse> {
		let key = request.cache_key();
		if let Some(cached) = self.cached(&key).await {
			debug!("Served from cache: {}", key);
			return Ok(cached);
		}

		let response = match self.fetcher.fetch(request).await {
			Ok(response) => response,
			Err(e) => {
				warn!("Cache-first fetch failed for {}: {}", request.url, e);
				return Err(e);
			}
		};
		self.remember(&key, &response).await;
		Ok(response)
	}

	/// Always try the network, fall back to the cache when it is unreachable
	pub async fn network_first(&self, request: &FetchRequest) -> Result<HttpResponse> {
		let key = request.cache_key();
		match self.fetcher.fetch(request).await {
			Ok(response) => {
				self.remember(&key, &response).await;
				Ok(response)
			}
			Err(e) => {
				debug!("Network failed for {} ({}), trying cache", key, e);
				match self.cached(&key).await {
					Some(cached) => Ok(cached),
					None => Err(Error::NoCachedResponse {
						url: request.url.to_string(),
					}),
				}
			}
		}
	}

	/// Network-first, then the offline page for navigations
	pub async fn network_first_with_fallback(&self, request: &FetchRequest) -> Result<HttpResponse> {
		match self.network_first(request).await {
			Err(Error::NoCachedResponse { url }) if request.is_navigation() => {
				match self.cached(self.offline_key).await {
					Some(page) => {
						debug!("Serving offline page for {}", url);
						Ok(page)
					}
					None => Err(Error::NoCachedResponse { url }),
				}
			}
			other => other,
		}
	}

	async fn cached(&self, key: &str) -> Option<HttpResponse> {
		match self.store.lookup(key).await {
			Ok(hit) => hit,
			Err(e) => {
				warn!("Cache read failed for {}: {}", key, e);
				None
			}
		}
	}

	async fn remember(&self, key: &str, response: &HttpResponse) {
		if !response.ok() {
			return;
		}
		if let Err(e) = self.store.put(self.generation, key, response.clone()).await {
			warn!("Cache write failed for {}: {}", key, e);
		}
	}
}
