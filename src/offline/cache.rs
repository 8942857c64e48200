use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::offline::http::HttpResponse;

/// Named cache generations holding responses keyed by origin-relative URL
#[async_trait]
pub trait CacheStore: Send + Sync {
	/// Names of every generation present
	async fn generations(&self) -> Result<Vec<String>>;

	/// Returns false if the generation did not exist
	async fn delete_generation(&self, name: &str) -> Result<bool>;

	/// Store one entry, creating the generation if needed. Last write wins.
	async fn put(&self, generation: &str, key: &str, response: HttpResponse) -> Result<()>;

	/// Store every entry or none of them
	async fn put_all(&self, generation: &str, entries: Vec<(String, HttpResponse)>) -> Result<()>;

	async fn get(&self, generation: &str, key: &str) -> Result<Option<HttpResponse>>;

	/// First match across all generations
	async fn lookup(&self, key: &str) -> Result<Option<HttpResponse>>;
}

type Generations = BTreeMap<String, BTreeMap<String, HttpResponse>>;

#[derive(Serialize, Deserialize)]
struct Snapshot {
	saved_at: DateTime<Utc>,
	generations: Generations,
}

/// In-process cache store that can be snapshotted to a JSON file
#[derive(Default)]
pub struct MemoryCacheStore {
	generations: RwLock<Generations>,
}

impl MemoryCacheStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Restore a store written by `save`
	pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let raw = tokio::fs::read(path).await?;
		let snapshot: Snapshot = serde_json::from_slice(&raw)?;

		info!(
			"Loaded {} cache generation(s) from {} (saved {})",
			snapshot.generations.len(),
			path.display(),
			snapshot.saved_at
		);
		Ok(MemoryCacheStore {
			generations: RwLock::new(snapshot.generations),
		})
	}

	/// Like `load`, but starts empty when the file does not exist yet
	pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
		match tokio::fs::try_exists(path.as_ref()).await? {
			true => Self::load(path).await,
			false => Ok(Self::new()),
		}
	}

	/// Write the whole store to `path`
	pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
		let snapshot = Snapshot {
			saved_at: Utc::now(),
			generations: self.generations.read().await.clone(),
		};
		let json = serde_json::to_vec_pretty(&snapshot)?;
		tokio::fs::write(path.as_ref(), json).await?;

		debug!("Cache snapshot written to {}", path.as_ref().display());
		Ok(())
	}

	pub async fn len(&self, generation: &str) -> usize {
		self.generations
			.read()
			.await
			.get(generation)
			.map_or(0, |entries| entries.len())
	}
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
	async fn generations(&self) -> Result<Vec<String>> {
		Ok(self.generations.read().await.keys().cloned().collect())
	}

	async fn delete_generation(&self, name: &str) -> Result<bool> {
		Ok(self.generations.write().await.remove(name).is_some())
	}

	async fn put(&self, generation: &str, key: &str, response: HttpResponse) -> Result<()> {
		self.generations
			.write()
			.await
			.entry(generation.to_string())
			.or_default()
			.insert(key.to_string(), response);
		Ok(())
	}

	async fn put_all(&self, generation: &str, entries: Vec<(String, HttpResponse)>) -> Result<()> {
		// Single write lock, so readers never see half of the batch
		let mut generations = self.generations.write().await;
		generations
			.entry(generation.to_string())
			.or_default()
			.extend(entries);
		Ok(())
	}

	async fn get(&self, generation: &str, key: &str) -> Result<Option<HttpResponse>> {
		Ok(self
			.generations
			.read()
			.await
			.get(generation)
			.and_then(|entries| entries.get(key))
			.cloned())
	}

	async fn lookup(&self, key: &str) -> Result<Option<HttpResponse>> {
		Ok(self
			.generations
			.read()
			.await
			.values()
			.find_map(|entries| entries.get(key))
			.cloned())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_put_and_lookup() {
		let store = MemoryCacheStore::new();
		store
			.put("v1", "/menu", HttpResponse::new(200, "old"))
			.await
			.unwrap();
		store
			.put("v1", "/menu", HttpResponse::new(200, "new"))
			.await
			.unwrap();

		let hit = store.lookup("/menu").await.unwrap().unwrap();
		assert_eq!(hit.text(), "new");
		assert_eq!(store.len("v1").await, 1);
		assert!(store.lookup("/missing").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_delete_generation() {
		let store = MemoryCacheStore::new();
		store.put("v0", "/", HttpResponse::new(200, "home")).await.unwrap();

		assert!(store.delete_generation("v0").await.unwrap());
		assert!(!store.delete_generation("v0").await.unwrap());
		assert!(store.generations().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_snapshot_survives_restart() {
		let path = std::env::temp_dir().join(format!(
			"domiflash-cache-{}-{}.json",
			std::process::id(),
			Utc::now().timestamp_nanos_opt().unwrap_or_default()
		));

		let store = MemoryCacheStore::new();
		store
			.put("domiflash-v1.0.0", "/offline", HttpResponse::new(200, "<h1>Offline</h1>"))
			.await
			.unwrap();
		store.save(&path).await.unwrap();

		let restored = MemoryCacheStore::load_or_default(&path).await.unwrap();
		let page = restored
			.get("domiflash-v1.0.0", "/offline")
			.await
			.unwrap()
			.unwrap();
		assert_eq!(page.text(), "<h1>Offline</h1>");

		tokio::fs::remove_file(&path).await.unwrap();
		let empty = MemoryCacheStore::load_or_default(&path).await.unwrap();
		assert!(empty.generations().await.unwrap().is_empty());
	}
}
