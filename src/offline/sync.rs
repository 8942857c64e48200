use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use url::Url;

use crate::error::{Error, Result};
use crate::offline::http::{FetchRequest, Fetcher, HttpResponse};

/// Background-sync tag for replaying queued orders
pub const ORDER_SYNC_TAG: &str = "background-sync-orders";

/// An order submitted while offline, waiting for replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineOrder {
	pub id: String,
	/// Body POSTed to the order endpoint, unchanged
	pub payload: Value,
	pub queued_at: DateTime<Utc>,
}

impl OfflineOrder {
	/// The payload must carry an `id` (string or number)
	pub fn from_payload(payload: Value) -> Result<Self> {
		let id = match payload.get("id") {
			Some(Value::String(id)) if !id.is_empty() => id.clone(),
			Some(Value::Number(id)) => id.to_string(),
			_ => return Err(Error::Decode("order payload has no id".to_string())),
		};

		Ok(OfflineOrder {
			id,
			payload,
			queued_at: Utc::now(),
		})
	}
}

/// Durable storage for offline orders
#[async_trait]
pub trait OrderQueue: Send + Sync {
	/// Oldest first
	async fn pending(&self) -> Result<Vec<OfflineOrder>>;

	/// Queue an order, replacing a queued order with the same id
	async fn enqueue(&self, order: OfflineOrder) -> Result<()>;

	/// Returns false if no such order was queued
	async fn remove(&self, id: &str) -> Result<bool>;
}

fn upsert(orders: &mut Vec<OfflineOrder>, order: OfflineOrder) {
	match orders.iter_mut().find(|queued| queued.id == order.id) {
		Some(queued) => *queued = order,
		None => orders.push(order),
	}
}

#[derive(Default)]
pub struct MemoryOrderQueue {
	orders: Mutex<Vec<OfflineOrder>>,
}

impl MemoryOrderQueue {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl OrderQueue for MemoryOrderQueue {
	async fn pending(&self) -> Result<Vec<OfflineOrder>> {
		Ok(self.orders.lock().await.clone())
	}

	async fn enqueue(&self, order: OfflineOrder) -> Result<()> {
		upsert(&mut *self.orders.lock().await, order);
		Ok(())
	}

	async fn remove(&self, id: &str) -> Result<bool> {
		let mut orders = self.orders.lock().await;
		let before = orders.len();
		orders.retain(|order| order.id != id);
		Ok(orders.len() != before)
	}
}

#[derive(Default, Serialize, Deserialize)]
struct QueueFile {
	orders: Vec<OfflineOrder>,
}

/// Order queue persisted as `{ "orders": [...] }` in a JSON file
pub struct JsonFileOrderQueue {
	path: PathBuf,
	// Serialises read-modify-write cycles within this process
	guard: Mutex<()>,
}

impl JsonFileOrderQueue {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		JsonFileOrderQueue {
			path: path.into(),
			guard: Mutex::new(()),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	async fn read(&self) -> Result<QueueFile> {
		if !tokio::fs::try_exists(&self.path).await? {
			return Ok(QueueFile::default());
		}
		let raw = tokio::fs::read(&self.path).await?;
		if raw.is_empty() {
			return Ok(QueueFile::default());
		}
		serde_json::from_slice(&raw)
			.map_err(|e| Error::Storage(format!("corrupt order queue {}: {}", self.path.display(), e)))
	}

	async fn write(&self, file: &QueueFile) -> Result<()> {
		let json = serde_json::to_vec_pretty(file)?;
		let tmp = self.path.with_extension("tmp");
		tokio::fs::write(&tmp, json).await?;
		tokio::fs::rename(&tmp, &self.path).await?;
		Ok(())
	}
}

#[async_trait]
impl OrderQueue for JsonFileOrderQueue {
	async fn pending(&self) -> Result<Vec<OfflineOrder>> {
		let _guard = self.guard.lock().await;
		Ok(self.read().await?.orders)
	}

	async fn enqueue(&self, order: OfflineOrder) -> Result<()> {
		let _guard = self.guard.lock().await;
		let mut file = self.read().await?;
		upsert(&mut file.orders, order);
		self.write(&file).await
	}

	async fn remove(&self, id: &str) -> Result<bool> {
		let _guard = self.guard.lock().await;
		let mut file = self.read().await?;
		let before = file.orders.len();
		file.orders.retain(|order| order.id != id);
		if file.orders.len() == before {
			return Ok(false);
		}
		self.write(&file).await?;
		Ok(true)
	}
}

/// Result of one replay pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
	pub delivered: Vec<String>,
	/// Still queued for the next sync
	pub pending: Vec<String>,
}

/// POST every queued order; only confirmed (2xx) orders leave the queue.
/// Delivery is at-least-once.
pub async fn replay_orders(
	queue: &dyn OrderQueue,
	fetcher: &dyn Fetcher,
	endpoint: &Url,
) -> Result<SyncReport> {
	let orders = queue.pending().await?;
	info!("Processing {} offline order(s)", orders.len());

	let mut report = SyncReport::default();
	for order in orders {
		let request = FetchRequest::post_json(endpoint.clone(), &order.payload)?;
		match fetcher.fetch(&request).await {
			Ok(response) if response.ok() => match queue.remove(&order.id).await {
				Ok(_) => {
					info!("Offline order {} delivered", order.id);
					report.delivered.push(order.id);
				}
				Err(e) => {
					// Still queued, so the next sync sends it again
					error!("Offline order {} delivered but not dequeued: {}", order.id, e);
					report.pending.push(order.id);
				}
			},
			Ok(response) => {
				warn!(
					"Offline order {} rejected with HTTP {}, keeping it queued",
					order.id, response.status
				);
				report.pending.push(order.id);
			}
			Err(e) => {
				error!("Failed to deliver offline order {}: {}", order.id, e);
				report.pending.push(order.id);
			}
		}
	}

	Ok(report)
}

/// Outcome of submitting an order
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
	/// The server answered (not necessarily with success)
	Sent(HttpResponse),
	/// No connectivity, the order waits for background sync
	Queued(OfflineOrder),
}

/// Write path for orders: submit now, or queue for replay when offline
pub struct OrderOutbox {
	queue: Arc<dyn OrderQueue>,
	fetcher: Arc<dyn Fetcher>,
	endpoint: Url,
}

impl OrderOutbox {
	pub fn new(queue: Arc<dyn OrderQueue>, fetcher: Arc<dyn Fetcher>, endpoint: Url) -> Self {
		OrderOutbox {
			queue,
			fetcher,
			endpoint,
		}
	}

	pub async fn submit(&self, payload: Value) -> Result<SubmitOutcome> {
		let order = OfflineOrder::from_payload(payload)?;
		let request = FetchRequest::post_json(self.endpoint.clone(), &order.payload)?;

		match self.fetcher.fetch(&request).await {
			Ok(response) => Ok(SubmitOutcome::Sent(response)),
			Err(e) if e.is_network() => {
				warn!("Offline, queueing order {} for background sync", order.id);
				self.queue.enqueue(order.clone()).await?;
				Ok(SubmitOutcome::Queued(order))
			}
			Err(e) => Err(e),
		}
	}

	/// Replay everything queued so far
	pub async fn flush(&self) -> Result<SyncReport> {
		replay_orders(self.queue.as_ref(), self.fetcher.as_ref(), &self.endpoint).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use serde_json::json;
	use std::sync::Mutex as StdMutex;

	/// Memory queue whose `remove` fails for one id
	struct StuckQueue {
		inner: MemoryOrderQueue,
		stuck: &'static str,
	}

	#[async_trait]
	impl OrderQueue for StuckQueue {
		async fn pending(&self) -> Result<Vec<OfflineOrder>> {
			self.inner.pending().await
		}

		async fn enqueue(&self, order: OfflineOrder) -> Result<()> {
			self.inner.enqueue(order).await
		}

		async fn remove(&self, id: &str) -> Result<bool> {
			if id == self.stuck {
				return Err(Error::Storage("disk full".to_string()));
			}
			self.inner.remove(id).await
		}
	}

	/// Accepts every order and records the ids it saw
	#[derive(Default)]
	struct AcceptAll {
		posted: StdMutex<Vec<String>>,
	}

	#[async_trait]
	impl Fetcher for AcceptAll {
		async fn fetch(&self, request: &FetchRequest) -> Result<HttpResponse> {
			let body: Value = serde_json::from_slice(request.body.as_deref().unwrap_or(b"{}"))?;
			let id = body["id"].as_str().unwrap_or_default().to_string();
			self.posted.lock().unwrap().push(id);
			Ok(HttpResponse::new(201, "{}"))
		}
	}

	#[tokio::test]
	async fn test_replay_continues_when_dequeue_fails() {
		let queue = StuckQueue {
			inner: MemoryOrderQueue::new(),
			stuck: "a",
		};
		for id in ["a", "b", "c"] {
			queue
				.enqueue(OfflineOrder::from_payload(json!({ "id": id })).unwrap())
				.await
				.unwrap();
		}
		let network = AcceptAll::default();
		let endpoint = Url::parse("https://domiflash.test/api/orders").unwrap();

		let report = replay_orders(&queue, &network, &endpoint).await.unwrap();

		assert_eq!(*network.posted.lock().unwrap(), vec!["a", "b", "c"]);
		assert_eq!(report.delivered, vec!["b".to_string(), "c".to_string()]);
		assert_eq!(report.pending, vec!["a".to_string()]);
		let left: Vec<String> = queue
			.pending()
			.await
			.unwrap()
			.into_iter()
			.map(|order| order.id)
			.collect();
		assert_eq!(left, vec!["a".to_string()]);
	}

	#[test]
	fn test_order_needs_an_id() {
		assert_eq!(
			OfflineOrder::from_payload(json!({ "id": 17, "total": 32000 }))
				.unwrap()
				.id,
			"17"
		);
		assert!(OfflineOrder::from_payload(json!({ "total": 32000 })).is_err());
		assert!(OfflineOrder::from_payload(json!({ "id": "" })).is_err());
	}

	#[tokio::test]
	async fn test_memory_queue_replaces_same_id() {
		let queue = MemoryOrderQueue::new();
		queue
			.enqueue(OfflineOrder::from_payload(json!({ "id": "a", "qty": 1 })).unwrap())
			.await
			.unwrap();
		queue
			.enqueue(OfflineOrder::from_payload(json!({ "id": "a", "qty": 2 })).unwrap())
			.await
			.unwrap();

		let pending = queue.pending().await.unwrap();
		assert_eq!(pending.len(), 1);
		assert_eq!(pending[0].payload["qty"], 2);
		assert!(queue.remove("a").await.unwrap());
		assert!(!queue.remove("a").await.unwrap());
	}

	#[tokio::test]
	async fn test_file_queue_persists() {
		let path = std::env::temp_dir().join(format!(
			"domiflash-orders-{}-{}.json",
			std::process::id(),
			Utc::now().timestamp_nanos_opt().unwrap_or_default()
		));

		let queue = JsonFileOrderQueue::new(&path);
		assert!(queue.pending().await.unwrap().is_empty());

		queue
			.enqueue(OfflineOrder::from_payload(json!({ "id": "o-1" })).unwrap())
			.await
			.unwrap();
		queue
			.enqueue(OfflineOrder::from_payload(json!({ "id": "o-2" })).unwrap())
			.await
			.unwrap();
		queue.remove("o-1").await.unwrap();

		let reopened = JsonFileOrderQueue::new(&path);
		let ids: Vec<String> = reopened
			.pending()
			.await
			.unwrap()
			.into_iter()
			.map(|order| order.id)
			.collect();
		assert_eq!(ids, vec!["o-2".to_string()]);

		tokio::fs::remove_file(&path).await.unwrap();
	}
}
