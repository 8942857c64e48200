// Export offline controller modules
pub mod cache;
pub mod classify;
pub mod host;
pub mod http;
pub mod push;
pub mod strategy;
pub mod sync;
pub mod worker;

// Re-export main types
pub use cache::{CacheStore, MemoryCacheStore};
pub use classify::{classify, Route, Strategy};
pub use host::{ClientHost, LogHost, WindowClient};
pub use http::{FetchRequest, Fetcher, HttpFetcher, HttpResponse, RequestMode};
pub use push::{ClickOutcome, Notification, NotificationData, PushPayload};
pub use strategy::CachePolicy;
pub use sync::{
	JsonFileOrderQueue, MemoryOrderQueue, OfflineOrder, OrderOutbox, OrderQueue, SubmitOutcome,
	SyncReport, ORDER_SYNC_TAG,
};
pub use worker::{OfflineWorker, WorkerConfig, WorkerState};
