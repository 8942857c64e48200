use async_trait::async_trait;
use log::info;

use crate::error::Result;
use crate::offline::push::Notification;

/// A page (tab) controlled by the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowClient {
	pub id: String,
	/// Absolute URL currently shown
	pub url: String,
}

/// The runtime hosting the worker: open pages and system notifications
#[async_trait]
pub trait ClientHost: Send + Sync {
	/// Take control of every open page without a reload
	async fn claim(&self) -> Result<()>;

	async fn windows(&self) -> Result<Vec<WindowClient>>;

	async fn focus(&self, client_id: &str) -> Result<()>;

	async fn open_window(&self, url: &str) -> Result<()>;

	async fn show_notification(&self, notification: &Notification) -> Result<()>;
}

/// Host without pages, which only logs what it is asked to do
#[derive(Debug, Default)]
pub struct LogHost;

#[async_trait]
impl ClientHost for LogHost {
	async fn claim(&self) -> Result<()> {
		info!("Claimed all clients");
		Ok(())
	}

	async fn windows(&self) -> Result<Vec<WindowClient>> {
		Ok(Vec::new())
	}

	async fn focus(&self, client_id: &str) -> Result<()> {
		info!("Focus client {}", client_id);
		Ok(())
	}

	async fn open_window(&self, url: &str) -> Result<()> {
		info!("Open window {}", url);
		Ok(())
	}

	async fn show_notification(&self, notification: &Notification) -> Result<()> {
		info!("[NOTIFICATION] {}: {}", notification.title, notification.body);
		Ok(())
	}
}
