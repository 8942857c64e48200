use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::Result;
use crate::offline::host::ClientHost;

const DEFAULT_TITLE: &str = "DomiFlash";
const DEFAULT_BODY: &str = "Your order has been updated";
const DEFAULT_URL: &str = "/";
const ICON: &str = "/static/img/brand/logo.png";
const BADGE: &str = "/static/img/brand/favicon.ico";
const VIBRATE: [u32; 3] = [200, 100, 200];

pub const ACTION_VIEW: &str = "view";
pub const ACTION_DISMISS: &str = "dismiss";

/// JSON body of a push message. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushPayload {
	pub title: Option<String>,
	pub body: Option<String>,
	pub url: Option<String>,
	#[serde(rename = "orderId")]
	pub order_id: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationData {
	pub url: String,
	#[serde(rename = "orderId")]
	pub order_id: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationAction {
	pub action: String,
	pub title: String,
	pub icon: String,
}

/// A system notification as handed to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
	pub title: String,
	pub body: String,
	pub icon: String,
	pub badge: String,
	pub vibrate: Vec<u32>,
	pub data: NotificationData,
	pub actions: Vec<NotificationAction>,
}

impl From<PushPayload> for Notification {
	fn from(payload: PushPayload) -> Self {
		Notification {
			title: payload.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
			body: payload.body.unwrap_or_else(|| DEFAULT_BODY.to_string()),
			icon: ICON.to_string(),
			badge: BADGE.to_string(),
			vibrate: VIBRATE.to_vec(),
			data: NotificationData {
				url: payload.url.unwrap_or_else(|| DEFAULT_URL.to_string()),
				order_id: payload.order_id,
			},
			actions: vec![
				NotificationAction {
					action: ACTION_VIEW.to_string(),
					title: "View order".to_string(),
					icon: "/static/icons/view.png".to_string(),
				},
				NotificationAction {
					action: ACTION_DISMISS.to_string(),
					title: "Close".to_string(),
					icon: "/static/icons/close.png".to_string(),
				},
			],
		}
	}
}

/// Build the notification for a push message. `None` for a push without data.
pub fn notification_for_push(data: Option<&[u8]>) -> Result<Option<Notification>> {
	let data = match data {
		Some(data) if !data.is_empty() => data,
		_ => return Ok(None),
	};

	let payload: PushPayload = serde_json::from_slice(data)?;
	debug!("Push received: {:?}", payload);
	Ok(Some(payload.into()))
}

/// What a notification click ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
	/// An open page already showed the target and was focused
	Focused(String),
	/// A new page was opened on the target
	Opened(String),
	/// Any action other than "view"
	Closed,
}

/// Handle a click on one of our notifications
pub async fn route_click(
	host: &dyn ClientHost,
	origin: &Url,
	action: Option<&str>,
	data: &NotificationData,
) -> Result<ClickOutcome> {
	if action != Some(ACTION_VIEW) {
		return Ok(ClickOutcome::Closed);
	}

	let target = origin.join(&data.url)?;
	for client in host.windows().await? {
		let same_page = Url::parse(&client.url).map_or(false, |url| url == target);
		if same_page {
			host.focus(&client.id).await?;
			info!("Focused existing window {} on {}", client.id, target);
			return Ok(ClickOutcome::Focused(client.id));
		}
	}

	host.open_window(target.as_str()).await?;
	info!("Opened new window on {}", target);
	Ok(ClickOutcome::Opened(target.to_string()))
}
