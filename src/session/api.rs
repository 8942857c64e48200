use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};

/// Body of `GET /session/status`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SessionStatus {
	#[serde(default)]
	pub authenticated: bool,
	#[serde(default)]
	pub is_expired: bool,
	#[serde(default)]
	pub needs_warning: bool,
	/// Minutes until forced logout, fractional
	#[serde(default)]
	pub time_until_timeout: Option<f64>,
}

impl SessionStatus {
	/// Remaining minutes rounded up for display
	pub fn minutes_remaining(&self) -> u64 {
		ceil_minutes(self.time_until_timeout.unwrap_or(0.0))
	}
}

pub fn ceil_minutes(minutes: f64) -> u64 {
	if minutes.is_finite() && minutes > 0.0 {
		minutes.ceil() as u64
	} else {
		0
	}
}

#[derive(Debug, Deserialize)]
struct SuccessReply {
	#[serde(default)]
	success: bool,
}

#[derive(Debug, Deserialize)]
struct HeartbeatReply {
	#[serde(default)]
	authenticated: bool,
}

/// Server endpoints the watchdog talks to
#[async_trait]
pub trait SessionApi: Send + Sync {
	async fn status(&self) -> Result<SessionStatus>;

	/// Returns the server's `success` flag
	async fn extend(&self) -> Result<bool>;

	/// Returns the server's `authenticated` flag
	async fn heartbeat(&self) -> Result<bool>;

	/// Silent refresh used by auto-extend, returns `success`
	async fn refresh(&self) -> Result<bool>;
}

/// `SessionApi` over HTTP, sharing one cookie jar across calls
pub struct HttpSessionApi {
	client: Client,
	base: Url,
}

impl HttpSessionApi {
	pub fn new(base_url: &str) -> Result<Self> {
		let base = Url::parse(base_url)?;
		let client = Client::builder().cookie_store(true).build()?;
		Ok(HttpSessionApi { client, base })
	}

	fn endpoint(&self, path: &str) -> Result<Url> {
		Ok(self.base.join(path)?)
	}

	async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
		let url = self.endpoint(path)?;
		let response = self.client.get(url).send().await?;
		Self::decode(response).await
	}

	async fn post_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
		let url = self.endpoint(path)?;
		let response = self
			.client
			.post(url)
			.header(reqwest::header::CONTENT_TYPE, "application/json")
			.send()
			.await?;
		Self::decode(response).await
	}

	// Session endpoints answer JSON even on 401, so the body wins over the status
	async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
		let status = response.status();
		let url = response.url().to_string();
		let bytes = response.bytes().await?;

		match serde_json::from_slice::<T>(&bytes) {
			Ok(value) => Ok(value),
			Err(_) if !status.is_success() => Err(Error::Status {
				status: status.as_u16(),
				url,
			}),
			Err(e) => Err(e.into()),
		}
	}
}

#[async_trait]
impl SessionApi for HttpSessionApi {
	async fn status(&self) -> Result<SessionStatus> {
		let status: SessionStatus = self.get_json("/session/status").await?;
		debug!("Session status: {:?}", status);
		Ok(status)
	}

	async fn extend(&self) -> Result<bool> {
		let reply: SuccessReply = self.post_json("/session/extend").await?;
		Ok(reply.success)
	}

	async fn heartbeat(&self) -> Result<bool> {
		let reply: HeartbeatReply = self.post_json("/session/heartbeat").await?;
		Ok(reply.authenticated)
	}

	async fn refresh(&self) -> Result<bool> {
		let reply: SuccessReply = self.post_json("/session/refresh").await?;
		Ok(reply.success)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_status_decodes_server_body() {
		let body = r#"{"authenticated":true,"is_expired":false,"needs_warning":true,"time_until_timeout":4.2,"user_id":7}"#;
		let status: SessionStatus = serde_json::from_str(body).unwrap();

		assert!(status.authenticated);
		assert!(status.needs_warning);
		assert_eq!(status.minutes_remaining(), 5);
	}

	#[test]
	fn test_unauthenticated_body_has_no_timing() {
		let status: SessionStatus = serde_json::from_str(r#"{"authenticated":false}"#).unwrap();

		assert!(!status.authenticated);
		assert_eq!(status.time_until_timeout, None);
		assert_eq!(status.minutes_remaining(), 0);
	}

	#[test]
	fn test_ceil_minutes_clamps() {
		assert_eq!(ceil_minutes(0.01), 1);
		assert_eq!(ceil_minutes(5.0), 5);
		assert_eq!(ceil_minutes(-3.0), 0);
		assert_eq!(ceil_minutes(f64::NAN), 0);
	}
}
