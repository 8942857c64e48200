use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use reqwest::header::{HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// How the page issued a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
	/// Top-level page navigation
	Navigate,
	/// Subresource or script-issued request
	Subresource,
}

/// An intercepted request
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
	pub url: Url,
	pub method: String,
	pub mode: RequestMode,
	pub headers: Vec<(String, String)>,
	pub body: Option<Vec<u8>>,
}

impl FetchRequest {
	pub fn get(url: Url) -> Self {
		FetchRequest {
			url,
			method: "GET".to_string(),
			mode: RequestMode::Subresource,
			headers: Vec::new(),
			body: None,
		}
	}

	pub fn navigate(url: Url) -> Self {
		FetchRequest {
			mode: RequestMode::Navigate,
			..FetchRequest::get(url)
		}
	}

	pub fn post_json(url: Url, payload: &serde_json::Value) -> Result<Self> {
		Ok(FetchRequest {
			url,
			method: "POST".to_string(),
			mode: RequestMode::Subresource,
			headers: vec![(CONTENT_TYPE.to_string(), "application/json".to_string())],
			body: Some(serde_json::to_vec(payload)?),
		})
	}

	pub fn with_header(mut self, name: &str, value: &str) -> Self {
		self.headers.push((name.to_string(), value.to_string()));
		self
	}

	/// Case-insensitive header lookup
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}

	pub fn is_navigation(&self) -> bool {
		self.mode == RequestMode::Navigate
	}

	/// Origin-relative key used for cache entries
	pub fn cache_key(&self) -> String {
		cache_key(&self.url)
	}
}

pub fn cache_key(url: &Url) -> String {
	match url.query() {
		Some(query) => format!("{}?{}", url.path(), query),
		None => url.path().to_string(),
	}
}

/// A fully buffered response, as stored in the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
	pub status: u16,
	pub headers: Vec<(String, String)>,
	#[serde(with = "body_base64")]
	pub body: Vec<u8>,
	pub fetched_at: DateTime<Utc>,
}

impl HttpResponse {
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		HttpResponse {
			status,
			headers: Vec::new(),
			body: body.into(),
			fetched_at: Utc::now(),
		}
	}

	pub fn with_header(mut self, name: &str, value: &str) -> Self {
		self.headers.push((name.to_string(), value.to_string()));
		self
	}

	/// 2xx
	pub fn ok(&self) -> bool {
		(200..300).contains(&self.status)
	}

	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

mod body_base64 {
	use base64::engine::general_purpose::STANDARD;
	use base64::Engine;
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&STANDARD.encode(body))
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
		let encoded = String::deserialize(deserializer)?;
		STANDARD
			.decode(encoded.as_bytes())
			.map_err(serde::de::Error::custom)
	}
}

/// The network. Errors only when no response was received; a 404 or 500
/// is still a response.
#[async_trait]
pub trait Fetcher: Send + Sync {
	async fn fetch(&self, request: &FetchRequest) -> Result<HttpResponse>;
}

/// `Fetcher` backed by reqwest
pub struct HttpFetcher {
	client: Client,
}

impl HttpFetcher {
	pub fn new() -> Result<Self> {
		Ok(HttpFetcher {
			client: Client::builder().build()?,
		})
	}
}

#[async_trait]
impl Fetcher for HttpFetcher {
	async fn fetch(&self, request: &FetchRequest) -> Result<HttpResponse> {
		let method = Method::from_bytes(request.method.as_bytes())
			.map_err(|e| Error::Network(format!("invalid method {}: {}", request.method, e)))?;

		let mut builder = self.client.request(method, request.url.clone());
		for (name, value) in &request.headers {
			let name = HeaderName::from_bytes(name.as_bytes())
				.map_err(|e| Error::Network(format!("invalid header {}: {}", name, e)))?;
			let value = HeaderValue::from_str(value)
				.map_err(|e| Error::Network(format!("invalid header value: {}", e)))?;
			builder = builder.header(name, value);
		}
		if request.header(ACCEPT.as_str()).is_none() && request.is_navigation() {
			builder = builder.header(ACCEPT, "text/html");
		}
		if let Some(body) = &request.body {
			builder = builder.body(body.clone());
		}

		let response = builder.send().await?;
		let status = response.status().as_u16();
		let headers = response
			.headers()
			.iter()
			.filter_map(|(name, value)| {
				value
					.to_str()
					.ok()
					.map(|v| (name.as_str().to_string(), v.to_string()))
			})
			.collect();
		let body = response.bytes().await?.to_vec();

		debug!("{} {} -> {}", request.method, request.url, status);
		Ok(HttpResponse {
			status,
			headers,
			body,
			fetched_at: Utc::now(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_cache_key_keeps_query() {
		let url = Url::parse("https://domiflash.test/restaurants?zone=centro").unwrap();
		assert_eq!(cache_key(&url), "/restaurants?zone=centro");

		let root = Url::parse("https://domiflash.test").unwrap();
		assert_eq!(cache_key(&root), "/");
	}

	#[test]
	fn test_header_lookup_ignores_case() {
		let url = Url::parse("https://domiflash.test/menu").unwrap();
		let request = FetchRequest::get(url).with_header("Accept", "application/json");

		assert_eq!(request.header("accept"), Some("application/json"));
		assert_eq!(request.header("content-type"), None);
	}

	#[test]
	fn test_snapshot_body_is_base64() {
		let response = HttpResponse::new(200, b"\x00\xffpng".to_vec());
		let json = serde_json::to_value(&response).unwrap();

		assert_eq!(json["body"], "AP9wbmc=");
		let back: HttpResponse = serde_json::from_value(json).unwrap();
		assert_eq!(back.body, response.body);
	}
}
