use thiserror::Error;

/// Errors surfaced by the session watchdog and the offline controller
#[derive(Debug, Error)]
pub enum Error {
	/// The request never produced a response (connection refused, DNS, offline)
	#[error("network request failed: {0}")]
	Network(String),

	/// A JSON endpoint answered, but not with a 2xx status
	#[error("unexpected HTTP status {status} from {url}")]
	Status { status: u16, url: String },

	#[error("malformed response body: {0}")]
	Decode(String),

	#[error("invalid URL: {0}")]
	InvalidUrl(String),

	#[error("storage error: {0}")]
	Storage(String),

	/// A manifest resource could not be cached, nothing was committed
	#[error("install aborted while caching {url}: {reason}")]
	InstallAborted { url: String, reason: String },

	/// Network and cache both missed
	#[error("no network response and no cached entry for {url}")]
	NoCachedResponse { url: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
	fn from(e: reqwest::Error) -> Self {
		if e.is_decode() {
			Error::Decode(e.to_string())
		} else {
			Error::Network(e.to_string())
		}
	}
}

impl From<serde_json::Error> for Error {
	fn from(e: serde_json::Error) -> Self {
		Error::Decode(e.to_string())
	}
}

impl From<std::io::Error> for Error {
	fn from(e: std::io::Error) -> Self {
		Error::Storage(e.to_string())
	}
}

impl From<url::ParseError> for Error {
	fn from(e: url::ParseError) -> Self {
		Error::InvalidUrl(e.to_string())
	}
}

impl Error {
	/// True when the failure means "no connectivity" rather than a server answer
	pub fn is_network(&self) -> bool {
		matches!(self, Error::Network(_))
	}
}
