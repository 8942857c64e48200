use url::Url;

use crate::offline::http::FetchRequest;

const STATIC_MARKER: &str = "/static/";
const API_MARKERS: [&str; 2] = ["/api/", "/ajax/"];
const ASSET_EXTENSIONS: [&str; 11] = [
	"css", "js", "png", "jpg", "jpeg", "gif", "webp", "ico", "svg", "woff", "woff2",
];

/// Resolution order between the cache and the network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
	/// Static assets
	CacheFirst,
	/// API calls
	NetworkFirst,
	/// Pages
	NetworkFirstWithFallback,
}

/// What the controller does with a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
	/// Not ours: left to the network untouched
	PassThrough,
	Handle(Strategy),
}

/// Classify an intercepted request against the controlled origin
pub fn classify(origin: &Url, request: &FetchRequest) -> Route {
	let url = &request.url;

	if !matches!(url.scheme(), "http" | "https") {
		return Route::PassThrough;
	}
	if url.origin() != origin.origin() {
		return Route::PassThrough;
	}
	// The cache only stores GET responses
	if !request.method.eq_ignore_ascii_case("GET") {
		return Route::PassThrough;
	}

	if is_static_asset(url) {
		Route::Handle(Strategy::CacheFirst)
	} else if is_api_request(request) {
		Route::Handle(Strategy::NetworkFirst)
	} else {
		Route::Handle(Strategy::NetworkFirstWithFallback)
	}
}

pub fn is_static_asset(url: &Url) -> bool {
	let path = url.path();
	if path.contains(STATIC_MARKER) {
		return true;
	}

	let last_segment = path.rsplit('/').next().unwrap_or("");
	match last_segment.rsplit_once('.') {
		Some((_, ext)) => ASSET_EXTENSIONS
			.iter()
			.any(|known| ext.eq_ignore_ascii_case(known)),
		None => false,
	}
}

pub fn is_api_request(request: &FetchRequest) -> bool {
	let path = request.url.path();
	if API_MARKERS.iter().any(|marker| path.contains(marker)) {
		return true;
	}

	request
		.header("accept")
		.map_or(false, |accept| accept.contains("application/json"))
}
