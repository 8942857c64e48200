use std::env;
use std::sync::Arc;

use domiflash::config::AppConfig;
use domiflash::offline::{
	FetchRequest, HttpFetcher, JsonFileOrderQueue, LogHost, MemoryCacheStore, OfflineWorker,
	OrderOutbox, SubmitOutcome, WorkerConfig, ORDER_SYNC_TAG,
};
use log::{error, info};
use url::Url;

fn usage(program: &str) {
	println!("Usage: {} <command> [args]", program);
	println!("  install              Pre-cache the app shell and activate the new cache");
	println!("  fetch <path> [nav]   Resolve a request through the offline cache");
	println!("  submit <order-json>  Submit an order, queueing it when offline");
	println!("  sync                 Replay queued offline orders");
	println!("  push <payload-json>  Show the notification for a push payload");
	println!("Environment: DOMIFLASH_BASE_URL, DOMIFLASH_ORDER_QUEUE, DOMIFLASH_CACHE_SNAPSHOT");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	env_logger::init();

	// Parse command line arguments
	let args: Vec<String> = env::args().collect();
	let program = args.first().map(String::as_str).unwrap_or("offline-worker");
	let command = match args.get(1) {
		Some(command) => command.as_str(),
		None => {
			usage(program);
			return Ok(());
		}
	};

	let config = AppConfig::from_env();
	let origin = Url::parse(&config.base_url)?;

	let store = Arc::new(MemoryCacheStore::load_or_default(&config.cache_snapshot_path).await?);
	let fetcher = Arc::new(HttpFetcher::new()?);
	let queue = Arc::new(JsonFileOrderQueue::new(&config.order_queue_path));
	let worker = OfflineWorker::new(
		WorkerConfig::default(),
		origin.clone(),
		store.clone(),
		fetcher.clone(),
		Arc::new(LogHost),
		queue.clone(),
	);

	match command {
		"install" => {
			worker.install().await?;
			let purged = worker.activate().await?;
			info!("Active with {} old cache(s) removed", purged.len());
		}
		"fetch" => {
			let path = args.get(2).map(String::as_str).unwrap_or("/");
			let url = origin.join(path)?;
			let request = match args.get(3).map(String::as_str) {
				Some("nav") => FetchRequest::navigate(url),
				_ => FetchRequest::get(url),
			};

			if !worker.resume().await? {
				error!("No installed cache found, run `install` first");
				return Ok(());
			}
			match worker.handle_fetch(&request).await {
				Ok(Some(response)) => println!(
					"{} {} ({} bytes)",
					response.status,
					request.url,
					response.body.len()
				),
				Ok(None) => println!("{} is not handled by the offline cache", request.url),
				Err(e) => println!("Fetch failed: {}", e),
			}
		}
		"submit" => {
			let payload = serde_json::from_str(args.get(2).map(String::as_str).unwrap_or("{}"))?;
			let outbox = OrderOutbox::new(queue, fetcher, origin.join(&worker.config().orders_endpoint)?);
			match outbox.submit(payload).await? {
				SubmitOutcome::Sent(response) => println!("Order sent, server answered {}", response.status),
				SubmitOutcome::Queued(order) => println!("Offline: order {} queued", order.id),
			}
		}
		"sync" => {
			if let Some(report) = worker.handle_sync(ORDER_SYNC_TAG).await? {
				println!(
					"Delivered: {:?}, still queued: {:?}",
					report.delivered, report.pending
				);
			}
		}
		"push" => {
			let payload = args.get(2).map(|raw| raw.as_bytes());
			if !worker.handle_push(payload).await? {
				println!("Push without data, nothing to show");
			}
		}
		_ => {
			usage(program);
			return Ok(());
		}
	}

	store.save(&config.cache_snapshot_path).await?;
	Ok(())
}
