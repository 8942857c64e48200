// Export modules
pub mod config;
pub mod error;
pub mod offline;
pub mod session;
pub mod utils;

// Re-export main types
pub use config::AppConfig;
pub use error::{Error, Result};
pub use offline::OfflineWorker;
pub use session::SessionMonitor;
