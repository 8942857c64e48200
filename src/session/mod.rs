// Export session watchdog modules
pub mod api;
pub mod config;
pub mod machine;
pub mod monitor;
pub mod ui;

// Re-export main types
pub use api::{HttpSessionApi, SessionApi, SessionStatus};
pub use config::SessionConfig;
pub use machine::{Effect, SessionEvent, SessionMachine, SessionPhase, SessionState};
pub use monitor::{ActivityKind, SessionMonitor};
pub use ui::{LogSessionUi, Notice, NoticeKind, SessionUi, WarningPrompt, WarningStyle};
