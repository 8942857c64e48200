// Export utility modules
pub mod scheduler;
pub mod throttle;

// Re-export main types
pub use scheduler::RepeatingTask;
pub use throttle::Throttle;
