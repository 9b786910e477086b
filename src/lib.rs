// Core modules
pub mod account;
pub mod exchange;
pub mod market;
pub mod models;

// Re-export commonly used types
pub use account::{Account, ExecutionMode, TradingAccount};
pub use models::*;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
