pub mod config;
pub mod errors;
pub mod kernel;
pub mod transaction_log;
pub mod types;
