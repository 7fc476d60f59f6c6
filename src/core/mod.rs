pub mod types;
pub mod dataset;
pub mod engine;
pub mod config;
pub mod error;
pub mod logging;
