pub mod config;
pub mod paths;
pub mod store;
pub mod types;
