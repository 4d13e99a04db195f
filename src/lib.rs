pub mod api;
pub mod config;
pub mod error;
pub mod maintenance;
pub mod service;
pub mod shutdown;
pub mod store;
