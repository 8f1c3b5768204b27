pub mod config;
pub mod export;
pub mod service;
pub mod sync;
