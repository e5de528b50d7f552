pub mod api;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod feed;
pub mod store;
