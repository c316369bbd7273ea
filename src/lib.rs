pub mod analysis;
pub mod api;
pub mod completion;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod notify;
pub mod phone;
pub mod questions;
pub mod store;
