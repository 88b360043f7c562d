pub mod config;
pub mod discovery;
pub mod errors;
pub mod hd;
pub mod models;
pub mod store;
