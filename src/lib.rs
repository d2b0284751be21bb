// Library interface for the server binary and tests

pub mod capture;
pub mod client;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod models;
pub mod queries;
pub mod schema;
pub mod serve;
pub mod source;
pub mod store;
pub mod timer;

pub use constants::MAX_RECORDING_SECONDS;
