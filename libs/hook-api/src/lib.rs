//! Wire models for the deployhook HTTP API

pub mod models;

pub use models::*;
