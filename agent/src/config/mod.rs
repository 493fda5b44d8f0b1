//! Configuration sources and service settings

pub mod settings;
pub mod store;
