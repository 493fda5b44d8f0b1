//! deployhook library
//!
//! Webhook-triggered deployments: resolve a project or chain from
//! configuration, run its commands, report the outcome over HTTP.

pub mod app;
pub mod config;
pub mod deploy;
pub mod errors;
pub mod logs;
pub mod server;
pub mod utils;
