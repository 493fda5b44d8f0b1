//! Deployment engine

pub mod discovery;
pub mod executor;
pub mod gate;
pub mod models;
pub mod resolver;
pub mod sequencer;
