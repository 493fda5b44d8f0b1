//! Server state

use std::sync::Arc;
use std::time::Instant;

use crate::deploy::resolver::Resolver;
use crate::deploy::sequencer::ChainSequencer;

/// Server state shared across handlers
pub struct ServerState {
    pub sequencer: Arc<ChainSequencer>,
    pub port: u16,
    pub started_at: Instant,
    pub expose_error_details: bool,
}

impl ServerState {
    pub fn new(sequencer: Arc<ChainSequencer>, port: u16, expose_error_details: bool) -> Self {
        Self {
            sequencer,
            port,
            started_at: Instant::now(),
            expose_error_details,
        }
    }

    pub fn resolver(&self) -> &Resolver {
        self.sequencer.resolver()
    }
}
