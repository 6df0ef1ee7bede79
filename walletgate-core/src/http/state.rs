//! Server state shared across requests
//!
//! Nothing here mutates after startup: the broker holds the transit keys
//! (generated once per process) and the collaborator handles. Identities are
//! re-derived per request, never cached across requests.

use crate::handshake::Broker;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<Broker>,
}

impl AppState {
    pub fn new(broker: Arc<Broker>) -> Self {
        AppState { broker }
    }
}
