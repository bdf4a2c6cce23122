//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::web::protocol::ServerMessage;
use std::sync::Arc;
use tokio::sync::broadcast;
use training_plan_core::PlanGenerator;

/// Buffered events per subscriber before a slow client starts losing progress updates.
pub const EVENT_CAPACITY: usize = 256;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub planner: Arc<PlanGenerator>,
    /// Fan-out of generation events to every WebSocket client.
    pub events: broadcast::Sender<ServerMessage>,
}

impl AppState {
    pub fn new(planner: Arc<PlanGenerator>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            planner,
            events,
        }
    }

    /// Sends to all subscribers. Having none is not an error.
    pub fn publish(&self, message: ServerMessage) {
        let _ = self.events.send(message);
    }
}
