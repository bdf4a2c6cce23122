//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server
//! for live plan generation.

use serde::{Deserialize, Serialize};
use training_plan_core::TrainingSchedule;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Starts a generation cycle, unless one is already running.
    RequestPlan,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================
// Every connected client receives every message; a generation started from one
// client is visible to all of them.
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A generation cycle has begun.
    GenerationStarted,

    /// Periodic snapshot of the text produced so far.
    Progress {
        output_tokens: usize,
        partial_output: String,
    },

    /// The request was ignored because a generation was already running.
    GenerationSkipped,

    /// The model finished and its output was accepted.
    GenerationFinished {
        weeks: usize,
        input_tokens: usize,
        output_tokens: usize,
        tokens_per_second: f64,
    },

    /// The cycle failed; the previous schedule is still in place.
    GenerationFailed { message: String },

    /// The stored schedule was replaced.
    ScheduleUpdated { schedule: TrainingSchedule },

    /// Reports a protocol error to this client only.
    Error { message: String },
}
