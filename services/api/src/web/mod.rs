pub mod plan_task;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

// Re-export the handlers to make them easily accessible
// to the binary that will build the web server router.
pub use rest::{
    day_handler, plan_output_handler, plan_status_handler, request_plan_handler,
    schedule_handler, week_handler,
};
pub use ws_handler::ws_handler;
