pub mod errors;
pub mod gate;
pub mod guard;
pub mod metrics;
pub mod openapi;
pub mod routes;
pub mod startup;
pub mod state;
pub mod trace;

pub use startup::{build_app, run};
pub use state::ServerState;
