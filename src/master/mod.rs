//! Master API & event dispatcher (spec §4.D).

pub mod dispatch;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

pub use state::AppState;
