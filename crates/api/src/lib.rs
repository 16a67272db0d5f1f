//! The serving process: supervises the prediction worker and the
//! downstream event consumers, and exposes a `/health` probe.

pub mod config;
pub mod router;
pub mod routes;
pub mod state;
pub mod supervisor;
