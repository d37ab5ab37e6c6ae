//! Batch module - background generation jobs behind the HTTP API.
//!
//! - `model` - request and job snapshot types
//! - `registry` - in-memory job table with cancellation handles
//! - `routes` - start, list, inspect, cancel and download endpoints

pub mod model;
pub mod registry;
pub mod routes;


pub use model::{BatchAccepted, BatchJob, BatchRequest, BatchStatus};
pub use registry::{BatchJobRegistry, MAX_FINISHED_JOBS};
