//! Run controller: drives a test case to completion while remaining
//! externally controllable over the control bus.
//!
//! One controller instance owns one run id. It restores a checkpoint if one
//! exists, runs the optional authentication preflight, then interprets steps
//! in index order with a single cooperative suspension point between steps
//! where pause/resume/stop requests are honored.

mod capture;
mod control;
mod controller;
mod errors;
mod preflight;
mod stores;

pub use capture::CapturePolicy;
pub use controller::{Buses, RunController};
pub use errors::RunError;
pub use stores::{ArtifactStore, InMemoryArtifactStore, InMemoryRunStore, RunStore};
