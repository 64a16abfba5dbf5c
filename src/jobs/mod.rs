//! Fetch jobs: model, in-memory store and lifecycle controller.

mod controller;
mod models;
mod store;

pub use controller::{JobController, JobOutcome};
pub use models::{progress_percent, Job, JobPhase, JobSnapshot, Transition};
pub use store::JobStore;
