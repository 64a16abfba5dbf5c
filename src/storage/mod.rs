//! Temp storage area lifecycle.

mod janitor;

pub use janitor::StorageJanitor;
