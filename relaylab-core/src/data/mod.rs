//! Data ingestion and override reconciliation

pub mod loader;
pub mod overrides;
pub mod resolve;

pub use loader::{read_collection, Dataset, LoadError};
pub use overrides::{load_overrides, save_overrides, OverrideError, OverrideStore, Overrides};
pub use resolve::{override_snapshot, resolve, OverrideSnapshotRow};
