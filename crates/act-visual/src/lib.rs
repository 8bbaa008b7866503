//! Visual regression support: a filesystem baseline store and a per-pixel
//! PNG comparator.
//!
//! Baselines live under `<state_dir>/baselines/<name>.png` with diff images
//! from the most recent mismatch in a `diffs/` sibling. Names are validated
//! against path traversal before any filesystem access.

pub mod compare;
pub mod store;

pub use compare::{compare, CompareResult, DEFAULT_THRESHOLD};
pub use store::BaselineStore;
