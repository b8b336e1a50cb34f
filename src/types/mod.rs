//! Core domain types shared across the crate.

mod ids;

pub use ids::{PrId, RepoId, Sha};
