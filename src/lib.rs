//! Reverse-dependency search across Composer package repositories: which
//! releases of which packages require a given package, and with what
//! constraint.

pub mod classifier;
pub mod config;
pub mod executor;
pub mod matcher;
pub mod model;
pub mod policy;
pub mod repository;
pub mod scan;
pub mod sink;
pub mod traits;
pub mod walker;

// Re-export common types for convenience
pub use classifier::should_inspect;
pub use config::{RepositoryListBuilder, RepositorySpec, ScanConfig};
pub use executor::*;
pub use matcher::find_matches;
pub use model::*;
pub use policy::*;
pub use scan::*;
pub use sink::*;
pub use traits::*;
pub use walker::*;
