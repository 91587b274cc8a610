//! Concrete repository implementations.
//!
//! - [`ComposerRepository`]: name-indexed, HTTP (packagist.org, private Composer repositories)
//! - [`PackageRepository`]: enumerable, inline definitions or a JSON file
//! - [`metadata`]: Composer package JSON to [`PackageRelease`](crate::PackageRelease) conversion

pub mod composer;
pub mod metadata;
pub mod package;

pub use composer::{ComposerRepository, PACKAGIST_URL};
pub use package::PackageRepository;
