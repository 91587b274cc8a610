use crate::model::{MatchRecord, PackageRelease, ProgressTick, RepositoryError};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Failure of a single repository call. Always isolated to the repository
/// or package name it was raised for.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected status {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Fetch of '{label}' timed out after {millis}ms")]
    Timeout { label: String, millis: u64 },
    #[error("Repository exposes no package name index: {0}")]
    MissingIndex(String),
    #[error("Repository unavailable: {0}")]
    Unavailable(String),
    /// Part of a package's metadata was fetched; `releases` are still usable.
    #[error("{cause} ({} releases kept)", releases.len())]
    Incomplete {
        releases: Vec<PackageRelease>,
        #[source]
        cause: Box<FetchError>,
    },
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// A repository that hands back its complete release list in one call.
#[async_trait]
pub trait EnumerableRepository: Send + Sync {
    /// Label used in logs and error reports.
    fn name(&self) -> &str;

    async fn list_all_releases(&self) -> Result<Vec<PackageRelease>, FetchError>;
}

/// A repository that lists package names up front and serves releases per
/// name on demand.
#[async_trait]
pub trait NameIndexedRepository: Send + Sync {
    /// Label used in logs and error reports.
    fn name(&self) -> &str;

    /// Known package names, each listed once, in repository order.
    async fn list_names(&self) -> Result<Vec<String>, FetchError>;

    async fn fetch_releases_by_name(&self, name: &str) -> Result<Vec<PackageRelease>, FetchError>;
}

/// A configured repository, tagged by how its releases are reached.
#[derive(Clone)]
pub enum RepositorySource {
    Enumerable(Arc<dyn EnumerableRepository>),
    NameIndexed(Arc<dyn NameIndexedRepository>),
}

impl RepositorySource {
    pub fn enumerable<R: EnumerableRepository + 'static>(repository: R) -> Self {
        Self::Enumerable(Arc::new(repository))
    }

    pub fn name_indexed<R: NameIndexedRepository + 'static>(repository: R) -> Self {
        Self::NameIndexed(Arc::new(repository))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Enumerable(repository) => repository.name(),
            Self::NameIndexed(repository) => repository.name(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Enumerable(_) => "enumerable",
            Self::NameIndexed(_) => "name-indexed",
        }
    }
}

impl fmt::Debug for RepositorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositorySource")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .finish()
    }
}

/// Consumer of scan events. Called from a single task, in emission order.
pub trait ReportSink: Send {
    fn on_progress(&mut self, tick: &ProgressTick);

    fn on_match(&mut self, record: &MatchRecord);

    fn on_repository_error(&mut self, error: &RepositoryError);

    fn on_finished(&mut self, overall_success: bool);
}
