//! Run configuration and repository list construction.
//!
//! Repositories are assembled the way Composer does it: explicit entries
//! first, then the `repositories` section of composer.json, then
//! packagist.org unless it was disabled.

use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::executor::FetchExecutor;
use crate::repository::{ComposerRepository, PackageRepository, PACKAGIST_URL};
use crate::traits::RepositorySource;

pub const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid repository URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

// ============================================================================
// Scan Configuration
// ============================================================================

/// Tuning for a scan.
///
/// Default configuration:
/// - Concurrency: 8 package fetches in flight
/// - Fetch timeout: none
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    pub concurrency: usize,
    pub fetch_timeout: Option<Duration>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            fetch_timeout: None,
        }
    }
}

impl ScanConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// A fetch exceeding `timeout` is reported like any other failed fetch.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    pub fn executor(&self) -> FetchExecutor {
        FetchExecutor::new(self.concurrency).with_timeout(self.fetch_timeout)
    }
}

// ============================================================================
// Repository Configuration
// ============================================================================

/// One configured repository, before any connection is made.
#[derive(Debug, Clone, PartialEq)]
pub enum RepositorySpec {
    /// Composer repository root URL
    Composer { url: String },

    /// Package definitions given inline
    Inline { label: String, packages: Vec<Value> },

    /// Package definitions read from a JSON file
    File { path: PathBuf },
}

impl RepositorySpec {
    pub fn into_source(self, client: &reqwest::Client) -> Result<RepositorySource, ConfigError> {
        Ok(match self {
            Self::Composer { url } => {
                let repository = ComposerRepository::new(&url, client.clone())
                    .map_err(|source| ConfigError::InvalidUrl { url, source })?;
                RepositorySource::name_indexed(repository)
            }
            Self::Inline { label, packages } => {
                RepositorySource::enumerable(PackageRepository::inline(label, packages))
            }
            Self::File { path } => RepositorySource::enumerable(PackageRepository::from_file(path)),
        })
    }
}

/// Repositories declared by a composer.json.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposerRepositories {
    pub repositories: Vec<RepositorySpec>,
    /// False when composer.json disables packagist.org.
    pub packagist_enabled: bool,
}

impl Default for ComposerRepositories {
    fn default() -> Self {
        Self {
            repositories: Vec::new(),
            packagist_enabled: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ComposerJson {
    #[serde(default)]
    repositories: Value,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RepositoryEntry {
    Composer { url: String },
    Package { package: Value },
    #[serde(other)]
    Unsupported,
}

impl ComposerRepositories {
    /// Reads the `repositories` section of the composer.json at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        let composer: ComposerJson = serde_json::from_str(content)?;

        let entries: Vec<(Option<String>, Value)> = match composer.repositories {
            Value::Array(entries) => entries.into_iter().map(|entry| (None, entry)).collect(),
            Value::Object(entries) => entries
                .into_iter()
                .map(|(key, entry)| (Some(key), entry))
                .collect(),
            _ => Vec::new(),
        };

        let mut parsed = Self::default();
        for (index, (key, entry)) in entries.into_iter().enumerate() {
            if is_packagist_toggle(key.as_deref(), &entry) {
                parsed.packagist_enabled = false;
                continue;
            }

            match serde_json::from_value::<RepositoryEntry>(entry) {
                Ok(RepositoryEntry::Composer { url }) => {
                    parsed.repositories.push(RepositorySpec::Composer { url });
                }
                Ok(RepositoryEntry::Package { package }) => {
                    let label = key.unwrap_or_else(|| format!("package repository #{}", index));
                    let packages = match package {
                        Value::Array(packages) => packages,
                        single => vec![single],
                    };
                    parsed.repositories.push(RepositorySpec::Inline { label, packages });
                }
                Ok(RepositoryEntry::Unsupported) => {
                    warn!(index, "Skipping repository of unsupported type");
                }
                Err(e) => {
                    warn!(index, error = %e, "Skipping malformed repository entry");
                }
            }
        }

        debug!(
            repositories = parsed.repositories.len(),
            packagist = parsed.packagist_enabled,
            "composer.json repositories parsed"
        );
        Ok(parsed)
    }
}

/// `{"packagist.org": false}` as a list entry, or `"packagist.org": false`
/// as a keyed entry.
fn is_packagist_toggle(key: Option<&str>, entry: &Value) -> bool {
    let is_packagist_key = |k: &str| k == "packagist.org" || k == "packagist";

    match (key, entry) {
        (Some(k), Value::Bool(false)) => is_packagist_key(k),
        (None, Value::Object(fields)) => {
            fields.len() == 1
                && fields
                    .iter()
                    .any(|(k, v)| is_packagist_key(k) && *v == Value::Bool(false))
        }
        _ => false,
    }
}

/// Ordered repository list for one run. packagist.org is included unless
/// disabled.
#[derive(Debug, Clone)]
pub struct RepositoryListBuilder {
    explicit: Vec<RepositorySpec>,
    composer_json: Option<PathBuf>,
    packagist: bool,
}

impl Default for RepositoryListBuilder {
    fn default() -> Self {
        Self {
            explicit: Vec::new(),
            composer_json: None,
            packagist: true,
        }
    }
}

impl RepositoryListBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repository(mut self, spec: RepositorySpec) -> Self {
        self.explicit.push(spec);
        self
    }

    pub fn with_composer_json(mut self, path: impl Into<PathBuf>) -> Self {
        self.composer_json = Some(path.into());
        self
    }

    pub fn with_packagist(mut self, enabled: bool) -> Self {
        self.packagist = enabled;
        self
    }

    /// Resolves the final list; a missing composer.json is not an error.
    pub fn build_specs(&self) -> Result<Vec<RepositorySpec>, ConfigError> {
        let mut specs = self.explicit.clone();
        let mut packagist = self.packagist;

        if let Some(path) = self.composer_json.as_deref().filter(|p| p.exists()) {
            let declared = ComposerRepositories::load(path)?;
            packagist &= declared.packagist_enabled;
            specs.extend(declared.repositories);
        }

        if packagist {
            specs.push(RepositorySpec::Composer {
                url: PACKAGIST_URL.to_string(),
            });
        }

        Ok(specs)
    }

    pub fn build(&self, client: &reqwest::Client) -> Result<Vec<RepositorySource>, ConfigError> {
        self.build_specs()?
            .into_iter()
            .map(|spec| spec.into_source(client))
            .collect()
    }
}

/// HTTP client shared by every Composer repository of a run.
pub fn http_client() -> Result<reqwest::Client, ConfigError> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?)
}
