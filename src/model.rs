use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A declared requirement on another package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyLink {
    pub target: String,
    /// Constraint exactly as declared, e.g. `^1.0 || ^2.0`.
    pub constraint: String,
}

impl DependencyLink {
    pub fn new(target: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            constraint: constraint.into(),
        }
    }
}

/// Links keyed by target package name.
pub type LinkMap = BTreeMap<String, DependencyLink>;

/// One concrete release of one package, read once from a repository and
/// never mutated afterwards.
///
/// Construction goes through a consuming builder:
///
/// ```
/// use global_depends::PackageRelease;
///
/// let release = PackageRelease::new("app/x", "dev-master")
///     .requiring("acme/logger", "^2.0")
///     .requiring_dev("phpunit/phpunit", "^10.0");
///
/// assert!(release.is_development_release());
/// assert_eq!(release.pretty_string(), "app/x dev-master");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRelease {
    name: String,
    version: String,
    pretty_version: String,
    is_dev: bool,
    alias_of: Option<String>,
    prod_links: LinkMap,
    dev_links: LinkMap,
}

impl PackageRelease {
    /// Creates a release from its canonical name and display version.
    ///
    /// The normalized version defaults to the display version and the
    /// development flag is derived from it (`dev-*` or `*-dev`).
    pub fn new(name: impl Into<String>, pretty_version: impl Into<String>) -> Self {
        let pretty_version = pretty_version.into();
        Self {
            name: name.into(),
            version: pretty_version.clone(),
            is_dev: is_dev_version(&pretty_version),
            pretty_version,
            alias_of: None,
            prod_links: LinkMap::new(),
            dev_links: LinkMap::new(),
        }
    }

    pub fn with_normalized_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Overrides the development flag derived from the version string.
    pub fn with_development(mut self, is_dev: bool) -> Self {
        self.is_dev = is_dev;
        self
    }

    /// Marks this release as an alias pointing at `target_pretty_version`.
    pub fn as_alias_of(mut self, target_pretty_version: impl Into<String>) -> Self {
        self.alias_of = Some(target_pretty_version.into());
        self
    }

    pub fn requiring(mut self, target: impl Into<String>, constraint: impl Into<String>) -> Self {
        let link = DependencyLink::new(target, constraint);
        self.prod_links.insert(link.target.clone(), link);
        self
    }

    pub fn requiring_dev(
        mut self,
        target: impl Into<String>,
        constraint: impl Into<String>,
    ) -> Self {
        let link = DependencyLink::new(target, constraint);
        self.dev_links.insert(link.target.clone(), link);
        self
    }

    pub fn with_links(mut self, prod_links: LinkMap, dev_links: LinkMap) -> Self {
        self.prod_links = prod_links;
        self.dev_links = dev_links;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn pretty_version(&self) -> &str {
        &self.pretty_version
    }

    /// Display string, e.g. `vendor/pkg 1.2.x-dev`.
    pub fn pretty_string(&self) -> String {
        format!("{} {}", self.name, self.pretty_version)
    }

    pub fn is_development_release(&self) -> bool {
        self.is_dev
    }

    pub fn is_alias(&self) -> bool {
        self.alias_of.is_some()
    }

    pub fn alias_of(&self) -> Option<&str> {
        self.alias_of.as_deref()
    }

    pub fn prod_links(&self) -> &LinkMap {
        &self.prod_links
    }

    pub fn dev_links(&self) -> &LinkMap {
        &self.dev_links
    }
}

/// Returns true for branch-tracking version strings (`dev-main`, `2.x-dev`).
pub fn is_dev_version(pretty_version: &str) -> bool {
    let lower = pretty_version.to_ascii_lowercase();
    lower.starts_with("dev-") || lower.ends_with("-dev")
}

/// Which requirement section a link was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkCategory {
    Prod,
    Dev,
}

impl LinkCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prod => "prod",
            Self::Dev => "dev",
        }
    }

    /// Name of the composer.json section this category corresponds to.
    pub fn section(&self) -> &'static str {
        match self {
            Self::Prod => "require",
            Self::Dev => "require-dev",
        }
    }
}

impl fmt::Display for LinkCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One release declaring a dependency on the searched package in one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub release: PackageRelease,
    pub category: LinkCategory,
    pub constraint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressTick {
    /// Releases examined so far, before classification.
    pub processed_count: u64,
    /// Display name of the release being examined; empty when idle.
    pub current_label: String,
}

/// An isolated fetch failure: a whole repository, or one package name in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryError {
    pub repository: String,
    pub package: Option<String>,
    pub message: String,
}

impl RepositoryError {
    pub fn for_repository(repository: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            repository: repository.into(),
            package: None,
            message: message.to_string(),
        }
    }

    pub fn for_package(
        repository: impl Into<String>,
        package: impl Into<String>,
        message: impl fmt::Display,
    ) -> Self {
        Self {
            repository: repository.into(),
            package: Some(package.into()),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.package {
            Some(package) => write!(f, "{} ({}): {}", self.repository, package, self.message),
            None => write!(f, "{}: {}", self.repository, self.message),
        }
    }
}
