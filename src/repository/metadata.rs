//! Composer package metadata.
//!
//! Converts the package version objects found in `packages.json`, `p2/*.json`
//! responses and inline `package` repositories into [`PackageRelease`]
//! values, including the alias releases Composer derives from
//! `extra.branch-alias` and `default-branch`.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::model::{DependencyLink, LinkMap, PackageRelease};
use crate::traits::FetchError;

/// Version Composer assigns to the alias of a default branch.
pub const DEFAULT_BRANCH_ALIAS: &str = "9999999-dev";

const UNSET: &str = "__unset";

/// One version object as published by a Composer repository.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageVersionJson {
    #[serde(default)]
    pub name: String,

    pub version: String,

    #[serde(default)]
    pub version_normalized: Option<String>,

    #[serde(default)]
    pub require: LinkField,

    #[serde(default, rename = "require-dev")]
    pub require_dev: LinkField,

    #[serde(default)]
    pub extra: Value,

    #[serde(default, rename = "default-branch")]
    pub default_branch: bool,
}

/// Requirement map. PHP serializes an empty map as `[]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LinkField {
    Map(BTreeMap<String, String>),
    Empty(Vec<Value>),
}

impl Default for LinkField {
    fn default() -> Self {
        Self::Map(BTreeMap::new())
    }
}

impl LinkField {
    /// Links keyed by lower-cased target name.
    pub fn to_links(&self) -> LinkMap {
        match self {
            Self::Map(map) => map
                .iter()
                .map(|(target, constraint)| {
                    let target = target.to_lowercase();
                    (target.clone(), DependencyLink::new(target, constraint.clone()))
                })
                .collect(),
            Self::Empty(_) => LinkMap::new(),
        }
    }
}

impl PackageVersionJson {
    /// The release itself followed by any alias Composer would derive for it.
    pub fn into_releases(self) -> Vec<PackageRelease> {
        let name = self.name.to_lowercase();
        let prod_links = self.require.to_links();
        let dev_links = self.require_dev.to_links();
        let normalized = self
            .version_normalized
            .clone()
            .unwrap_or_else(|| normalize_version(&self.version));

        let release = PackageRelease::new(name.clone(), self.version.clone())
            .with_normalized_version(normalized)
            .with_links(prod_links.clone(), dev_links.clone());

        let alias = self
            .branch_alias()
            .map(|alias| (normalize_version(&alias), alias))
            .or_else(|| {
                self.default_branch
                    .then(|| (DEFAULT_BRANCH_ALIAS.to_string(), DEFAULT_BRANCH_ALIAS.to_string()))
            })
            .map(|(normalized, pretty)| {
                PackageRelease::new(name, pretty)
                    .with_normalized_version(normalized)
                    .with_links(prod_links, dev_links)
                    .as_alias_of(self.version.clone())
            });

        std::iter::once(release).chain(alias).collect()
    }

    /// `extra.branch-alias` entry for this version, when it names a dev version.
    fn branch_alias(&self) -> Option<String> {
        if !self.version.starts_with("dev-") {
            return None;
        }

        self.extra
            .get("branch-alias")
            .and_then(|aliases| aliases.get(&self.version))
            .and_then(Value::as_str)
            .filter(|alias| alias.ends_with("-dev"))
            .map(str::to_string)
    }
}

/// Expands a `composer/2.0` minified version list: every entry inherits the
/// keys of the previous expanded entry, and `"__unset"` removes a key.
pub fn expand_minified(versions: Vec<Value>) -> Vec<Value> {
    let mut expanded = Vec::with_capacity(versions.len());
    let mut previous: Option<Map<String, Value>> = None;

    for version in versions {
        let Value::Object(fields) = version else {
            continue;
        };

        let mut current = previous.take().unwrap_or_default();
        for (key, value) in fields {
            if value.as_str() == Some(UNSET) {
                current.remove(&key);
            } else {
                current.insert(key, value);
            }
        }

        expanded.push(Value::Object(current.clone()));
        previous = Some(current);
    }

    expanded
}

/// Version objects keyed either by version (`{"1.0.0": {...}}`) or listed.
pub fn versions_from_value(value: Value) -> Vec<Value> {
    match value {
        Value::Array(versions) => versions,
        Value::Object(by_version) => by_version.into_iter().map(|(_, v)| v).collect(),
        _ => Vec::new(),
    }
}

/// Parses version objects into releases. `fallback_name` fills in a missing
/// `name`, as in `p2` responses keyed by package name.
pub fn releases_from_values(
    values: Vec<Value>,
    fallback_name: Option<&str>,
) -> Result<Vec<PackageRelease>, FetchError> {
    let mut releases = Vec::with_capacity(values.len());

    for value in values {
        let mut version: PackageVersionJson = serde_json::from_value(value)?;
        if version.name.is_empty() {
            match fallback_name {
                Some(name) => version.name = name.to_string(),
                None => {
                    return Err(FetchError::Malformed(format!(
                        "package version '{}' has no name",
                        version.version
                    )))
                }
            }
        }
        releases.extend(version.into_releases());
    }

    Ok(releases)
}

/// Best-effort normalization for versions published without
/// `version_normalized`.
///
/// `1.2` becomes `1.2.0.0`, `2.x-dev` becomes `2.9999999.9999999.9999999-dev`,
/// branch names (`dev-main`) are kept as-is.
pub fn normalize_version(pretty: &str) -> String {
    let lower = pretty.trim().to_lowercase();
    if lower.starts_with("dev-") {
        return lower;
    }

    let (numeric, suffix, filler) = match lower.strip_suffix("-dev") {
        Some(branch) => (branch, "-dev", "9999999"),
        None => match lower.split_once('-') {
            Some((numeric, rest)) => (numeric, rest, "0"),
            None => (lower.as_str(), "", "0"),
        },
    };

    let numeric = numeric
        .strip_prefix('v')
        .filter(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
        .unwrap_or(numeric);

    let mut parts: Vec<String> = numeric
        .split('.')
        .map(|part| match part {
            "x" | "*" => "9999999".to_string(),
            other => other.to_string(),
        })
        .collect();

    if parts.iter().any(|part| part.parse::<u64>().is_err()) {
        return lower;
    }

    while parts.len() < 4 {
        parts.push(filler.to_string());
    }

    let mut normalized = parts.join(".");
    match suffix {
        "" => {}
        "-dev" => normalized.push_str("-dev"),
        other => {
            normalized.push('-');
            normalized.push_str(other);
        }
    }
    normalized
}
