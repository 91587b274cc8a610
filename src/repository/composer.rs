//! Name-indexed Composer repository over HTTP (packagist.org, Satis, or any
//! other Composer repository).
//!
//! Package names come from the first index the root `packages.json`
//! offers: `available-packages`, the `list` URL, then packages published
//! inline or through `includes` together with `provider-includes` listings.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::model::PackageRelease;
use crate::repository::metadata::{expand_minified, releases_from_values, versions_from_value};
use crate::traits::{FetchError, NameIndexedRepository};

/// Default public repository.
pub const PACKAGIST_URL: &str = "https://repo.packagist.org";

const DEFAULT_METADATA_URL: &str = "/p2/%package%.json";

/// Root `packages.json` document.
#[derive(Debug, Default, Deserialize)]
struct PackagesJson {
    #[serde(default, rename = "metadata-url")]
    metadata_url: Option<String>,

    #[serde(default, rename = "available-packages")]
    available_packages: Option<Vec<String>>,

    #[serde(default)]
    list: Option<String>,

    #[serde(default)]
    packages: Value,

    /// `{path: {"sha1": ..}}`, each file holding more `packages`
    #[serde(default)]
    includes: Value,

    /// `{path with %hash%: {"sha256": ..}}`, each file holding `providers`
    #[serde(default, rename = "provider-includes")]
    provider_includes: Value,

    #[serde(default, rename = "providers-url")]
    providers_url: Option<String>,
}

/// `list.json` document.
#[derive(Debug, Deserialize)]
struct PackageNamesJson {
    #[serde(rename = "packageNames")]
    package_names: Vec<String>,
}

/// A file named by `includes`.
#[derive(Debug, Deserialize)]
struct IncludeJson {
    #[serde(default)]
    packages: Value,
}

/// A file named by `provider-includes`.
#[derive(Debug, Deserialize)]
struct ProviderListingJson {
    #[serde(default)]
    providers: Value,
}

/// `p2/<name>.json` or provider document.
#[derive(Debug, Deserialize)]
struct MetadataJson {
    #[serde(default)]
    packages: BTreeMap<String, Value>,

    #[serde(default)]
    minified: Option<String>,
}

/// Where names and releases live, resolved from the root document and the
/// files it includes.
#[derive(Debug, Default)]
struct RootIndex {
    metadata_url: Option<String>,
    available_packages: Option<Vec<String>>,
    list_url: Option<String>,
    inline: BTreeMap<String, Vec<Value>>,
    providers_url: Option<String>,
    /// Provider name to the hash substituted into `providers_url`
    providers: BTreeMap<String, String>,
}

/// Package versions keyed by lower-cased name.
fn inline_packages(packages: Value) -> BTreeMap<String, Vec<Value>> {
    match packages {
        Value::Object(packages) => packages
            .into_iter()
            .map(|(name, versions)| (name.to_lowercase(), versions_from_value(versions)))
            .collect(),
        _ => BTreeMap::new(),
    }
}

/// Keys of a `{key: {"sha256": ..}}` map with their hash. PHP writes an
/// empty map as `[]`, which yields nothing.
fn hashed_entries(entries: &Value) -> Vec<(String, Option<String>)> {
    let Value::Object(entries) = entries else {
        return Vec::new();
    };

    entries
        .iter()
        .map(|(key, meta)| {
            let hash = meta
                .get("sha256")
                .or_else(|| meta.get("sha1"))
                .and_then(Value::as_str)
                .map(str::to_string);
            (key.clone(), hash)
        })
        .collect()
}

pub struct ComposerRepository {
    label: String,
    base: Url,
    client: reqwest::Client,
    index: OnceCell<RootIndex>,
}

impl ComposerRepository {
    /// Creates a repository rooted at `url`; `packages.json` is read from there.
    pub fn new(url: &str, client: reqwest::Client) -> Result<Self, url::ParseError> {
        let label = url.trim_end_matches('/').to_string();
        let base = Url::parse(&format!("{}/", label))?;

        Ok(Self {
            label,
            base,
            client,
            index: OnceCell::new(),
        })
    }

    pub fn packagist(client: reqwest::Client) -> Result<Self, url::ParseError> {
        Self::new(PACKAGIST_URL, client)
    }

    pub fn url(&self) -> &Url {
        &self.base
    }

    async fn index(&self) -> Result<&RootIndex, FetchError> {
        self.index.get_or_try_init(|| self.load_index()).await
    }

    #[instrument(skip(self), fields(repository = %self.label))]
    async fn load_index(&self) -> Result<RootIndex, FetchError> {
        let root: PackagesJson = self.get_json(&self.resolve("packages.json")?).await?;

        let mut index = RootIndex {
            metadata_url: root.metadata_url,
            available_packages: root.available_packages,
            list_url: root.list,
            inline: inline_packages(root.packages),
            providers_url: root.providers_url,
            providers: BTreeMap::new(),
        };

        for (path, _) in hashed_entries(&root.includes) {
            let include: IncludeJson = self.get_json(&self.resolve(&path)?).await?;
            for (name, versions) in inline_packages(include.packages) {
                index.inline.entry(name).or_default().extend(versions);
            }
        }

        for (path, hash) in hashed_entries(&root.provider_includes) {
            let path = path.replace("%hash%", hash.as_deref().unwrap_or_default());
            let listing: ProviderListingJson = self.get_json(&self.resolve(&path)?).await?;
            index.providers.extend(
                hashed_entries(&listing.providers)
                    .into_iter()
                    .map(|(name, hash)| (name.to_lowercase(), hash.unwrap_or_default())),
            );
        }

        debug!(
            inline = index.inline.len(),
            providers = index.providers.len(),
            "Root index loaded"
        );
        Ok(index)
    }

    fn resolve(&self, reference: &str) -> Result<Url, FetchError> {
        self.base
            .join(reference)
            .map_err(|e| FetchError::Malformed(format!("invalid URL '{}': {}", reference, e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, FetchError> {
        debug!(%url, "GET");
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn fetch_metadata(
        &self,
        template: &str,
        file: &str,
        name: &str,
    ) -> Result<Vec<PackageRelease>, FetchError> {
        let url = self.resolve(&template.replace("%package%", file))?;
        let metadata: MetadataJson = self.get_json(&url).await?;

        let versions = metadata
            .packages
            .into_iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, versions)| versions_from_value(versions))
            .unwrap_or_default();

        let versions = match metadata.minified.as_deref() {
            Some(format) if format.starts_with("composer/2") => expand_minified(versions),
            _ => versions,
        };

        releases_from_values(versions, Some(name))
    }

    /// Tagged releases from `<name>.json` plus development releases from
    /// `<name>~dev.json`. When only the dev file fails, the tagged releases
    /// are returned inside [`FetchError::Incomplete`].
    async fn fetch_split_metadata(
        &self,
        template: &str,
        name: &str,
    ) -> Result<Vec<PackageRelease>, FetchError> {
        let mut releases = self.fetch_metadata(template, name, name).await?;

        let dev_file = format!("{}~dev", name);
        match self.fetch_metadata(template, &dev_file, name).await {
            Ok(dev_releases) => releases.extend(dev_releases),
            Err(FetchError::Status { status: 404, .. }) => {
                debug!(package = %name, "No dev metadata published");
            }
            Err(e) => {
                warn!(package = %name, error = %e, "Dev metadata fetch failed");
                return Err(FetchError::Incomplete {
                    releases,
                    cause: Box::new(e),
                });
            }
        }

        Ok(releases)
    }
}

#[async_trait]
impl NameIndexedRepository for ComposerRepository {
    fn name(&self) -> &str {
        &self.label
    }

    #[instrument(skip(self), fields(repository = %self.label))]
    async fn list_names(&self) -> Result<Vec<String>, FetchError> {
        let index = self.index().await?;

        if let Some(names) = &index.available_packages {
            return Ok(names.clone());
        }

        if let Some(list) = &index.list_url {
            let names: PackageNamesJson = self.get_json(&self.resolve(list)?).await?;
            return Ok(names.package_names);
        }

        let names: BTreeSet<&String> = index.inline.keys().chain(index.providers.keys()).collect();
        if !names.is_empty() {
            return Ok(names.into_iter().cloned().collect());
        }

        Err(FetchError::MissingIndex(self.label.clone()))
    }

    async fn fetch_releases_by_name(&self, name: &str) -> Result<Vec<PackageRelease>, FetchError> {
        let index = self.index().await?;
        let key = name.to_lowercase();

        if let Some(versions) = index.inline.get(&key) {
            return releases_from_values(versions.clone(), Some(name));
        }

        // v1 provider repositories publish no metadata-url
        if index.metadata_url.is_none() {
            if let (Some(template), Some(hash)) = (&index.providers_url, index.providers.get(&key))
            {
                let template = template.replace("%hash%", hash);
                return self.fetch_metadata(&template, name, name).await;
            }
        }

        let template = index.metadata_url.as_deref().unwrap_or(DEFAULT_METADATA_URL);
        self.fetch_split_metadata(template, name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn repository(url: &str) -> ComposerRepository {
        ComposerRepository::new(url, reqwest::Client::new()).unwrap()
    }

    #[tokio::test]
    async fn test_available_packages_index() {
        let mut server = Server::new_async().await;
        let root = server
            .mock("GET", "/packages.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"metadata-url": "/p2/%package%.json", "available-packages": ["app/x", "app/y"]}"#)
            .expect(1)
            .create_async()
            .await;

        let repo = repository(&server.url());
        assert_eq!(repo.list_names().await.unwrap(), vec!["app/x", "app/y"]);
        // root index is memoized
        assert_eq!(repo.list_names().await.unwrap().len(), 2);

        root.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_url_index() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/packages.json")
            .with_status(200)
            .with_body(r#"{"metadata-url": "/p2/%package%.json", "list": "/packages/list.json"}"#)
            .create_async()
            .await;
        let list = server
            .mock("GET", "/packages/list.json")
            .with_status(200)
            .with_body(r#"{"packageNames": ["acme/logger", "app/x"]}"#)
            .create_async()
            .await;

        let repo = repository(&server.url());
        assert_eq!(repo.list_names().await.unwrap(), vec!["acme/logger", "app/x"]);
        list.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_index() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/packages.json")
            .with_status(200)
            .with_body(r#"{"packages": []}"#)
            .create_async()
            .await;

        let repo = repository(&server.url());
        assert!(matches!(
            repo.list_names().await,
            Err(FetchError::MissingIndex(_))
        ));
    }

    #[tokio::test]
    async fn test_root_index_failure() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/packages.json")
            .with_status(503)
            .create_async()
            .await;

        let repo = repository(&server.url());
        assert!(matches!(
            repo.list_names().await,
            Err(FetchError::Status { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_minified_tags_and_dev() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/packages.json")
            .with_status(200)
            .with_body(r#"{"metadata-url": "/p2/%package%.json", "available-packages": ["app/x"]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/p2/app/x.json")
            .with_status(200)
            .with_body(
                r#"{
                    "minified": "composer/2.0",
                    "packages": {
                        "app/x": [
                            {"name": "app/x", "version": "1.1.0", "version_normalized": "1.1.0.0", "require": {"acme/logger": "^2.0"}},
                            {"version": "1.0.0", "version_normalized": "1.0.0.0", "require": "__unset"}
                        ]
                    }
                }"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/p2/app/x~dev.json")
            .with_status(200)
            .with_body(
                r#"{
                    "minified": "composer/2.0",
                    "packages": {
                        "app/x": [
                            {"name": "app/x", "version": "dev-main", "require-dev": {"acme/logger": "*"},
                             "extra": {"branch-alias": {"dev-main": "2.x-dev"}}}
                        ]
                    }
                }"#,
            )
            .create_async()
            .await;

        let repo = repository(&server.url());
        let releases = repo.fetch_releases_by_name("app/x").await.unwrap();

        let labels: Vec<String> = releases.iter().map(|r| r.pretty_string()).collect();
        assert_eq!(labels, vec!["app/x 1.1.0", "app/x 1.0.0", "app/x dev-main", "app/x 2.x-dev"]);

        assert_eq!(releases[0].prod_links()["acme/logger"].constraint, "^2.0");
        assert!(releases[1].prod_links().is_empty());
        assert_eq!(releases[2].dev_links()["acme/logger"].constraint, "*");
        assert!(releases[3].is_alias());
    }

    #[tokio::test]
    async fn test_missing_dev_file_is_not_an_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/packages.json")
            .with_status(200)
            .with_body(r#"{"available-packages": ["app/x"]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/p2/app/x.json")
            .with_status(200)
            .with_body(r#"{"packages": {"app/x": [{"name": "app/x", "version": "1.0.0"}]}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/p2/app/x~dev.json")
            .with_status(404)
            .create_async()
            .await;

        let repo = repository(&server.url());
        let releases = repo.fetch_releases_by_name("app/x").await.unwrap();
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].version(), "1.0.0.0");
    }

    #[tokio::test]
    async fn test_missing_package_is_status_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/packages.json")
            .with_status(200)
            .with_body(r#"{"available-packages": ["app/x"]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/p2/app/x.json")
            .with_status(404)
            .create_async()
            .await;

        let repo = repository(&server.url());
        assert!(matches!(
            repo.fetch_releases_by_name("app/x").await,
            Err(FetchError::Status { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_inline_packages_served_from_root() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/packages.json")
            .with_status(200)
            .with_body(
                r#"{"packages": {"app/x": {"1.0.0": {"name": "app/x", "version": "1.0.0", "require": {"acme/logger": "~1.0"}}}}}"#,
            )
            .create_async()
            .await;

        let repo = repository(&server.url());
        assert_eq!(repo.list_names().await.unwrap(), vec!["app/x"]);

        let releases = repo.fetch_releases_by_name("app/x").await.unwrap();
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].prod_links()["acme/logger"].constraint, "~1.0");
    }

    #[tokio::test]
    async fn test_includes_are_merged_into_index() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/packages.json")
            .with_status(200)
            .with_body(r#"{"packages": [], "includes": {"include/all.json": {"sha1": "4f1c"}}}"#)
            .create_async()
            .await;
        let include = server
            .mock("GET", "/include/all.json")
            .with_status(200)
            .with_body(
                r#"{"packages": {
                    "App/X": {"1.0.0": {"name": "app/x", "version": "1.0.0", "require": {"acme/logger": "^1.0"}}},
                    "app/y": {"dev-main": {"name": "app/y", "version": "dev-main"}}
                }}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let repo = repository(&server.url());
        assert_eq!(repo.list_names().await.unwrap(), vec!["app/x", "app/y"]);

        let releases = repo.fetch_releases_by_name("app/x").await.unwrap();
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].prod_links()["acme/logger"].constraint, "^1.0");

        include.assert_async().await;
    }

    #[tokio::test]
    async fn test_provider_includes_index() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/packages.json")
            .with_status(200)
            .with_body(
                r#"{
                    "packages": [],
                    "providers-url": "/p/%package%$%hash%.json",
                    "provider-includes": {"p/provider-latest$%hash%.json": {"sha256": "aaa"}}
                }"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/p/provider-latest$aaa.json")
            .with_status(200)
            .with_body(r#"{"providers": {"app/x": {"sha256": "bbb"}, "app/y": {"sha256": "ccc"}}}"#)
            .create_async()
            .await;
        let provider = server
            .mock("GET", "/p/app/x$bbb.json")
            .with_status(200)
            .with_body(
                r#"{"packages": {"app/x": {
                    "1.0.0": {"name": "app/x", "version": "1.0.0"},
                    "dev-master": {"name": "app/x", "version": "dev-master", "require": {"acme/logger": "^2.0"}}
                }}}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let repo = repository(&server.url());
        assert_eq!(repo.list_names().await.unwrap(), vec!["app/x", "app/y"]);

        let releases = repo.fetch_releases_by_name("app/x").await.unwrap();
        assert_eq!(releases.len(), 2);
        let dev = releases
            .iter()
            .find(|r| r.pretty_version() == "dev-master")
            .unwrap();
        assert!(dev.is_development_release());
        assert_eq!(dev.prod_links()["acme/logger"].constraint, "^2.0");

        provider.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_dev_file_keeps_tagged_releases() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/packages.json")
            .with_status(200)
            .with_body(r#"{"available-packages": ["app/x"]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/p2/app/x.json")
            .with_status(200)
            .with_body(r#"{"packages": {"app/x": [{"name": "app/x", "version": "1.0.0"}]}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/p2/app/x~dev.json")
            .with_status(500)
            .create_async()
            .await;

        let repo = repository(&server.url());
        match repo.fetch_releases_by_name("app/x").await {
            Err(FetchError::Incomplete { releases, cause }) => {
                assert_eq!(releases.len(), 1);
                assert_eq!(releases[0].pretty_version(), "1.0.0");
                assert!(matches!(*cause, FetchError::Status { status: 500, .. }));
            }
            other => panic!("expected incomplete fetch, got {:?}", other),
        }
    }

    #[test]
    fn test_label_strips_trailing_slash() {
        let repo = repository("https://repo.example.org/");
        assert_eq!(repo.name(), "https://repo.example.org");
        assert_eq!(repo.url().as_str(), "https://repo.example.org/");
    }
}
