//! Enumerable repository over explicit package definitions.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::model::PackageRelease;
use crate::repository::metadata::{releases_from_values, versions_from_value};
use crate::traits::{EnumerableRepository, FetchError};

#[derive(Debug, Clone)]
enum Definitions {
    Inline(Vec<Value>),
    File(PathBuf),
}

/// Package versions given inline (composer.json `type: package`) or read
/// from a JSON file when listed.
///
/// A file may hold a single version object, an array of them, or a
/// `{"packages": {name: {version: {...}}}}` document.
#[derive(Debug, Clone)]
pub struct PackageRepository {
    label: String,
    definitions: Definitions,
}

impl PackageRepository {
    pub fn inline(label: impl Into<String>, packages: Vec<Value>) -> Self {
        Self {
            label: label.into(),
            definitions: Definitions::Inline(packages),
        }
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            label: path.display().to_string(),
            definitions: Definitions::File(path),
        }
    }
}

async fn read_definitions(path: &Path) -> Result<Vec<Value>, FetchError> {
    let bytes = tokio::fs::read(path).await?;
    let document: Value = serde_json::from_slice(&bytes)?;
    Ok(package_values(document))
}

/// Flattens any accepted document shape into a list of version objects.
pub fn package_values(document: Value) -> Vec<Value> {
    match document {
        Value::Array(versions) => versions,
        Value::Object(mut fields) => match fields.remove("packages") {
            Some(Value::Object(by_name)) => by_name
                .into_iter()
                .flat_map(|(_, versions)| versions_from_value(versions))
                .collect(),
            Some(other) => versions_from_value(other),
            None => vec![Value::Object(fields)],
        },
        _ => Vec::new(),
    }
}

#[async_trait]
impl EnumerableRepository for PackageRepository {
    fn name(&self) -> &str {
        &self.label
    }

    async fn list_all_releases(&self) -> Result<Vec<PackageRelease>, FetchError> {
        let values = match &self.definitions {
            Definitions::Inline(packages) => packages.clone(),
            Definitions::File(path) => read_definitions(path).await?,
        };

        debug!(repository = %self.label, definitions = values.len(), "Package definitions loaded");
        releases_from_values(values, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[tokio::test]
    async fn test_inline_definitions() {
        let repo = PackageRepository::inline(
            "inline",
            vec![
                json!({"name": "app/x", "version": "dev-master", "require": {"acme/logger": "^2.0"}}),
                json!({"name": "app/y", "version": "1.0.0"}),
            ],
        );

        let releases = repo.list_all_releases().await.unwrap();
        assert_eq!(releases.len(), 2);
        assert_eq!(releases[0].pretty_string(), "app/x dev-master");
        assert_eq!(repo.name(), "inline");
    }

    #[tokio::test]
    async fn test_file_with_packages_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"packages": {{"app/x": {{"1.0.0": {{"name": "app/x", "version": "1.0.0"}}, "dev-main": {{"name": "app/x", "version": "dev-main"}}}}}}}}"#
        )
        .unwrap();

        let repo = PackageRepository::from_file(file.path());
        let releases = repo.list_all_releases().await.unwrap();
        assert_eq!(releases.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let repo = PackageRepository::from_file(dir.path().join("missing.json"));

        assert!(matches!(
            repo.list_all_releases().await,
            Err(FetchError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_json_is_malformed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let repo = PackageRepository::from_file(file.path());
        assert!(matches!(
            repo.list_all_releases().await,
            Err(FetchError::Malformed(_))
        ));
    }

    #[test]
    fn test_package_values_shapes() {
        assert_eq!(package_values(json!({"name": "a/b", "version": "1.0"})).len(), 1);
        assert_eq!(package_values(json!([{"name": "a/b"}, {"name": "c/d"}])).len(), 2);
        assert_eq!(package_values(json!({"packages": {"a/b": [{"name": "a/b"}]}})).len(), 1);
        assert!(package_values(json!("nope")).is_empty());
    }
}
