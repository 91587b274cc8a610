//! Release gating by search policy.

use crate::model::PackageRelease;
use crate::policy::SearchPolicy;

/// Decides whether a release should have its links inspected.
///
/// Alias releases are always skipped: they carry the links of the release
/// they point at, which is listed separately.
pub fn should_inspect(release: &PackageRelease, policy: &SearchPolicy) -> bool {
    if release.is_alias() {
        return false;
    }

    if release.is_development_release() {
        policy.include_dev_releases()
    } else {
        policy.include_tagged_releases()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policies() -> Vec<SearchPolicy> {
        vec![
            SearchPolicy::dev_only("acme/logger").unwrap(),
            SearchPolicy::tagged_only("acme/logger").unwrap(),
            SearchPolicy::all("acme/logger").unwrap(),
        ]
    }

    #[test]
    fn test_alias_never_inspected() {
        let dev_alias = PackageRelease::new("app/x", "1.0.x-dev").as_alias_of("dev-master");
        let tagged_alias = PackageRelease::new("app/x", "1.0.0").as_alias_of("1.0.0.0");

        for policy in policies() {
            assert!(!should_inspect(&dev_alias, &policy));
            assert!(!should_inspect(&tagged_alias, &policy));
        }
    }

    #[test]
    fn test_dev_only_excludes_tags() {
        let policy = SearchPolicy::dev_only("acme/logger").unwrap();
        assert!(should_inspect(&PackageRelease::new("app/x", "dev-main"), &policy));
        assert!(!should_inspect(&PackageRelease::new("app/x", "1.0.0"), &policy));
    }

    #[test]
    fn test_tagged_only_excludes_dev() {
        let policy = SearchPolicy::tagged_only("acme/logger").unwrap();
        assert!(!should_inspect(&PackageRelease::new("app/x", "dev-main"), &policy));
        assert!(should_inspect(&PackageRelease::new("app/x", "1.0.0"), &policy));
    }

    #[test]
    fn test_combined_mode_includes_everything_but_aliases() {
        let policy = SearchPolicy::all("acme/logger").unwrap();
        assert!(should_inspect(&PackageRelease::new("app/x", "dev-main"), &policy));
        assert!(should_inspect(&PackageRelease::new("app/x", "1.0.0"), &policy));
    }
}
