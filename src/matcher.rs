//! Link lookup for a single release.

use crate::model::{LinkCategory, PackageRelease};

/// Yields `(category, constraint)` for each section of `release` that
/// requires `target`, production first.
///
/// Lookup is an exact, case-sensitive key match; the constraint is returned
/// verbatim.
pub fn find_matches<'a>(
    release: &'a PackageRelease,
    target: &'a str,
) -> impl Iterator<Item = (LinkCategory, &'a str)> + 'a {
    [
        (LinkCategory::Prod, release.prod_links()),
        (LinkCategory::Dev, release.dev_links()),
    ]
    .into_iter()
    .filter_map(move |(category, links)| {
        links
            .get(target)
            .map(|link| (category, link.constraint.as_str()))
    })
}
