//! Release enumeration for one repository.
//!
//! Enumerable repositories are listed in one call. Name-indexed repositories
//! are listed name by name; those per-name fetches run concurrently through
//! the [`FetchExecutor`] but their releases are yielded in name order.

use crate::executor::FetchExecutor;
use crate::model::{PackageRelease, RepositoryError};
use crate::scan::StopHandle;
use crate::traits::{FetchError, NameIndexedRepository, RepositorySource};
use futures::stream::{self, Stream, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One item of a repository walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEvent {
    Release(PackageRelease),
    Failed(RepositoryError),
}

pub struct RepositoryWalker {
    executor: FetchExecutor,
    stop: StopHandle,
}

impl RepositoryWalker {
    pub fn new(executor: FetchExecutor, stop: StopHandle) -> Self {
        Self { executor, stop }
    }

    /// Walks `source` once.
    ///
    /// Failures never end the stream early: a failed listing yields a single
    /// [`WalkEvent::Failed`] for the repository, a failed per-name fetch
    /// yields one for that name and the walk moves on to the next name.
    pub fn walk<'a>(&'a self, source: &'a RepositorySource) -> impl Stream<Item = WalkEvent> + 'a {
        async_stream::stream! {
            match source {
                RepositorySource::Enumerable(repository) => {
                    let name = repository.name();
                    match self.executor.execute(name, repository.list_all_releases()).await {
                        Ok(releases) => {
                            info!(
                                repository = %name,
                                releases = releases.len(),
                                "Repository listed"
                            );
                            for release in releases {
                                yield WalkEvent::Release(release);
                            }
                        }
                        Err(e) => {
                            warn!(repository = %name, error = %e, "Repository listing failed");
                            yield WalkEvent::Failed(RepositoryError::for_repository(name, e));
                        }
                    }
                }
                RepositorySource::NameIndexed(repository) => {
                    let fetches = self.fetch_by_name(repository);
                    futures::pin_mut!(fetches);
                    while let Some(event) = fetches.next().await {
                        yield event;
                    }
                }
            }
        }
    }

    fn fetch_by_name<'a>(
        &'a self,
        repository: &'a Arc<dyn NameIndexedRepository>,
    ) -> impl Stream<Item = WalkEvent> + 'a {
        async_stream::stream! {
            let repo_name = repository.name();

            let names = match self.executor.execute(repo_name, repository.list_names()).await {
                Ok(names) => names,
                Err(e) => {
                    warn!(repository = %repo_name, error = %e, "Package name index unavailable");
                    yield WalkEvent::Failed(RepositoryError::for_repository(repo_name, e));
                    Vec::new()
                }
            };

            if !names.is_empty() {
                info!(repository = %repo_name, names = names.len(), "Package names listed");
            }

            let stop = self.stop.clone();
            let lookups = stream::iter(names)
                .take_while(move |_| futures::future::ready(!stop.is_stopped()))
                .map(|name| async move {
                    let result = self
                        .executor
                        .execute(&name, repository.fetch_releases_by_name(&name))
                        .await;
                    (name, result)
                })
                .buffered(self.executor.concurrency_limit());
            futures::pin_mut!(lookups);

            while let Some((name, result)) = lookups.next().await {
                match result {
                    Ok(releases) => {
                        debug!(
                            repository = %repo_name,
                            package = %name,
                            releases = releases.len(),
                            "Package fetched"
                        );
                        for release in releases {
                            yield WalkEvent::Release(release);
                        }
                    }
                    Err(FetchError::Incomplete { releases, cause }) => {
                        warn!(
                            repository = %repo_name,
                            package = %name,
                            error = %cause,
                            "Package fetch incomplete"
                        );
                        for release in releases {
                            yield WalkEvent::Release(release);
                        }
                        let error = RepositoryError::for_package(repo_name, name, cause);
                        yield WalkEvent::Failed(error);
                    }
                    Err(e) => {
                        warn!(
                            repository = %repo_name,
                            package = %name,
                            error = %e,
                            "Package fetch failed"
                        );
                        yield WalkEvent::Failed(RepositoryError::for_package(repo_name, name, e));
                    }
                }
            }
        }
    }
}
