//! Scan orchestration.
//!
//! [`ScanOrchestrator`] drives one run across every configured repository:
//! - Repositories are walked strictly in configuration order
//! - Every release yielded produces one [`ProgressTick`] before it is classified
//! - Isolated fetch failures are reported through the sink and never end the run
//! - A [`StopHandle`] ends the run early with whatever was found so far

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::classifier::should_inspect;
use crate::config::ScanConfig;
use crate::matcher::find_matches;
use crate::model::{MatchRecord, PackageRelease, ProgressTick, RepositoryError};
use crate::policy::{PolicyError, SearchPolicy};
use crate::sink::CollectingSink;
use crate::traits::{ReportSink, RepositorySource};
use crate::walker::{RepositoryWalker, WalkEvent};

// ============================================================================
// Scan Types
// ============================================================================

/// Errors that end a run as a whole. Isolated fetch failures are never
/// reported this way.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FatalError {
    #[error("Invalid search policy: {0}")]
    InvalidPolicy(#[from] PolicyError),

    #[error("Scan was already started; a scan runs exactly once")]
    AlreadyStarted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Running,
    Finished,
}

/// Cooperative stop request shared between the caller and a running scan.
///
/// Once stopped, no new repository or package-name fetch is scheduled.
/// Fetches already in flight are allowed to finish and their results are
/// still reported.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters for a finished run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// Repositories walked, including ones whose listing failed
    pub repositories: usize,

    /// Releases examined, before classification
    pub processed: u64,

    /// Match records emitted
    pub matches: u64,

    /// Isolated repository and package failures
    pub repository_errors: u64,

    /// Whether the run ended on a stop request
    pub interrupted: bool,
}

/// Everything a run emitted, collected in memory.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub summary: ScanSummary,
    pub ticks: Vec<ProgressTick>,
    pub matches: Vec<MatchRecord>,
    pub errors: Vec<RepositoryError>,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Runs the reverse-dependency search for one [`SearchPolicy`].
///
/// ```ignore
/// let mut orchestrator = ScanOrchestrator::new(repositories, policy)
///     .with_config(ScanConfig::default().with_concurrency(16));
/// let stop = orchestrator.stop_handle();
///
/// let summary = orchestrator.run(&mut sink).await?;
/// println!("{} releases scanned", summary.processed);
/// ```
pub struct ScanOrchestrator {
    repositories: Vec<RepositorySource>,
    policy: SearchPolicy,
    config: ScanConfig,
    stop: StopHandle,
    state: ScanState,
    progress: ProgressTick,
}

impl ScanOrchestrator {
    pub fn new(repositories: Vec<RepositorySource>, policy: SearchPolicy) -> Self {
        Self {
            repositories,
            policy,
            config: ScanConfig::default(),
            stop: StopHandle::default(),
            state: ScanState::Idle,
            progress: ProgressTick::default(),
        }
    }

    pub fn with_config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses `stop` instead of the orchestrator's own handle.
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn policy(&self) -> &SearchPolicy {
        &self.policy
    }

    /// Runs the scan, reporting every event to `sink`.
    ///
    /// `sink.on_finished` is called exactly once per call, with `false` only
    /// when the run fails as a whole.
    ///
    /// # Errors
    ///
    /// Returns [`FatalError::AlreadyStarted`] when called a second time.
    #[instrument(skip(self, sink), fields(target = %self.policy.target()))]
    pub async fn run(&mut self, sink: &mut dyn ReportSink) -> Result<ScanSummary, FatalError> {
        if self.state != ScanState::Idle {
            warn!(state = ?self.state, "Refusing to restart scan");
            sink.on_finished(false);
            return Err(FatalError::AlreadyStarted);
        }

        self.state = ScanState::Running;
        info!(
            repositories = self.repositories.len(),
            dev = self.policy.include_dev_releases(),
            tagged = self.policy.include_tagged_releases(),
            "Scan started"
        );

        let summary = self.search(sink).await;

        self.state = ScanState::Finished;

        info!(
            processed = summary.processed,
            matches = summary.matches,
            repository_errors = summary.repository_errors,
            interrupted = summary.interrupted,
            "Scan finished"
        );
        sink.on_finished(true);

        Ok(summary)
    }

    async fn search(&mut self, sink: &mut dyn ReportSink) -> ScanSummary {
        let walker = RepositoryWalker::new(self.config.executor(), self.stop.clone());
        let mut summary = ScanSummary::default();

        for source in &self.repositories {
            if self.stop.is_stopped() {
                break;
            }

            info!(repository = %source.name(), kind = source.kind(), "Searching repository");

            let events = walker.walk(source);
            futures::pin_mut!(events);

            while let Some(event) = events.next().await {
                match event {
                    WalkEvent::Release(release) => {
                        inspect_release(
                            &release,
                            &self.policy,
                            &mut self.progress,
                            sink,
                            &mut summary,
                        );
                    }
                    WalkEvent::Failed(error) => {
                        summary.repository_errors += 1;
                        sink.on_repository_error(&error);
                    }
                }
            }

            summary.repositories += 1;
        }

        summary.processed = self.progress.processed_count;
        summary.interrupted = self.stop.is_stopped();
        summary
    }
}

fn inspect_release(
    release: &PackageRelease,
    policy: &SearchPolicy,
    progress: &mut ProgressTick,
    sink: &mut dyn ReportSink,
    summary: &mut ScanSummary,
) {
    progress.processed_count += 1;
    progress.current_label = release.pretty_string();
    sink.on_progress(progress);

    if !should_inspect(release, policy) {
        return;
    }

    for (category, constraint) in find_matches(release, policy.target()) {
        debug!(release = %progress.current_label, %category, constraint, "Dependency found");
        summary.matches += 1;
        sink.on_match(&MatchRecord {
            release: release.clone(),
            category,
            constraint: constraint.to_string(),
        });
    }
}

/// Runs one scan and collects everything it emits.
///
/// # Errors
///
/// Fails only on a [`FatalError`]; unreachable repositories are listed in
/// [`ScanReport::errors`].
pub async fn scan(
    repositories: Vec<RepositorySource>,
    policy: SearchPolicy,
    config: ScanConfig,
) -> Result<ScanReport, FatalError> {
    let mut sink = CollectingSink::default();
    let summary = ScanOrchestrator::new(repositories, policy)
        .with_config(config)
        .run(&mut sink)
        .await?;

    Ok(ScanReport {
        summary,
        ticks: sink.ticks,
        matches: sink.matches,
        errors: sink.errors,
    })
}

// ============================================================================
// Tests
// ============================================================================
