//! Ready-made [`ReportSink`] implementations.

use crate::model::{MatchRecord, ProgressTick, RepositoryError};
use crate::traits::ReportSink;
use tracing::{error, info, trace};

/// Keeps every event in memory.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    pub ticks: Vec<ProgressTick>,
    pub matches: Vec<MatchRecord>,
    pub errors: Vec<RepositoryError>,
    /// `None` until the run has finished
    pub finished: Option<bool>,
}

impl ReportSink for CollectingSink {
    fn on_progress(&mut self, tick: &ProgressTick) {
        self.ticks.push(tick.clone());
    }

    fn on_match(&mut self, record: &MatchRecord) {
        self.matches.push(record.clone());
    }

    fn on_repository_error(&mut self, error: &RepositoryError) {
        self.errors.push(error.clone());
    }

    fn on_finished(&mut self, overall_success: bool) {
        self.finished = Some(overall_success);
    }
}

/// Renders events as structured log records.
#[derive(Debug, Default)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn on_progress(&mut self, tick: &ProgressTick) {
        trace!(processed = tick.processed_count, current = %tick.current_label, "Progress");
    }

    fn on_match(&mut self, record: &MatchRecord) {
        info!(
            release = %record.release.pretty_string(),
            section = record.category.section(),
            constraint = %record.constraint,
            "Dependent release"
        );
    }

    fn on_repository_error(&mut self, err: &RepositoryError) {
        error!(
            repository = %err.repository,
            package = err.package.as_deref().unwrap_or("-"),
            message = %err.message,
            "Repository error"
        );
    }

    fn on_finished(&mut self, overall_success: bool) {
        info!(success = overall_success, "Scan finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LinkCategory, PackageRelease};

    #[test]
    fn test_collecting_sink_keeps_order() {
        let mut sink = CollectingSink::default();
        assert_eq!(sink.finished, None);

        sink.on_progress(&ProgressTick {
            processed_count: 1,
            current_label: "app/x dev-master".to_string(),
        });
        sink.on_match(&MatchRecord {
            release: PackageRelease::new("app/x", "dev-master"),
            category: LinkCategory::Prod,
            constraint: "^2.0".to_string(),
        });
        sink.on_repository_error(&RepositoryError::for_repository("down", "offline"));
        sink.on_finished(true);

        assert_eq!(sink.ticks.len(), 1);
        assert_eq!(sink.matches[0].constraint, "^2.0");
        assert_eq!(sink.errors[0].repository, "down");
        assert_eq!(sink.finished, Some(true));
    }
}
