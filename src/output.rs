//! Terminal and JSON renderings of scan events.

use console::style;
use global_depends::{MatchRecord, ProgressTick, ReportSink, RepositoryError, ScanSummary};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::Write;
use std::time::Duration;
use tracing::warn;

const PROGRESS_TEMPLATE: &str = "{pos:>6} {spinner} {elapsed:>4}   {wide_msg}";

/// Progress line on stderr, matches on stdout above it.
pub struct ConsoleSink {
    target: String,
    progress: ProgressBar,
}

impl ConsoleSink {
    pub fn new(target: impl Into<String>) -> Self {
        let progress = ProgressBar::new_spinner();
        progress.set_style(
            ProgressStyle::with_template(PROGRESS_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        progress.enable_steady_tick(Duration::from_millis(120));

        Self {
            target: target.into(),
            progress,
        }
    }

    pub fn print_summary(&self, summary: &ScanSummary) {
        let mut line = format!(
            "{} releases scanned, {} dependents found",
            summary.processed, summary.matches
        );
        if summary.repository_errors > 0 {
            line.push_str(&format!(
                ", {} repository errors",
                style(summary.repository_errors).red()
            ));
        }
        if summary.interrupted {
            line.push_str(" (interrupted)");
        }
        eprintln!("{}", line);
    }
}

impl ReportSink for ConsoleSink {
    fn on_progress(&mut self, tick: &ProgressTick) {
        self.progress.set_position(tick.processed_count);
        self.progress.set_message(tick.current_label.clone());
    }

    fn on_match(&mut self, record: &MatchRecord) {
        let line = format!(
            "{} {} {} {}",
            style(format!("[{}]", record.release.pretty_string())).green(),
            style(record.category.section()).yellow(),
            self.target,
            record.constraint
        );
        self.progress.suspend(|| println!("{}", line));
    }

    fn on_repository_error(&mut self, error: &RepositoryError) {
        self.progress
            .println(format!("{} {}", style("✗").red().bold(), style(error).red()));
    }

    fn on_finished(&mut self, _overall_success: bool) {
        self.progress.finish_and_clear();
    }
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum JsonEvent<'a> {
    Match {
        package: &'a str,
        version: &'a str,
        version_normalized: &'a str,
        section: &'static str,
        target: &'a str,
        constraint: &'a str,
    },
    RepositoryError {
        repository: &'a str,
        package: Option<&'a str>,
        message: &'a str,
    },
    Summary {
        success: bool,
        #[serde(flatten)]
        summary: &'a ScanSummary,
    },
}

/// One JSON object per line; progress is not reported.
pub struct JsonLinesSink<W: Write + Send> {
    target: String,
    writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W, target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            writer,
        }
    }

    pub fn write_summary(&mut self, summary: &ScanSummary, success: bool) {
        self.emit(&JsonEvent::Summary { success, summary });
    }

    fn emit(&mut self, event: &JsonEvent<'_>) {
        let written = serde_json::to_writer(&mut self.writer, event)
            .map_err(std::io::Error::from)
            .and_then(|()| writeln!(self.writer));
        if let Err(e) = written {
            warn!(error = %e, "Failed to write JSON event");
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> ReportSink for JsonLinesSink<W> {
    fn on_progress(&mut self, _tick: &ProgressTick) {}

    fn on_match(&mut self, record: &MatchRecord) {
        let target = self.target.clone();
        self.emit(&JsonEvent::Match {
            package: record.release.name(),
            version: record.release.pretty_version(),
            version_normalized: record.release.version(),
            section: record.category.section(),
            target: &target,
            constraint: &record.constraint,
        });
    }

    fn on_repository_error(&mut self, error: &RepositoryError) {
        self.emit(&JsonEvent::RepositoryError {
            repository: &error.repository,
            package: error.package.as_deref(),
            message: &error.message,
        });
    }

    fn on_finished(&mut self, _overall_success: bool) {
        if let Err(e) = self.writer.flush() {
            warn!(error = %e, "Failed to flush JSON output");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use global_depends::{LinkCategory, PackageRelease};

    #[test]
    fn test_json_lines() {
        let mut sink = JsonLinesSink::new(Vec::new(), "acme/logger");
        sink.on_match(&MatchRecord {
            release: PackageRelease::new("app/x", "dev-master"),
            category: LinkCategory::Dev,
            constraint: "^2.0".to_string(),
        });
        sink.on_repository_error(&RepositoryError::for_package("repo", "app/y", "timed out"));
        sink.write_summary(&ScanSummary::default(), true);

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["event"], "match");
        assert_eq!(lines[0]["section"], "require-dev");
        assert_eq!(lines[0]["target"], "acme/logger");
        assert_eq!(lines[0]["package"], "app/x");
        assert_eq!(lines[1]["event"], "repository_error");
        assert_eq!(lines[1]["package"], "app/y");
        assert_eq!(lines[2]["event"], "summary");
        assert_eq!(lines[2]["success"], true);
        assert_eq!(lines[2]["processed"], 0);
    }

    /// Accepts writes, refuses to flush.
    struct BrokenPipe(Vec<u8>);

    impl Write for BrokenPipe {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn test_flush_failure_is_not_fatal() {
        let mut sink = JsonLinesSink::new(BrokenPipe(Vec::new()), "acme/logger");
        sink.on_repository_error(&RepositoryError::for_repository("repo", "offline"));
        sink.on_finished(true);
        sink.write_summary(&ScanSummary::default(), true);

        let output = String::from_utf8(sink.into_inner().0).unwrap();
        assert_eq!(output.lines().count(), 2);
    }
}
