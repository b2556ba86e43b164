//! Report progress reporting.
//!
//! Reports which section of `akr report` is running and how many files it
//! produced. Progress is emitted on **stderr** so stdout remains parseable
//! for scripts.

use std::io::Write;

/// A single progress event for a report run.
#[derive(Clone, Debug)]
pub enum ReportProgressEvent {
    /// Section `n` of `total` has started.
    Started { section: String, n: u64, total: u64 },
    /// A section finished and wrote `files` tables.
    Finished { section: String, files: u64 },
}

/// Reports report progress. Implementations write to stderr (human or JSON).
pub trait ReportProgressReporter: Send + Sync {
    fn report(&self, event: ReportProgressEvent);
}

/// Human-friendly progress on stderr: "report [2/4] precision  running...".
pub struct StderrProgress;

impl ReportProgressReporter for StderrProgress {
    fn report(&self, event: ReportProgressEvent) {
        let line = match &event {
            ReportProgressEvent::Started { section, n, total } => {
                format!("report [{}/{}] {}  running...\n", n, total, section)
            }
            ReportProgressEvent::Finished { section, files } => {
                format!(
                    "report {}  done  {} {}\n",
                    section,
                    format_number(*files),
                    if *files == 1 { "file" } else { "files" }
                )
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ReportProgressReporter for JsonProgress {
    fn report(&self, event: ReportProgressEvent) {
        let obj = match &event {
            ReportProgressEvent::Started { section, n, total } => serde_json::json!({
                "event": "progress",
                "section": section,
                "phase": "started",
                "n": n,
                "total": total
            }),
            ReportProgressEvent::Finished { section, files } => serde_json::json!({
                "event": "progress",
                "section": section,
                "phase": "finished",
                "files": files
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ReportProgressReporter for NoProgress {
    fn report(&self, _event: ReportProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ReportProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
