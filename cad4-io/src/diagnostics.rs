use std::error::Error;
use std::fmt;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{error, info, warn};

/// 日志时间戳的显示格式。
const TIMESTAMP_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub severity: Severity,
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.severity,
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.message
        )
    }
}

/// 一次读取过程中的诊断记录，调用方可在读取结束（包括失败）后查看。
///
/// 每条记录同时作为 `tracing` 事件发出。
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiagnosticLog {
    entries: Vec<LogEntry>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.severity == severity)
            .count()
    }

    pub fn log_info(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(target: "cad4::diagnostics", "{message}");
        self.push(Severity::Info, message);
    }

    pub fn log_warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(target: "cad4::diagnostics", "{message}");
        self.push(Severity::Warning, message);
    }

    pub fn log_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!(target: "cad4::diagnostics", "{message}");
        self.push(Severity::Error, message);
    }

    /// 记录错误及其完整原因链，最内层原因在前。
    pub fn log_error_chain(&mut self, err: &(dyn Error + 'static)) {
        self.log_error(error_chain(err));
    }

    fn push(&mut self, severity: Severity, message: String) {
        self.entries.push(LogEntry {
            severity,
            timestamp: Local::now(),
            message,
        });
    }
}

impl<'a> IntoIterator for &'a DiagnosticLog {
    type Item = &'a LogEntry;
    type IntoIter = std::slice::Iter<'a, LogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// 把错误链拼成一行，最内层原因在前。
pub fn error_chain(err: &(dyn Error + 'static)) -> String {
    let mut messages = Vec::new();
    let mut current = Some(err);
    while let Some(cause) = current {
        messages.push(cause.to_string());
        current = cause.source();
    }
    messages.reverse();
    messages.join(" <- ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("inner cause")]
    struct Inner;

    #[derive(Debug, Error)]
    #[error("outer failure")]
    struct Outer(#[source] Inner);

    #[test]
    fn chain_lists_innermost_cause_first() {
        let mut log = DiagnosticLog::new();
        log.log_error_chain(&Outer(Inner));
        assert_eq!(log.len(), 1);
        let entry = &log.entries()[0];
        assert_eq!(entry.severity, Severity::Error);
        assert_eq!(entry.message, "inner cause <- outer failure");
    }

    #[test]
    fn entries_render_with_severity_and_timestamp() {
        let mut log = DiagnosticLog::new();
        log.log_info("Reading CAD file");
        log.log_warning("layer not terminated");
        let rendered = log.entries()[0].to_string();
        assert!(rendered.starts_with("[INFO] "));
        assert!(rendered.ends_with(": Reading CAD file"));
        // [INFO] dd.mm.yyyy hh:mm:ss: ...
        let stamp = &rendered["[INFO] ".len().."[INFO] ".len() + 19];
        assert_eq!(stamp.as_bytes()[2], b'.');
        assert_eq!(stamp.as_bytes()[13], b':');
        assert_eq!(log.count(Severity::Warning), 1);

        log.reset();
        assert!(log.is_empty());
    }
}
