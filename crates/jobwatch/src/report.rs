use std::io::Write;

use crate::poller::{FailureReport, FailureReporter};

/// Prints the failure breakdown of a job to stderr.
#[derive(Debug, Default)]
pub struct ConsoleFailureReporter;

impl FailureReporter for ConsoleFailureReporter {
    fn report_failure(&self, report: &FailureReport) {
        let mut err = std::io::stderr().lock();
        if let Err(e) = err.write_all(format_failure(report).as_bytes()) {
            tracing::warn!(error = %e, "failed to print failure report");
        }
    }
}

pub fn format_failure(report: &FailureReport) -> String {
    let mut out = String::new();
    out.push_str("FAILURE:\n");
    out.push_str(&format!("  job: #{} ({})\n", report.number, report.id));
    if !report.url.is_empty() {
        out.push_str(&format!("  details: {}\n", report.url));
    }
    let message = report.message.trim();
    if message.is_empty() {
        out.push_str("  reason: no status message reported\n");
    } else {
        out.push_str("  reason:\n");
        for line in message.lines() {
            out.push_str(&format!("    {line}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_multiline_reason() {
        let report = FailureReport {
            id: "42".into(),
            number: 7,
            url: "https://ci/42".into(),
            message: "step 3 failed\nexit code 2".into(),
        };
        assert_eq!(
            format_failure(&report),
            "FAILURE:\n  job: #7 (42)\n  details: https://ci/42\n  reason:\n    step 3 failed\n    exit code 2\n"
        );
    }

    #[test]
    fn empty_message_is_called_out() {
        let report = FailureReport {
            id: "1".into(),
            number: 1,
            url: String::new(),
            message: "  ".into(),
        };
        assert!(format_failure(&report).contains("no status message reported"));
    }
}
