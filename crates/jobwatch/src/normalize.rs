//! Turns the raw accumulated console log of a remote job into display lines.
//!
//! The remote side prefixes most lines with a bracketed timestamp and an
//! optional one-letter severity marker (`[12:00:01] e: boom`). Shell noise is
//! dropped, and lines in any other shape are kept visible with an indent.

use crate::model::{LogLine, Severity};
use crate::session::PresentationMode;

const PASSTHROUGH_INDENT: &str = "    ";
const STEP_ANCHOR: &str = "[Step";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fallback {
    /// Drop unrecognized lines shorter than the timestamp threshold, indent the rest.
    DropShort,
    Indent,
}

#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    /// Smallest byte offset of the closing `]` for the prefix to count as a timestamp.
    min_stamp_end: usize,
    fallback: Fallback,
}

impl Normalizer {
    pub fn for_mode(mode: PresentationMode) -> Self {
        match mode {
            PresentationMode::Interactive => Self {
                min_stamp_end: 8,
                fallback: Fallback::DropShort,
            },
            PresentationMode::Quiet | PresentationMode::Plain => Self {
                min_stamp_end: 9,
                fallback: Fallback::Indent,
            },
        }
    }

    pub fn normalize(&self, raw: &str) -> Vec<LogLine> {
        raw.split('\n')
            .filter_map(|line| self.normalize_line(line))
            .collect()
    }

    pub fn normalize_line(&self, line: &str) -> Option<LogLine> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let trimmed = line.trim();
        if trimmed.is_empty() || is_noise(trimmed) {
            return None;
        }

        let Some((timestamp, rest)) = self.split_timestamp(line) else {
            return self.passthrough(trimmed);
        };

        let (severity, rest) = split_severity(rest);
        let rest = rest.strip_prefix(' ').unwrap_or(rest);
        let text = match rest.find(STEP_ANCHOR) {
            Some(pos) => rest[pos..].trim_end(),
            None => rest.trim(),
        };
        if text.is_empty() {
            return None;
        }

        Some(LogLine {
            timestamp: Some(timestamp.to_string()),
            severity,
            text: text.to_string(),
        })
    }

    fn split_timestamp<'a>(&self, line: &'a str) -> Option<(&'a str, &'a str)> {
        if !line.starts_with('[') {
            return None;
        }
        let close = line.find(']')?;
        if close < self.min_stamp_end {
            return None;
        }
        Some((&line[1..close], &line[close + 1..]))
    }

    fn passthrough(&self, trimmed: &str) -> Option<LogLine> {
        if self.fallback == Fallback::DropShort && trimmed.len() < self.min_stamp_end {
            return None;
        }
        Some(LogLine {
            timestamp: None,
            severity: Severity::Plain,
            text: format!("{PASSTHROUGH_INDENT}{trimmed}"),
        })
    }
}

fn is_noise(trimmed: &str) -> bool {
    trimmed.starts_with("export ")
        || trimmed.starts_with("exec ")
        || trimmed.contains("Current time:")
}

/// Consumes a marker directly after the timestamp: `X:` / ` X:` for a letter
/// `X`, or ` :` for an unmarked line.
fn split_severity(rest: &str) -> (Severity, &str) {
    let b = rest.as_bytes();
    if b.len() >= 2 && b[0] == b' ' && b[1] == b':' {
        return (Severity::Plain, &rest[2..]);
    }
    let at = usize::from(b.first() == Some(&b' '));
    if b.len() >= at + 2 && b[at].is_ascii_alphabetic() && b[at + 1] == b':' {
        return (severity_for(b[at]), &rest[at + 2..]);
    }
    (Severity::Plain, rest)
}

fn severity_for(marker: u8) -> Severity {
    match marker.to_ascii_lowercase() {
        b'i' => Severity::Info,
        b'w' => Severity::Warning,
        b'e' => Severity::Error,
        _ => Severity::Plain,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> Normalizer {
        Normalizer::for_mode(PresentationMode::Plain)
    }

    fn interactive() -> Normalizer {
        Normalizer::for_mode(PresentationMode::Interactive)
    }

    fn displayed(n: &Normalizer, raw: &str) -> Vec<String> {
        n.normalize(raw).iter().map(LogLine::display).collect()
    }

    #[test]
    fn drops_noise_and_markers() {
        let raw = "export FOO=bar\n[10:00:00] i: Step started\nCurrent time: X\n[10:00:01]w: disk low";
        for n in [plain(), interactive()] {
            assert_eq!(
                displayed(&n, raw),
                ["[10:00:00] Step started", "[10:00:01] disk low"]
            );
        }
    }

    #[test]
    fn severity_letters_map_and_are_removed() {
        let n = plain();
        let cases = [
            ("[10:00:00] i: a", Severity::Info),
            ("[10:00:00] I: a", Severity::Info),
            ("[10:00:00] e: a", Severity::Error),
            ("[10:00:00] E: a", Severity::Error),
            ("[10:00:00] w: a", Severity::Warning),
            ("[10:00:00]W: a", Severity::Warning),
            ("[10:00:00] x: a", Severity::Plain),
            ("[10:00:00] : a", Severity::Plain),
        ];
        for (raw, sev) in cases {
            let line = n.normalize_line(raw).unwrap();
            assert_eq!(line.severity, sev, "{raw}");
            assert_eq!(line.display(), "[10:00:00] a", "{raw}");
        }
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let line = plain()
            .normalize_line("[2024-01-01 10:00:00] e:    failed hard   \r")
            .unwrap();
        assert_eq!(line.timestamp.as_deref(), Some("2024-01-01 10:00:00"));
        assert_eq!(line.text, "failed hard");
    }

    #[test]
    fn step_marker_reanchors_content() {
        let line = plain()
            .normalize_line("[10:00:00] i: ##[group] noise [Step 3/7] Build")
            .unwrap();
        assert_eq!(line.text, "[Step 3/7] Build");
    }

    #[test]
    fn empty_content_after_marker_is_dropped() {
        assert!(plain().normalize_line("[10:00:00] i:   ").is_none());
        assert!(plain().normalize_line("   \t ").is_none());
        assert!(plain().normalize_line("   exec /bin/sh").is_none());
    }

    #[test]
    fn unrecognized_lines_depend_on_mode() {
        // `]` at offset 8 is a timestamp for the interactive view only.
        let raw = "[1:00:00] hello";
        assert_eq!(displayed(&interactive(), raw), ["[1:00:00] hello"]);
        assert_eq!(displayed(&plain(), raw), ["    [1:00:00] hello"]);

        assert!(interactive().normalize_line("ok").is_none());
        assert_eq!(displayed(&plain(), "ok"), ["    ok"]);
        assert_eq!(
            displayed(&interactive(), "legacy format line"),
            ["    legacy format line"]
        );
    }

    #[test]
    fn normalizing_twice_is_identical() {
        let raw = "[10:00:00] i: one\nplain text here\n[10:00:02] e: two\n";
        let n = interactive();
        assert_eq!(n.normalize(raw), n.normalize(raw));
    }

    #[test]
    fn multibyte_text_does_not_panic() {
        let n = plain();
        let line = n.normalize_line("[10:00:00]é: ünïcode").unwrap();
        assert_eq!(line.text, "é: ünïcode");
        assert!(n.normalize_line("[é]").is_some());
    }
}
