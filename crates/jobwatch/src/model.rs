use std::fmt;

use serde::{Deserialize, Deserializer};

/// Remote status category as reported by the job server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    Queued,
    Running,
    Succeeded,
    Failed,
    #[serde(alias = "cancelled")]
    Canceled,
    #[serde(other)]
    Unknown,
}

impl StatusCategory {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One status fetch result. Replaced wholesale on every successful fetch.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BuildSnapshot {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub number: u64,
    #[serde(default)]
    pub name: String,
    pub status: StatusCategory,
    #[serde(default, deserialize_with = "deserialize_percent")]
    pub percent: u8,
    #[serde(default)]
    pub message: String,
    #[serde(default, alias = "web_url")]
    pub url: String,
}

impl BuildSnapshot {
    /// Percent complete, only while the job is running.
    pub fn running_percent(&self) -> Option<u8> {
        (self.status == StatusCategory::Running).then_some(self.percent)
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

fn deserialize_percent<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0);
    if !raw.is_finite() {
        return Ok(0);
    }
    Ok(raw.clamp(0.0, 100.0).floor() as u8)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Plain,
}

/// A single normalized console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub timestamp: Option<String>,
    pub severity: Severity,
    pub text: String,
}

impl LogLine {
    pub fn display(&self) -> String {
        match self.timestamp.as_deref() {
            Some(ts) => format!("[{ts}] {}", self.text),
            None => self.text.clone(),
        }
    }
}

/// Append-only log for one session.
///
/// The remote log is re-fetched in full, so the buffer remembers how many raw
/// bytes it has consumed. Only newline-terminated lines are taken; an
/// unterminated tail stays pending until it is completed or flushed.
#[derive(Debug, Default)]
pub struct LogBuffer {
    lines: Vec<LogLine>,
    consumed: usize,
    pending: String,
}

impl LogBuffer {
    /// Splits off the complete lines of the accumulated `raw` log that were not
    /// taken yet. A log shorter than what was consumed yields nothing.
    pub fn take_complete<'a>(&mut self, raw: &'a str) -> &'a str {
        let Some(rest) = raw.get(self.consumed..) else {
            self.pending.clear();
            return "";
        };
        let end = rest.rfind('\n').map_or(0, |i| i + 1);
        self.consumed += end;
        self.pending = rest[end..].to_string();
        &rest[..end]
    }

    /// Takes the unterminated tail, e.g. once no further fetch will complete it.
    pub fn take_pending(&mut self) -> String {
        self.consumed += self.pending.len();
        std::mem::take(&mut self.pending)
    }

    /// Appends normalized lines. Returns the number of lines appended.
    pub fn append(&mut self, normalized: Vec<LogLine>) -> usize {
        let added = normalized.len();
        self.lines.extend(normalized);
        added
    }

    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The last `rows` lines (or fewer when the buffer is shorter).
    pub fn tail(&self, rows: usize) -> &[LogLine] {
        let start = self.lines.len().saturating_sub(rows);
        &self.lines[start..]
    }
}
