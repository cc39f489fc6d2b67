use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_INTERVAL_SECS: u64 = 5;
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationMode {
    /// Full-screen redrawing view.
    Interactive,
    /// Deltas only, for scripts and CI logs.
    Quiet,
    /// Single status line reprinted in place.
    Plain,
}

impl PresentationMode {
    pub fn from_flags(interactive: bool, quiet: bool) -> Result<Self> {
        match (interactive, quiet) {
            (true, true) => Err(Error::msg(
                "--interactive and --quiet cannot be used together",
            )),
            (true, false) => Ok(Self::Interactive),
            (false, true) => Ok(Self::Quiet),
            (false, false) => Ok(Self::Plain),
        }
    }

    /// The full-screen view needs a terminal; anything else is unaffected.
    pub fn for_stdout(self, stdout_is_tty: bool) -> Self {
        match self {
            Self::Interactive if !stdout_is_tty => Self::Plain,
            mode => mode,
        }
    }
}

/// Parameters of one watch invocation.
#[derive(Debug, Clone)]
pub struct WatchSession {
    pub id: String,
    pub interval: Duration,
    pub mode: PresentationMode,
    pub timeout: Option<Duration>,
    pub canceled: bool,
}

impl WatchSession {
    pub fn new(
        id: impl Into<String>,
        interval: Duration,
        mode: PresentationMode,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::msg("job id must not be empty"));
        }
        if interval < MIN_INTERVAL {
            return Err(Error::msg(format!(
                "refresh interval must be at least {}s (got {}ms)",
                MIN_INTERVAL.as_secs(),
                interval.as_millis()
            )));
        }
        Ok(Self {
            id: id.trim().to_string(),
            interval,
            mode,
            timeout: timeout.filter(|t| !t.is_zero()),
            canceled: false,
        })
    }
}

/// Parses `90`, `90s`, `10m`, `1h`, `500ms`. A bare number is seconds.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let (num_str, unit) = s
        .find(|c: char| !c.is_ascii_digit())
        .map(|i| s.split_at(i))
        .unwrap_or((s, "s"));

    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("invalid number in duration '{s}'"))?;

    let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
        "ms" => 1,
        "s" | "" => 1000,
        "m" => 60 * 1000,
        "h" => 60 * 60 * 1000,
        other => return Err(format!("unknown duration unit '{other}'")),
    };

    num.checked_mul(multiplier)
        .map(Duration::from_millis)
        .ok_or_else(|| format!("duration too large: {s}"))
}

pub fn format_elapsed_hms(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}
