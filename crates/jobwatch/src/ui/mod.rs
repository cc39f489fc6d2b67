pub mod interactive;
pub mod plain;
pub mod quiet;
pub mod viewport;

pub use interactive::InteractivePresenter;
pub use plain::PlainPresenter;
pub use quiet::QuietPresenter;

use crossterm::style::{Color, Stylize, style};

use crate::error::Result;
use crate::session::format_elapsed_hms;
use crate::tracker::{Conclusion, Lifecycle};
use crate::watch::{Outcome, WatchView};

/// Renders a watch session in one presentation mode.
pub trait Presenter {
    fn draw(&mut self, view: &WatchView<'_>) -> Result<()>;
    /// Called once after the loop ends, with the final state.
    fn finish(&mut self, view: &WatchView<'_>, outcome: Outcome) -> Result<()>;
}

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub fn spinner_frame(frame: usize) -> &'static str {
    SPINNER[frame % SPINNER.len()]
}

pub fn status_icon(lifecycle: Option<Lifecycle>, frame: usize) -> &'static str {
    match lifecycle {
        Some(Lifecycle::Queued) => "○",
        Some(Lifecycle::Running) => spinner_frame(frame),
        Some(Lifecycle::Finished(Conclusion::Succeeded)) => "✔",
        Some(Lifecycle::Finished(Conclusion::Failed)) => "✖",
        Some(Lifecycle::Finished(Conclusion::Canceled)) => "⊘",
        None => "?",
    }
}

/// Colors text only when writing to a terminal.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    color: bool,
}

impl Palette {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    pub fn paint(&self, text: &str, color: Color) -> String {
        if self.color {
            style(text).with(color).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn for_lifecycle(&self, text: &str, lifecycle: Option<Lifecycle>) -> String {
        let color = match lifecycle {
            Some(Lifecycle::Queued) | None => Color::Grey,
            Some(Lifecycle::Running) => Color::Cyan,
            Some(Lifecycle::Finished(Conclusion::Succeeded)) => Color::Green,
            Some(Lifecycle::Finished(Conclusion::Failed)) => Color::Red,
            Some(Lifecycle::Finished(Conclusion::Canceled)) => Color::Yellow,
        };
        self.paint(text, color)
    }
}

fn job_label(view: &WatchView<'_>) -> String {
    match view.snapshot {
        Some(s) if !s.name.is_empty() => format!("{} #{} ({})", s.name, s.number, view.session.id),
        Some(s) => format!("job #{} ({})", s.number, view.session.id),
        None => format!("job {}", view.session.id),
    }
}

/// One-line status used by the plain presenter.
pub fn status_line(view: &WatchView<'_>) -> String {
    let mut line = format!(
        "{} {}  {}",
        status_icon(view.lifecycle, view.frame),
        job_label(view),
        view.status_text
    );
    if let Some(p) = view.percent {
        line.push_str(&format!(" {p}%"));
    }
    line.push_str(&format!("  {}", format_elapsed_hms(view.elapsed)));
    line
}

pub fn final_summary(view: &WatchView<'_>, outcome: Outcome) -> String {
    let status = match outcome {
        Outcome::Finished(c) => c.as_str().to_string(),
        Outcome::Detached => format!("detached ({})", view.status_text),
        Outcome::TimedOut => format!("timed out ({})", view.status_text),
    };

    let mut lines = Vec::new();
    lines.push("SUMMARY:".to_string());
    lines.push(format!("  job: {}", job_label(view)));
    lines.push(format!("  status: {status}"));
    if let Some(s) = view.snapshot {
        if !s.url.is_empty() {
            lines.push(format!("  url: {}", s.url));
        }
        if !s.message.is_empty() {
            lines.push(format!("  message: {}", s.message));
        }
    }
    lines.push(format!("  elapsed: {}", format_elapsed_hms(view.elapsed)));
    lines.push(format!("  log_lines: {}", view.logs.len()));
    lines.join("\n")
}

/// What happened to the session, plus how to come back when the job is still running.
pub fn outcome_message(view: &WatchView<'_>, outcome: Outcome) -> String {
    let id = &view.session.id;
    let reattach = format!("Re-attach with: jobwatch watch {id}");
    match outcome {
        Outcome::Finished(c) => format!("{} {}", job_label(view), c.as_str()),
        Outcome::Detached => {
            format!("Stopped watching job {id}; it continues in the background.\n{reattach}")
        }
        Outcome::TimedOut => {
            let limit = view
                .session
                .timeout
                .map(format_elapsed_hms)
                .unwrap_or_else(|| format_elapsed_hms(view.elapsed));
            format!(
                "Timed out after {limit} waiting for job {id}; it is still {}.\n{reattach}",
                view.status_text
            )
        }
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::time::Duration;

    use crate::model::{BuildSnapshot, LogBuffer, StatusCategory};
    use crate::session::{PresentationMode, WatchSession};
    use crate::tracker::{Conclusion, Lifecycle};
    use crate::ui::viewport::Viewport;
    use crate::watch::WatchView;

    pub struct Fixture {
        pub session: WatchSession,
        pub snapshot: Option<BuildSnapshot>,
        pub logs: LogBuffer,
    }

    impl Fixture {
        pub fn new(mode: PresentationMode) -> Self {
            Self {
                session: WatchSession::new(
                    "42",
                    Duration::from_secs(5),
                    mode,
                    Some(Duration::from_secs(60)),
                )
                .unwrap(),
                snapshot: None,
                logs: LogBuffer::default(),
            }
        }

        pub fn view(
            &self,
            lifecycle: Option<Lifecycle>,
            percent: Option<u8>,
            secs: u64,
        ) -> WatchView<'_> {
            WatchView {
                session: &self.session,
                snapshot: self.snapshot.as_ref(),
                lifecycle,
                status_text: lifecycle.map(|l| l.as_str()).unwrap_or("unknown"),
                percent,
                logs: &self.logs,
                frame: 0,
                elapsed: Duration::from_secs(secs),
                viewport: Viewport {
                    width: 80,
                    height: 24,
                },
            }
        }

        pub fn with_snapshot(mut self, status: StatusCategory) -> Self {
            self.snapshot = Some(BuildSnapshot {
                id: "42".into(),
                number: 7,
                name: "nightly".into(),
                status,
                percent: 0,
                message: "Tests failed".into(),
                url: "https://ci/42".into(),
            });
            self
        }
    }

    pub const FAILED: Option<Lifecycle> = Some(Lifecycle::Finished(Conclusion::Failed));
}
