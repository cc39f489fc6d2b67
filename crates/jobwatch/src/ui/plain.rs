use std::io::Write;

use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};

use crate::error::Result;
use crate::watch::{Outcome, WatchView};

use super::viewport::fit_width;
use super::{Palette, Presenter, final_summary, outcome_message, status_line};

/// Reprints one status line in place, then a summary block at the end.
pub struct PlainPresenter<W: Write> {
    out: W,
    palette: Palette,
    last_line: Option<String>,
    /// Current column count; without it the session's viewport width is used.
    columns: Option<fn() -> u16>,
}

impl<W: Write> PlainPresenter<W> {
    pub fn new(out: W, palette: Palette) -> Self {
        Self {
            out,
            palette,
            last_line: None,
            columns: None,
        }
    }

    /// Re-reads the width on every draw. Line modes get no resize events.
    pub fn width_from(mut self, columns: fn() -> u16) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Presenter for PlainPresenter<W> {
    fn draw(&mut self, view: &WatchView<'_>) -> Result<()> {
        // One column short so the cursor never wraps onto a new row.
        let columns = self.columns.map_or(view.viewport.width, |f| f());
        let width = usize::from(columns.saturating_sub(1)).max(1);
        let line = fit_width(&status_line(view), width);
        if self.last_line.as_deref() == Some(line.as_str()) {
            return Ok(());
        }

        let painted = self.palette.for_lifecycle(&line, view.lifecycle);
        queue!(
            self.out,
            Print("\r"),
            Clear(ClearType::CurrentLine),
            Print(painted)
        )?;
        self.out.flush()?;
        self.last_line = Some(line);
        Ok(())
    }

    fn finish(&mut self, view: &WatchView<'_>, outcome: Outcome) -> Result<()> {
        if self.last_line.is_some() {
            writeln!(self.out)?;
        }
        writeln!(self.out, "{}", final_summary(view, outcome))?;
        if matches!(outcome, Outcome::Detached | Outcome::TimedOut) {
            writeln!(self.out, "{}", outcome_message(view, outcome))?;
        }
        self.out.flush()?;
        Ok(())
    }
}
