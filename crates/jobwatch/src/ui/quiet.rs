use std::io::Write;
use std::time::Duration;

use crossterm::style::Color;

use crate::error::Result;
use crate::tracker::{Conclusion, Lifecycle};
use crate::watch::{Outcome, WatchView};

use super::{Palette, Presenter, outcome_message};

/// Writes state-change deltas only: `running`, rising `N%` markers and an
/// overtime counter once the job sits at 100% without finishing.
pub struct QuietPresenter<W: Write> {
    out: W,
    palette: Palette,
    announced_running: bool,
    last_percent: u8,
    at_full_since: Option<Duration>,
    overtime_secs: u64,
    wrote_any: bool,
}

impl<W: Write> QuietPresenter<W> {
    pub fn new(out: W, palette: Palette) -> Self {
        Self {
            out,
            palette,
            announced_running: false,
            last_percent: 0,
            at_full_since: None,
            overtime_secs: 0,
            wrote_any: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, token: &str) -> Result<()> {
        write!(self.out, "{token} ")?;
        self.wrote_any = true;
        Ok(())
    }
}

impl<W: Write> Presenter for QuietPresenter<W> {
    fn draw(&mut self, view: &WatchView<'_>) -> Result<()> {
        if view.lifecycle != Some(Lifecycle::Running) {
            return Ok(());
        }
        if !self.announced_running {
            self.announced_running = true;
            let token = self.palette.paint("running", Color::Cyan);
            self.emit(&token)?;
        }

        let Some(percent) = view.percent else {
            return self.out.flush().map_err(Into::into);
        };
        if percent > self.last_percent {
            self.last_percent = percent;
            self.emit(&format!("{percent}%"))?;
        }
        if percent >= 100 {
            let since = *self.at_full_since.get_or_insert(view.elapsed);
            let over = view.elapsed.saturating_sub(since).as_secs();
            if over > self.overtime_secs {
                self.overtime_secs = over;
                let token = self.palette.paint(&format!("+{over}s"), Color::Yellow);
                self.emit(&token)?;
            }
        }
        self.out.flush()?;
        Ok(())
    }

    fn finish(&mut self, view: &WatchView<'_>, outcome: Outcome) -> Result<()> {
        if self.wrote_any {
            writeln!(self.out)?;
        }
        let message = outcome_message(view, outcome);
        let message = match outcome {
            Outcome::Finished(Conclusion::Succeeded) => self.palette.paint(&message, Color::Green),
            Outcome::Finished(_) => self.palette.paint(&message, Color::Red),
            Outcome::Detached | Outcome::TimedOut => message,
        };
        writeln!(self.out, "{message}")?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StatusCategory;
    use crate::session::PresentationMode;
    use crate::ui::testutil::Fixture;

    const RUNNING: Option<Lifecycle> = Some(Lifecycle::Running);

    fn output(p: QuietPresenter<Vec<u8>>) -> String {
        String::from_utf8(p.into_inner()).unwrap()
    }

    #[test]
    fn emits_only_deltas() {
        let fx = Fixture::new(PresentationMode::Quiet).with_snapshot(StatusCategory::Running);
        let mut p = QuietPresenter::new(Vec::new(), Palette::new(false));

        p.draw(&fx.view(Some(Lifecycle::Queued), None, 0)).unwrap();
        p.draw(&fx.view(RUNNING, Some(0), 1)).unwrap();
        p.draw(&fx.view(RUNNING, Some(20), 2)).unwrap();
        p.draw(&fx.view(RUNNING, Some(20), 3)).unwrap();
        p.draw(&fx.view(RUNNING, Some(15), 4)).unwrap();
        p.draw(&fx.view(RUNNING, Some(60), 5)).unwrap();

        assert_eq!(output(p), "running 20% 60% ");
    }

    #[test]
    fn counts_overtime_after_full_percent() {
        let fx = Fixture::new(PresentationMode::Quiet).with_snapshot(StatusCategory::Running);
        let mut p = QuietPresenter::new(Vec::new(), Palette::new(false));

        p.draw(&fx.view(RUNNING, Some(100), 10)).unwrap();
        p.draw(&fx.view(RUNNING, Some(100), 10)).unwrap();
        p.draw(&fx.view(RUNNING, Some(100), 11)).unwrap();
        p.draw(&fx.view(RUNNING, Some(100), 13)).unwrap();

        assert_eq!(output(p), "running 100% +1s +3s ");
    }

    #[test]
    fn finish_prints_outcome_line() {
        let fx = Fixture::new(PresentationMode::Quiet).with_snapshot(StatusCategory::Succeeded);
        let mut p = QuietPresenter::new(Vec::new(), Palette::new(false));
        p.draw(&fx.view(RUNNING, Some(50), 1)).unwrap();
        let done = Some(Lifecycle::Finished(Conclusion::Succeeded));
        p.finish(&fx.view(done, None, 2), Outcome::Finished(Conclusion::Succeeded))
            .unwrap();
        assert_eq!(output(p), "running 50% \nnightly #7 (42) succeeded\n");
    }
}
