use std::io::{self, Stdout};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::Sender;

use crossterm::cursor::{Hide, Show};
use crossterm::event::{self, Event as TermEvent, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use crate::error::{Error, Result};
use crate::watch::{Event, Outcome, WatchView};

use super::{Presenter, final_summary, outcome_message, viewport};

/// Full-screen view on the alternate screen. The terminal is restored on
/// `finish` or, failing that, on drop.
pub struct InteractivePresenter {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    restored: bool,
}

impl InteractivePresenter {
    /// Takes over the terminal and starts forwarding keys and resizes to `tx`.
    pub fn enter(tx: Sender<Event>) -> Result<Self> {
        enable_raw_mode().map_err(|e| Error::msg(format!("failed to enable raw mode: {e}")))?;
        let terminal = undo_on_error(setup_terminal, leave_terminal)?;

        spawn_input_reader(tx);
        Ok(Self {
            terminal,
            restored: false,
        })
    }

    fn restore(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        disable_raw_mode().ok();
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen, Show).ok();
    }
}

impl Presenter for InteractivePresenter {
    fn draw(&mut self, view: &WatchView<'_>) -> Result<()> {
        let mut draw_panicked = false;
        self.terminal
            .draw(|f| {
                if catch_unwind(AssertUnwindSafe(|| viewport::draw(f, view))).is_err() {
                    draw_panicked = true;
                }
            })
            .map_err(|e| Error::msg(format!("draw failed: {e}")))?;
        if draw_panicked {
            tracing::warn!("viewport draw panicked; clearing screen");
            let _ = self.terminal.clear();
        }
        Ok(())
    }

    fn finish(&mut self, view: &WatchView<'_>, outcome: Outcome) -> Result<()> {
        self.restore();
        println!("{}", final_summary(view, outcome));
        if matches!(outcome, Outcome::Detached | Outcome::TimedOut) {
            println!("{}", outcome_message(view, outcome));
        }
        Ok(())
    }
}

impl Drop for InteractivePresenter {
    fn drop(&mut self) {
        self.restore();
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, Hide).map_err(|e| Error::msg(e.to_string()))?;
    let mut terminal =
        Terminal::new(CrosstermBackend::new(stdout)).map_err(|e| Error::msg(e.to_string()))?;
    terminal
        .clear()
        .map_err(|e| Error::msg(format!("terminal clear failed: {e}")))?;
    Ok(terminal)
}

fn leave_terminal() {
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen, Show).ok();
    disable_raw_mode().ok();
}

/// Runs `setup`, calling `undo` before handing back its error.
fn undo_on_error<T>(setup: impl FnOnce() -> Result<T>, undo: impl FnOnce()) -> Result<T> {
    setup().inspect_err(|_| undo())
}

fn spawn_input_reader(tx: Sender<Event>) {
    std::thread::spawn(move || {
        loop {
            let ev = match event::read() {
                Ok(TermEvent::Key(k)) if k.kind == KeyEventKind::Press => {
                    let ctrl_c = k.modifiers.contains(KeyModifiers::CONTROL)
                        && matches!(k.code, KeyCode::Char('c'));
                    if ctrl_c || matches!(k.code, KeyCode::Char('q') | KeyCode::Esc) {
                        Event::UserInterrupt
                    } else {
                        continue;
                    }
                }
                Ok(TermEvent::Resize(width, height)) => Event::TerminalResized { width, height },
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!(error = %e, "terminal input reader stopped");
                    return;
                }
            };
            if tx.send(ev).is_err() {
                return;
            }
        }
    });
}
