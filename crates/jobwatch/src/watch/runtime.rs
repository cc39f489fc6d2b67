use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::poller::{ChannelSink, EventSink, FailureReport, FailureReporter, JobSource};
use crate::session::{PresentationMode, WatchSession};
use crate::tracker::Conclusion;
use crate::ui::viewport::Viewport;
use crate::ui::{InteractivePresenter, Palette, PlainPresenter, Presenter, QuietPresenter};

use super::{Controller, Effect, Event, Outcome};

/// Animation and scheduling granularity, independent of the refresh interval.
pub const FRAME_TICK: Duration = Duration::from_millis(100);

/// Watches a job with the presenter and input wiring of the session's mode.
pub fn watch(
    session: WatchSession,
    source: Arc<dyn JobSource>,
    reporter: &dyn FailureReporter,
) -> Result<Outcome> {
    let (tx, rx) = mpsc::channel();
    let viewport = Viewport::current();
    let stdout_is_tty = io::stdout().is_terminal();

    let mut presenter: Box<dyn Presenter> = match session.mode {
        PresentationMode::Interactive => Box::new(InteractivePresenter::enter(tx.clone())?),
        PresentationMode::Quiet => {
            install_interrupt_handler(tx.clone())?;
            Box::new(QuietPresenter::new(io::stdout(), Palette::new(stdout_is_tty)))
        }
        PresentationMode::Plain => {
            install_interrupt_handler(tx.clone())?;
            Box::new(
                PlainPresenter::new(io::stdout(), Palette::new(stdout_is_tty))
                    .width_from(|| Viewport::current().width),
            )
        }
    };

    run_with(
        Controller::new(session, source, viewport),
        reporter,
        presenter.as_mut(),
        tx,
        rx,
    )
}

/// Runs a session to completion, finishes the presenter and reports a failed job.
pub fn run_with(
    mut controller: Controller,
    reporter: &dyn FailureReporter,
    presenter: &mut dyn Presenter,
    tx: Sender<Event>,
    rx: Receiver<Event>,
) -> Result<Outcome> {
    let sink: Arc<dyn EventSink> = Arc::new(ChannelSink::new(tx));
    let outcome = run_session(&mut controller, presenter, &rx, sink)?;

    presenter.finish(&controller.view(Instant::now()), outcome)?;

    if outcome == Outcome::Finished(Conclusion::Failed) {
        match controller.snapshot() {
            Some(snapshot) => reporter.report_failure(&FailureReport::from_snapshot(snapshot)),
            None => tracing::warn!("job failed but no snapshot is available to report"),
        }
    }
    Ok(outcome)
}

/// Event loop: executes the controller's effects and feeds it events until it exits.
pub fn run_session(
    controller: &mut Controller,
    presenter: &mut dyn Presenter,
    rx: &Receiver<Event>,
    sink: Arc<dyn EventSink>,
) -> Result<Outcome> {
    let started = Instant::now();
    let deadline = controller.session().timeout.map(|t| started + t);
    let mut next_frame = started + FRAME_TICK;
    let mut effects = controller.start(started);

    loop {
        for effect in effects.drain(..) {
            match effect {
                Effect::Fetch => controller.spawn_fetch(Arc::clone(&sink)),
                Effect::Redraw => presenter.draw(&controller.view(Instant::now()))?,
                Effect::Exit(outcome) => return Ok(outcome),
            }
        }

        let now = Instant::now();
        if deadline.is_some_and(|d| now >= d) {
            effects = controller.handle(Event::TimeoutElapsed, now)?;
            continue;
        }
        if now >= next_frame {
            next_frame = now + FRAME_TICK;
            effects = controller.handle(Event::Tick, now)?;
            continue;
        }

        let wake = deadline.map_or(next_frame, |d| d.min(next_frame));
        match rx.recv_timeout(wake.saturating_duration_since(now)) {
            Ok(ev) => effects = controller.handle(ev, Instant::now())?,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return Err(Error::msg("watch event channel closed unexpectedly"));
            }
        }
    }
}

fn install_interrupt_handler(tx: Sender<Event>) -> Result<()> {
    ctrlc::set_handler(move || {
        let _ = tx.send(Event::UserInterrupt);
    })
    .map_err(|e| Error::msg(format!("failed to install Ctrl+C handler: {e}")))
}
