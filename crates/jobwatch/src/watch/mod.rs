//! Controller for one watch session.
//!
//! [`Controller::handle`] is a reducer: it consumes one [`Event`] at a time,
//! owns every piece of mutable session state and answers with [`Effect`]s for
//! the runtime loop to carry out. Fetch workers and input readers only ever
//! send events.

mod runtime;

pub use runtime::{FRAME_TICK, run_session, run_with, watch};

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::model::{BuildSnapshot, LogBuffer};
use crate::normalize::Normalizer;
use crate::poller::{EventSink, JobSource, Poller};
use crate::session::WatchSession;
use crate::tracker::{Conclusion, Lifecycle, StateTracker, Transition};
use crate::ui::viewport::Viewport;

pub const EXIT_OK: i32 = 0;
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_JOB_FAILED: i32 = 2;
pub const EXIT_JOB_CANCELED: i32 = 3;
pub const EXIT_TIMEOUT: i32 = 124;

#[derive(Debug)]
pub enum Event {
    /// Fixed short frame tick; drives animation and fetch scheduling.
    Tick,
    StatusArrived(BuildSnapshot),
    /// `None` when the log fetch failed; the previous log is kept.
    LogArrived(Option<String>),
    FatalError(Error),
    UserInterrupt,
    TimeoutElapsed,
    TerminalResized { width: u16, height: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Finished(Conclusion),
    /// The operator stopped watching; the job keeps running.
    Detached,
    /// The session's own timeout elapsed before the job finished.
    TimedOut,
}

impl Outcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Finished(Conclusion::Succeeded) | Self::Detached => EXIT_OK,
            Self::Finished(Conclusion::Failed) => EXIT_JOB_FAILED,
            Self::Finished(Conclusion::Canceled) => EXIT_JOB_CANCELED,
            Self::TimedOut => EXIT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Fetch,
    Redraw,
    Exit(Outcome),
}

/// Read-only view of the session handed to presenters.
pub struct WatchView<'a> {
    pub session: &'a WatchSession,
    pub snapshot: Option<&'a BuildSnapshot>,
    pub lifecycle: Option<Lifecycle>,
    pub status_text: &'static str,
    pub percent: Option<u8>,
    pub logs: &'a LogBuffer,
    pub frame: usize,
    pub elapsed: Duration,
    pub viewport: Viewport,
}

impl WatchView<'_> {
    pub fn is_finished(&self) -> bool {
        matches!(self.lifecycle, Some(Lifecycle::Finished(_)))
    }
}

pub struct Controller {
    session: WatchSession,
    poller: Poller,
    tracker: StateTracker,
    logs: LogBuffer,
    normalizer: Normalizer,
    viewport: Viewport,
    frame: usize,
    status_pending: bool,
    log_pending: bool,
    next_fetch_at: Option<Instant>,
    started_at: Instant,
    outcome: Option<Outcome>,
}

impl Controller {
    pub fn new(session: WatchSession, source: Arc<dyn JobSource>, viewport: Viewport) -> Self {
        let poller = Poller::new(source, session.id.clone());
        let normalizer = Normalizer::for_mode(session.mode);
        Self {
            session,
            poller,
            tracker: StateTracker::default(),
            logs: LogBuffer::default(),
            normalizer,
            viewport,
            frame: 0,
            status_pending: false,
            log_pending: false,
            next_fetch_at: None,
            started_at: Instant::now(),
            outcome: None,
        }
    }

    /// Begins the session; the first fetch pair goes out without delay.
    pub fn start(&mut self, now: Instant) -> Vec<Effect> {
        self.started_at = now;
        tracing::info!(
            id = %self.session.id,
            interval_secs = self.session.interval.as_secs(),
            mode = ?self.session.mode,
            "watch session started"
        );
        vec![self.issue_fetch(), Effect::Redraw]
    }

    pub fn handle(&mut self, ev: Event, now: Instant) -> Result<Vec<Effect>> {
        if self.outcome.is_some() {
            return Ok(Vec::new());
        }

        let mut effects = Vec::new();
        match ev {
            Event::Tick => {
                if !self.tracker.is_finished() {
                    self.frame = self.frame.wrapping_add(1);
                    if self.fetch_due(now) {
                        effects.push(self.issue_fetch());
                    }
                }
                effects.push(Effect::Redraw);
            }
            Event::StatusArrived(snapshot) => {
                self.status_pending = false;
                if let Transition::Entered(state) = self.tracker.observe(snapshot) {
                    tracing::info!(id = %self.session.id, state = state.as_str(), "job state changed");
                }
                effects.push(Effect::Redraw);
                self.settle(now, &mut effects);
            }
            Event::LogArrived(raw) => {
                self.log_pending = false;
                if let Some(raw) = self.poller.accept_log(raw) {
                    let complete = self.logs.take_complete(&raw);
                    let added = self.logs.append(self.normalizer.normalize(complete));
                    tracing::debug!(id = %self.session.id, added, total = self.logs.len(), "log refreshed");
                }
                effects.push(Effect::Redraw);
                self.settle(now, &mut effects);
            }
            Event::FatalError(e) => {
                tracing::debug!(id = %self.session.id, error = %e, "status fetch failed");
                return Err(e);
            }
            Event::UserInterrupt => {
                self.session.canceled = true;
                let outcome = self
                    .tracker
                    .conclusion()
                    .map_or(Outcome::Detached, Outcome::Finished);
                effects.push(self.exit(outcome));
            }
            Event::TimeoutElapsed => {
                let outcome = match self.tracker.conclusion() {
                    Some(c) => Outcome::Finished(c),
                    None => Outcome::TimedOut,
                };
                effects.push(self.exit(outcome));
            }
            Event::TerminalResized { width, height } => {
                self.viewport = Viewport { width, height };
                effects.push(Effect::Redraw);
            }
        }
        Ok(effects)
    }

    pub fn spawn_fetch(&mut self, sink: Arc<dyn EventSink>) {
        self.poller.spawn_fetch(sink);
    }

    pub fn view(&self, now: Instant) -> WatchView<'_> {
        WatchView {
            session: &self.session,
            snapshot: self.tracker.snapshot(),
            lifecycle: self.tracker.lifecycle(),
            status_text: self.tracker.status_text(),
            percent: self.tracker.percent(),
            logs: &self.logs,
            frame: self.frame,
            elapsed: now.saturating_duration_since(self.started_at),
            viewport: self.viewport,
        }
    }

    pub fn session(&self) -> &WatchSession {
        &self.session
    }

    pub fn snapshot(&self) -> Option<&BuildSnapshot> {
        self.tracker.snapshot()
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    fn issue_fetch(&mut self) -> Effect {
        self.status_pending = true;
        self.log_pending = true;
        self.next_fetch_at = None;
        Effect::Fetch
    }

    fn fetch_due(&self, now: Instant) -> bool {
        !self.status_pending
            && !self.log_pending
            && self.next_fetch_at.is_some_and(|at| now >= at)
    }

    /// Once both halves of a fetch pair are in, either finish or schedule the next pair.
    fn settle(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        if self.status_pending || self.log_pending {
            return;
        }
        match self.tracker.conclusion() {
            Some(c) => effects.push(self.exit(Outcome::Finished(c))),
            None => self.next_fetch_at = Some(now + self.session.interval),
        }
    }

    fn exit(&mut self, outcome: Outcome) -> Effect {
        if let Outcome::Finished(_) = outcome {
            // No later fetch will terminate the last line.
            let tail = self.logs.take_pending();
            self.logs.append(self.normalizer.normalize(&tail));
        }
        tracing::info!(id = %self.session.id, ?outcome, "watch session ended");
        self.outcome = Some(outcome);
        self.next_fetch_at = None;
        Effect::Exit(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LogLine, StatusCategory};
    use crate::session::PresentationMode;

    struct Unused;

    impl JobSource for Unused {
        fn fetch_status(&self, _id: &str) -> Result<BuildSnapshot> {
            Err(Error::msg("not used"))
        }

        fn fetch_log(&self, _id: &str) -> Result<String> {
            Err(Error::msg("not used"))
        }
    }

    fn controller() -> Controller {
        let session = WatchSession::new(
            "42",
            Duration::from_secs(5),
            PresentationMode::Plain,
            None,
        )
        .unwrap();
        Controller::new(
            session,
            Arc::new(Unused),
            Viewport {
                width: 80,
                height: 24,
            },
        )
    }

    fn snap(status: StatusCategory, percent: u8) -> BuildSnapshot {
        BuildSnapshot {
            id: "42".into(),
            number: 7,
            name: "nightly".into(),
            status,
            percent,
            message: "Build failed in step 3".into(),
            url: "https://ci.example.com/jobs/42".into(),
        }
    }

    fn fetches(effects: &[Effect]) -> usize {
        effects.iter().filter(|e| **e == Effect::Fetch).count()
    }

    /// Delivers one complete fetch pair at `now`.
    fn deliver(c: &mut Controller, s: BuildSnapshot, log: &str, now: Instant) -> Vec<Effect> {
        let mut effects = c.handle(Event::StatusArrived(s), now).unwrap();
        effects.extend(c.handle(Event::LogArrived(Some(log.to_string())), now).unwrap());
        effects
    }

    #[test]
    fn first_fetch_is_immediate() {
        let mut c = controller();
        let effects = c.start(Instant::now());
        assert_eq!(fetches(&effects), 1);
    }

    #[test]
    fn next_fetch_waits_for_interval_and_settled_pair() {
        let mut c = controller();
        let t0 = Instant::now();
        c.start(t0);

        // Nothing new while the first pair is outstanding.
        assert_eq!(fetches(&c.handle(Event::Tick, t0 + Duration::from_secs(6)).unwrap()), 0);

        deliver(&mut c, snap(StatusCategory::Running, 10), "", t0);
        assert_eq!(fetches(&c.handle(Event::Tick, t0 + Duration::from_secs(4)).unwrap()), 0);
        assert_eq!(fetches(&c.handle(Event::Tick, t0 + Duration::from_secs(5)).unwrap()), 1);
    }

    #[test]
    fn lifecycle_to_success_stops_polling() {
        let mut c = controller();
        let mut now = Instant::now();
        let mut total = fetches(&c.start(now));
        let step = Duration::from_secs(5);

        let sequence = [
            snap(StatusCategory::Queued, 0),
            snap(StatusCategory::Running, 50),
            snap(StatusCategory::Running, 100),
            snap(StatusCategory::Succeeded, 100),
        ];
        let mut exit = None;
        for s in sequence {
            let effects = deliver(&mut c, s, "[10:00:00] i: working", now);
            exit = effects.iter().find_map(|e| match e {
                Effect::Exit(o) => Some(*o),
                _ => None,
            });
            now += step;
            total += fetches(&c.handle(Event::Tick, now).unwrap());
        }

        assert_eq!(exit, Some(Outcome::Finished(Conclusion::Succeeded)));
        assert_eq!(total, 4);
        for _ in 0..5 {
            now += step;
            assert!(c.handle(Event::Tick, now).unwrap().is_empty());
        }
        assert_eq!(Outcome::Finished(Conclusion::Succeeded).exit_code(), EXIT_OK);
    }

    #[test]
    fn finish_waits_for_outstanding_log() {
        let mut c = controller();
        let now = Instant::now();
        c.start(now);
        let effects = c
            .handle(Event::StatusArrived(snap(StatusCategory::Failed, 0)), now)
            .unwrap();
        assert!(!effects.iter().any(|e| matches!(e, Effect::Exit(_))));
        let effects = c.handle(Event::LogArrived(None), now).unwrap();
        assert_eq!(
            effects.last(),
            Some(&Effect::Exit(Outcome::Finished(Conclusion::Failed)))
        );
    }

    #[test]
    fn interrupt_detaches_without_more_fetches() {
        let mut c = controller();
        let mut now = Instant::now();
        c.start(now);
        deliver(&mut c, snap(StatusCategory::Running, 30), "", now);

        let effects = c.handle(Event::UserInterrupt, now).unwrap();
        assert_eq!(effects, vec![Effect::Exit(Outcome::Detached)]);
        assert!(c.session().canceled);
        assert_eq!(Outcome::Detached.exit_code(), EXIT_OK);

        now += Duration::from_secs(60);
        assert!(c.handle(Event::Tick, now).unwrap().is_empty());
    }

    #[test]
    fn interrupt_after_failed_status_keeps_the_failure() {
        let mut c = controller();
        let now = Instant::now();
        c.start(now);
        c.handle(Event::StatusArrived(snap(StatusCategory::Failed, 0)), now)
            .unwrap();

        let effects = c.handle(Event::UserInterrupt, now).unwrap();
        assert_eq!(
            effects,
            vec![Effect::Exit(Outcome::Finished(Conclusion::Failed))]
        );
        assert_eq!(c.outcome().map(Outcome::exit_code), Some(EXIT_JOB_FAILED));
    }

    #[test]
    fn partial_lines_wait_for_their_newline() {
        let mut c = controller();
        let now = Instant::now();
        c.start(now);
        deliver(
            &mut c,
            snap(StatusCategory::Running, 10),
            "[10:00:00] i: a\nexp",
            now,
        );
        c.handle(Event::Tick, now + Duration::from_secs(5)).unwrap();
        deliver(
            &mut c,
            snap(StatusCategory::Running, 20),
            "[10:00:00] i: a\nexport X=1\n[10:00:0",
            now,
        );
        let shown: Vec<String> = c.view(now).logs.lines().iter().map(LogLine::display).collect();
        assert_eq!(shown, ["[10:00:00] a"]);

        c.handle(Event::Tick, now + Duration::from_secs(10)).unwrap();
        let full = "[10:00:00] i: a\nexport X=1\n[10:00:02] i: b";
        deliver(&mut c, snap(StatusCategory::Succeeded, 100), full, now);

        let shown: Vec<String> = c.view(now).logs.lines().iter().map(LogLine::display).collect();
        let expected: Vec<String> = Normalizer::for_mode(PresentationMode::Plain)
            .normalize(full)
            .iter()
            .map(LogLine::display)
            .collect();
        assert_eq!(shown, ["[10:00:00] a", "[10:00:02] b"]);
        assert_eq!(shown, expected);
    }

    #[test]
    fn timeout_has_its_own_outcome() {
        let mut c = controller();
        let now = Instant::now();
        c.start(now);
        deliver(&mut c, snap(StatusCategory::Running, 30), "", now);
        let effects = c.handle(Event::TimeoutElapsed, now).unwrap();
        assert_eq!(effects, vec![Effect::Exit(Outcome::TimedOut)]);
        assert_eq!(Outcome::TimedOut.exit_code(), EXIT_TIMEOUT);
        assert_ne!(Outcome::TimedOut.exit_code(), Outcome::Detached.exit_code());
    }

    #[test]
    fn fatal_error_propagates() {
        let mut c = controller();
        c.start(Instant::now());
        let err = c
            .handle(Event::FatalError(Error::msg("HTTP 500")), Instant::now())
            .unwrap_err();
        assert_eq!(err.to_string(), "HTTP 500");
    }

    #[test]
    fn failed_log_fetch_keeps_buffer() {
        let mut c = controller();
        let now = Instant::now();
        c.start(now);
        deliver(&mut c, snap(StatusCategory::Running, 1), "[10:00:00] i: one\n", now);
        c.handle(Event::Tick, now + Duration::from_secs(5)).unwrap();
        c.handle(Event::StatusArrived(snap(StatusCategory::Running, 2)), now).unwrap();
        c.handle(Event::LogArrived(None), now).unwrap();
        assert_eq!(c.view(now).logs.len(), 1);
        assert_eq!(c.view(now).percent, Some(2));
    }

    #[test]
    fn resize_updates_viewport() {
        let mut c = controller();
        c.start(Instant::now());
        let effects = c
            .handle(
                Event::TerminalResized {
                    width: 120,
                    height: 40,
                },
                Instant::now(),
            )
            .unwrap();
        assert_eq!(effects, vec![Effect::Redraw]);
        assert_eq!(c.view(Instant::now()).viewport.width, 120);
    }
}
