use crate::model::{BuildSnapshot, StatusCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conclusion {
    Succeeded,
    Failed,
    Canceled,
}

impl Conclusion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Queued,
    Running,
    Finished(Conclusion),
}

impl Lifecycle {
    fn from_category(category: StatusCategory) -> Option<Self> {
        match category {
            StatusCategory::Queued => Some(Self::Queued),
            StatusCategory::Running => Some(Self::Running),
            StatusCategory::Succeeded => Some(Self::Finished(Conclusion::Succeeded)),
            StatusCategory::Failed => Some(Self::Finished(Conclusion::Failed)),
            StatusCategory::Canceled => Some(Self::Finished(Conclusion::Canceled)),
            StatusCategory::Unknown => None,
        }
    }

    fn rank(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Running => 1,
            Self::Finished(_) => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Finished(c) => c.as_str(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Entered(Lifecycle),
    Unchanged,
    /// Snapshot arrived after the session already finished.
    Ignored,
}

/// Interprets status snapshots into a lifecycle that only moves forward.
#[derive(Debug, Default)]
pub struct StateTracker {
    lifecycle: Option<Lifecycle>,
    snapshot: Option<BuildSnapshot>,
}

impl StateTracker {
    pub fn observe(&mut self, snapshot: BuildSnapshot) -> Transition {
        if self.is_finished() {
            return Transition::Ignored;
        }
        let next = Lifecycle::from_category(snapshot.status);
        self.snapshot = Some(snapshot);

        match (self.lifecycle, next) {
            (_, None) => Transition::Unchanged,
            (None, Some(next)) => {
                self.lifecycle = Some(next);
                Transition::Entered(next)
            }
            (Some(cur), Some(next)) if next.rank() > cur.rank() => {
                self.lifecycle = Some(next);
                Transition::Entered(next)
            }
            (Some(_), Some(_)) => Transition::Unchanged,
        }
    }

    pub fn lifecycle(&self) -> Option<Lifecycle> {
        self.lifecycle
    }

    pub fn snapshot(&self) -> Option<&BuildSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn conclusion(&self) -> Option<Conclusion> {
        match self.lifecycle {
            Some(Lifecycle::Finished(c)) => Some(c),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.conclusion().is_some()
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle == Some(Lifecycle::Running)
    }

    /// Percent complete, only meaningful while running.
    pub fn percent(&self) -> Option<u8> {
        if !self.is_running() {
            return None;
        }
        self.snapshot.as_ref().map(|s| s.percent)
    }

    pub fn status_text(&self) -> &'static str {
        self.lifecycle.map(Lifecycle::as_str).unwrap_or("unknown")
    }
}
