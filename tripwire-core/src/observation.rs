//! Events a watcher reports to its observer.

use std::time::{Duration, SystemTime};

use crate::trip::Effect;

/// Identifier assigned to every watcher at attach time.
pub type WatcherId = u64;

/// Observation variants emitted by a watcher as it schedules and evaluates.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Requested {
        ts: SystemTime,
        watcher: WatcherId,
    },
    Coalesced {
        ts: SystemTime,
        watcher: WatcherId,
    },
    Deferred {
        ts: SystemTime,
        watcher: WatcherId,
        delay: Duration,
    },
    Evaluated {
        ts: SystemTime,
        watcher: WatcherId,
        passed: bool,
    },
    Fired {
        ts: SystemTime,
        watcher: WatcherId,
        effect: Effect,
    },
    Panicked {
        ts: SystemTime,
        watcher: WatcherId,
        message: String,
    },
    Detached {
        ts: SystemTime,
        watcher: WatcherId,
    },
}

impl Observation {
    pub fn watcher(&self) -> WatcherId {
        match self {
            Observation::Requested { watcher, .. }
            | Observation::Coalesced { watcher, .. }
            | Observation::Deferred { watcher, .. }
            | Observation::Evaluated { watcher, .. }
            | Observation::Fired { watcher, .. }
            | Observation::Panicked { watcher, .. }
            | Observation::Detached { watcher, .. } => *watcher,
        }
    }

    /// Scheduler bookkeeping rather than an evaluation outcome.
    pub fn is_scheduling(&self) -> bool {
        matches!(
            self,
            Observation::Requested { .. }
                | Observation::Coalesced { .. }
                | Observation::Deferred { .. }
        )
    }
}
