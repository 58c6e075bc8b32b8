use std::rc::Rc;

use crate::Observation;

/// Observer function type
pub type ObserverFn = Rc<dyn Fn(&Observation)>;

/// No-op observer
pub fn no_op_observer() -> ObserverFn {
    Rc::new(|_observation: &Observation| {})
}

/// Tracing observer - logs to tracing crate
pub fn tracing_observer() -> ObserverFn {
    Rc::new(move |observation: &Observation| match observation {
        Observation::Requested { watcher, .. } => {
            tracing::trace!(target: "tripwire::schedule", watcher, "request");
        }
        Observation::Coalesced { watcher, .. } => {
            tracing::trace!(target: "tripwire::schedule", watcher, "coalesced into pending run");
        }
        Observation::Deferred { watcher, delay, .. } => {
            tracing::trace!(target: "tripwire::schedule", watcher, ?delay, "deferred");
        }
        Observation::Evaluated { watcher, passed, .. } => {
            tracing::debug!(target: "tripwire::eval", watcher, passed, "evaluated");
        }
        Observation::Fired { watcher, effect, .. } => {
            tracing::info!(target: "tripwire::eval", watcher, ?effect, "transition");
        }
        Observation::Panicked {
            watcher, message, ..
        } => {
            tracing::error!(target: "tripwire::eval", watcher, %message, "callback panicked");
        }
        Observation::Detached { watcher, .. } => {
            tracing::debug!(target: "tripwire::schedule", watcher, "detached");
        }
    })
}

/// Filter observer - include/exclude scheduling noise and evaluation outcomes
pub fn filter_observer(
    wrapped: ObserverFn,
    include_scheduling: bool,
    include_outcomes: bool,
) -> ObserverFn {
    Rc::new(move |observation: &Observation| {
        let should_pass = if observation.is_scheduling() {
            include_scheduling
        } else {
            include_outcomes
        };

        if should_pass {
            wrapped(observation);
        }
    })
}

/// Filter observer with custom predicate
pub fn filter_with<F>(wrapped: ObserverFn, predicate: F) -> ObserverFn
where
    F: Fn(&Observation) -> bool + 'static,
{
    Rc::new(move |observation: &Observation| {
        if predicate(observation) {
            wrapped(observation);
        }
    })
}

/// Tee observer - call multiple observers
pub fn tee_observer(observers: Vec<ObserverFn>) -> ObserverFn {
    Rc::new(move |observation: &Observation| {
        for observer in &observers {
            observer(observation);
        }
    })
}
