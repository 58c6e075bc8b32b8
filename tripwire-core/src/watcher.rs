//! Watchers: one per target, composing the trip machine with the throttle
//! scheduler.
//!
//! Startup runs in two phases. [`attach`] validates, registers with the hub
//! and arms a zero-delay warm-up timer; the warm-up seeds the data and issues
//! the first request once the caller has yielded. Everything runs on the
//! current thread inside a `tokio::task::LocalSet`.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use tokio::time::Instant;
use tripwire_timers::TimerSlots;

use crate::config::{Options, TripwireConfig};
use crate::error::Result;
use crate::observation::{Observation, WatcherId};
use crate::signal::{SignalHub, SubscriptionId};
use crate::throttle::{Decision, Throttle, ThrottleState};
use crate::trip::{Effect, TripMachine, TripState};

static NEXT_WATCHER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    WarmUp,
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Attached, warm-up not yet run. Requests are absorbed by the warm-up.
    Starting,
    Ready,
    Detached,
}

struct Inner<T: 'static, D: 'static> {
    id: WatcherId,
    target: T,
    config: TripwireConfig<T, D>,
    machine: RefCell<TripMachine>,
    data: RefCell<D>,
    throttle: RefCell<ThrottleState>,
    timers: RefCell<TimerSlots<Slot>>,
    phase: Cell<Phase>,
    evaluating: Cell<bool>,
    rerun: Cell<bool>,
    hub: SignalHub,
    subscription: Cell<Option<SubscriptionId>>,
}

impl<T: 'static, D: 'static> Drop for Inner<T, D> {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.hub.unsubscribe(id);
        }
    }
}

/// Resets the evaluating flag even if a callback unwinds.
struct EvaluatingGuard<'a>(&'a Cell<bool>);

impl<'a> EvaluatingGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for EvaluatingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Leaves the warm-up phase even if `init_data` unwinds, so later requests
/// still evaluate. A detach during init is kept.
struct ReadyGuard<'a>(&'a Cell<Phase>);

impl Drop for ReadyGuard<'_> {
    fn drop(&mut self) {
        if self.0.get() == Phase::Starting {
            self.0.set(Phase::Ready);
        }
    }
}

/// Handle to an attached watcher. Clones refer to the same watcher.
pub struct Watcher<T: 'static, D: 'static> {
    inner: Rc<Inner<T, D>>,
}

impl<T: 'static, D: 'static> Clone for Watcher<T, D> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static, D: 'static> std::fmt::Debug for Watcher<T, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.inner.id)
            .field("label", &self.inner.config.label())
            .field("trip", &self.trip())
            .field("phase", &self.inner.phase.get())
            .finish()
    }
}

/// Attach a watcher to `target`, subscribing it to `hub`.
///
/// Fails fast on an invalid configuration. No callback runs before the
/// caller yields to the runtime. Must be called inside a `LocalSet`.
pub fn attach<T: 'static, D: Default + 'static>(
    target: T,
    options: Options<T, D>,
    hub: &SignalHub,
) -> Result<Watcher<T, D>> {
    let config = options.validate()?;
    Ok(Watcher::start(target, config, hub))
}

impl<T: 'static, D: Default + 'static> Watcher<T, D> {
    /// Register an already validated configuration.
    pub fn start(target: T, config: TripwireConfig<T, D>, hub: &SignalHub) -> Self {
        let inner = Rc::new(Inner {
            id: NEXT_WATCHER_ID.fetch_add(1, Ordering::Relaxed),
            target,
            throttle: RefCell::new(ThrottleState::new(config.throttle)),
            config,
            machine: RefCell::new(TripMachine::new()),
            data: RefCell::new(D::default()),
            timers: RefCell::new(TimerSlots::new()),
            phase: Cell::new(Phase::Starting),
            evaluating: Cell::new(false),
            rerun: Cell::new(false),
            hub: hub.clone(),
            subscription: Cell::new(None),
        });

        let weak = Rc::downgrade(&inner);
        let subscription = hub.subscribe(move |_signal| {
            if let Some(inner) = weak.upgrade() {
                Watcher { inner }.request();
            }
        });
        inner.subscription.set(Some(subscription));

        let weak = Rc::downgrade(&inner);
        inner
            .timers
            .borrow_mut()
            .notify_after(Slot::WarmUp, Duration::ZERO, move || {
                if let Some(inner) = weak.upgrade() {
                    Watcher { inner }.warm_up();
                }
            });

        tracing::debug!(
            target: "tripwire::watcher",
            watcher = inner.id,
            label = ?inner.config.label(),
            throttle = ?inner.config.throttle,
            "attached"
        );
        Watcher { inner }
    }
}

impl<T: 'static, D: 'static> Watcher<T, D> {
    pub fn id(&self) -> WatcherId {
        self.inner.id
    }

    pub fn label(&self) -> Option<&str> {
        self.inner.config.label()
    }

    pub fn target(&self) -> &T {
        &self.inner.target
    }

    pub fn throttle(&self) -> Throttle {
        self.inner.config.throttle
    }

    pub fn trip(&self) -> TripState {
        self.inner.machine.borrow().state()
    }

    /// True while a deferred evaluation is outstanding.
    pub fn is_pending(&self) -> bool {
        self.inner.throttle.borrow().is_pending()
    }

    pub fn is_detached(&self) -> bool {
        self.inner.phase.get() == Phase::Detached
    }

    /// Read the watcher's data.
    ///
    /// Panics if called from this watcher's own test or callbacks; those
    /// already receive the data.
    pub fn with_data<R>(&self, f: impl FnOnce(&D) -> R) -> R {
        f(&*self.inner.data.borrow())
    }

    /// Ask for a re-evaluation.
    ///
    /// Runs the test synchronously when throttling allows, otherwise makes
    /// sure exactly one deferred evaluation is outstanding. A request made
    /// while this watcher is evaluating is replayed once the evaluation
    /// finishes.
    pub fn request(&self) {
        let inner = &self.inner;
        match inner.phase.get() {
            Phase::Detached => {
                tracing::trace!(target: "tripwire::watcher", watcher = inner.id, "request after detach ignored");
                return;
            }
            Phase::Starting => {
                tracing::trace!(target: "tripwire::watcher", watcher = inner.id, "request absorbed by warm-up");
                return;
            }
            Phase::Ready => {}
        }
        if inner.evaluating.get() {
            inner.rerun.set(true);
            return;
        }

        self.observe(Observation::Requested {
            ts: SystemTime::now(),
            watcher: inner.id,
        });
        let decision = inner.throttle.borrow_mut().request(Instant::now());
        match decision {
            Decision::RunNow => self.evaluate(),
            Decision::Coalesce => self.observe(Observation::Coalesced {
                ts: SystemTime::now(),
                watcher: inner.id,
            }),
            Decision::Defer(delay) => {
                self.observe(Observation::Deferred {
                    ts: SystemTime::now(),
                    watcher: inner.id,
                    delay,
                });
                let weak = Rc::downgrade(inner);
                inner
                    .timers
                    .borrow_mut()
                    .notify_after(Slot::Deferred, delay, move || {
                        if let Some(inner) = weak.upgrade() {
                            Watcher { inner }.fire_deferred();
                        }
                    });
            }
        }
    }

    /// Cancel outstanding timers and stop listening for signals.
    ///
    /// Idempotent. Later requests are ignored and no callback fires again.
    pub fn detach(&self) {
        let inner = &self.inner;
        if inner.phase.replace(Phase::Detached) == Phase::Detached {
            return;
        }
        let cancelled = inner.timers.borrow_mut().clear_all();
        inner.throttle.borrow_mut().cancel();
        inner.rerun.set(false);
        if let Some(id) = inner.subscription.take() {
            inner.hub.unsubscribe(id);
        }
        self.observe(Observation::Detached {
            ts: SystemTime::now(),
            watcher: inner.id,
        });
        tracing::debug!(target: "tripwire::watcher", watcher = inner.id, cancelled, "detached");
    }

    fn warm_up(&self) {
        let inner = &self.inner;
        inner.timers.borrow_mut().release(Slot::WarmUp);
        if inner.phase.get() != Phase::Starting {
            return;
        }

        let init = || {
            let mut data = inner.data.borrow_mut();
            (inner.config.init_data)(&inner.target, &mut *data);
        };
        {
            let _ready = ReadyGuard(&inner.phase);
            if inner.config.isolate_panics {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(init)) {
                    self.report_panic(payload);
                }
            } else {
                init();
            }
        }

        // init_data may have detached us
        if inner.phase.get() == Phase::Ready {
            self.request();
        }
    }

    fn fire_deferred(&self) {
        let inner = &self.inner;
        inner.timers.borrow_mut().release(Slot::Deferred);
        inner.throttle.borrow_mut().fire(Instant::now());
        if inner.phase.get() == Phase::Ready {
            self.evaluate();
        }
    }

    fn evaluate(&self) {
        let inner = &self.inner;
        {
            let _guard = EvaluatingGuard::enter(&inner.evaluating);
            if inner.config.isolate_panics {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| self.run_test())) {
                    self.report_panic(payload);
                }
            } else {
                self.run_test();
            }
        }

        if inner.rerun.replace(false) {
            self.request();
        }
    }

    fn run_test(&self) {
        let inner = &*self.inner;
        let mut data = inner.data.borrow_mut();

        let passed = (inner.config.test)(&inner.target, &mut *data);
        self.observe(Observation::Evaluated {
            ts: SystemTime::now(),
            watcher: inner.id,
            passed,
        });

        let effect = inner.machine.borrow_mut().transition(passed);
        if let Some(effect) = effect {
            self.observe(Observation::Fired {
                ts: SystemTime::now(),
                watcher: inner.id,
                effect,
            });
            match effect {
                Effect::FirePass => (inner.config.pass)(&inner.target, &mut *data),
                Effect::FireFail => (inner.config.fail)(&inner.target, &mut *data),
            }
        }
    }

    fn report_panic(&self, payload: Box<dyn Any + Send>) {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        self.observe(Observation::Panicked {
            ts: SystemTime::now(),
            watcher: self.inner.id,
            message,
        });
    }

    fn observe(&self, observation: Observation) {
        (self.inner.config.observer)(&observation);
    }
}
