mod config;
mod error;
mod observation;
mod observer;
mod signal;
mod throttle;
mod trip;
mod watcher;

pub use config::{CallbackFn, Options, Settings, TestFn, TripwireConfig};
pub use error::{ConfigError, ConfigOption, Result};
pub use observation::{Observation, WatcherId};
pub use observer::{
    filter_observer, filter_with, no_op_observer, tee_observer, tracing_observer, ObserverFn,
};
pub use signal::{Signal, SignalChannels, SignalHub, SubscriptionId};
pub use throttle::{Decision, Throttle, ThrottleState, DEFAULT_INTERVAL};
pub use trip::{Effect, TripMachine, TripState};
pub use watcher::{attach, Watcher};
