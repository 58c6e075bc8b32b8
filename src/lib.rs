//! Tripwire: fire `pass`/`fail` callbacks exactly when a watched condition
//! flips, re-evaluating no more often than a throttle interval allows.
//!
//! ```ignore
//! let hub = SignalHub::new();
//! let watcher = tripwire::attach(
//!     element,
//!     Options::new()
//!         .test(|el, _| in_viewport(el))
//!         .pass(|el, _| show(el))
//!         .fail(|el, _| hide(el)),
//!     &hub,
//! )?;
//! hub.emit(&Signal::Scroll);
//! ```

pub use tripwire_core::*;

/// Attach one watcher per target, all built from the same options.
///
/// The options are validated once up front, so either every target gets a
/// watcher or none does.
pub fn attach_all<T, D, I>(targets: I, options: &Options<T, D>, hub: &SignalHub) -> Result<Vec<Watcher<T, D>>>
where
    T: 'static,
    D: Default + 'static,
    I: IntoIterator<Item = T>,
{
    options.clone().validate()?;
    let watchers = targets
        .into_iter()
        .map(|target| attach(target, options.clone(), hub))
        .collect::<Result<Vec<_>>>()?;
    tracing::debug!(target: "tripwire", count = watchers.len(), "attached targets");
    Ok(watchers)
}
