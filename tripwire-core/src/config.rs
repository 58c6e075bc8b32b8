//! Watcher configuration.
//!
//! [`Options`] is filled in piecemeal by callers; [`TripwireConfig`] is the
//! validated form a watcher is built from. Validation happens at attach time
//! so a bad configuration never reaches the scheduler.

use std::rc::Rc;

use serde::Deserialize;
use tripwire_macros::Redacted;

use crate::error::{ConfigError, ConfigOption, Result};
use crate::observer::{tracing_observer, ObserverFn};
use crate::throttle::Throttle;

/// Decides the current condition for a target.
pub type TestFn<T, D> = Rc<dyn Fn(&T, &mut D) -> bool>;

/// `pass`, `fail` and `init_data` callbacks.
pub type CallbackFn<T, D> = Rc<dyn Fn(&T, &mut D)>;

/// Serializable part of a watcher's configuration, e.g. loaded from a host's
/// settings file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub throttle: Throttle,
    pub label: Option<String>,
    pub isolate_panics: bool,
}

#[derive(Redacted)]
pub struct Options<T, D> {
    #[redacted]
    test: Option<TestFn<T, D>>,
    #[redacted]
    pass: Option<CallbackFn<T, D>>,
    #[redacted]
    fail: Option<CallbackFn<T, D>>,
    #[redacted]
    init_data: Option<CallbackFn<T, D>>,
    #[redacted]
    observer: Option<ObserverFn>,
    settings: Settings,
}

impl<T, D> Default for Options<T, D> {
    fn default() -> Self {
        Self {
            test: None,
            pass: None,
            fail: None,
            init_data: None,
            observer: None,
            settings: Settings::default(),
        }
    }
}

impl<T, D> Clone for Options<T, D> {
    fn clone(&self) -> Self {
        Self {
            test: self.test.clone(),
            pass: self.pass.clone(),
            fail: self.fail.clone(),
            init_data: self.init_data.clone(),
            observer: self.observer.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<T, D> Options<T, D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from deserialized settings and add the callbacks afterwards.
    pub fn from_settings(settings: Settings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn test(mut self, test: impl Fn(&T, &mut D) -> bool + 'static) -> Self {
        self.test = Some(Rc::new(test));
        self
    }

    pub fn pass(mut self, pass: impl Fn(&T, &mut D) + 'static) -> Self {
        self.pass = Some(Rc::new(pass));
        self
    }

    pub fn fail(mut self, fail: impl Fn(&T, &mut D) + 'static) -> Self {
        self.fail = Some(Rc::new(fail));
        self
    }

    /// Seeds the data once, before the first evaluation.
    pub fn init_data(mut self, init_data: impl Fn(&T, &mut D) + 'static) -> Self {
        self.init_data = Some(Rc::new(init_data));
        self
    }

    pub fn throttle(mut self, throttle: impl Into<Throttle>) -> Self {
        self.settings.throttle = throttle.into();
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.settings.label = Some(label.into());
        self
    }

    pub fn observer(mut self, observer: ObserverFn) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Catch and log panics from callbacks instead of unwinding into the caller.
    pub fn isolate_panics(mut self, isolate: bool) -> Self {
        self.settings.isolate_panics = isolate;
        self
    }

    pub fn validate(self) -> Result<TripwireConfig<T, D>>
    where
        T: 'static,
        D: 'static,
    {
        TripwireConfig::try_from(self)
    }
}

/// Validated configuration. Optional callbacks have been replaced by no-ops.
#[derive(Redacted)]
pub struct TripwireConfig<T, D> {
    #[redacted]
    pub(crate) test: TestFn<T, D>,
    #[redacted]
    pub(crate) pass: CallbackFn<T, D>,
    #[redacted]
    pub(crate) fail: CallbackFn<T, D>,
    #[redacted]
    pub(crate) init_data: CallbackFn<T, D>,
    #[redacted]
    pub(crate) observer: ObserverFn,
    pub(crate) throttle: Throttle,
    pub(crate) label: Option<String>,
    pub(crate) isolate_panics: bool,
}

impl<T, D> TripwireConfig<T, D> {
    pub fn throttle(&self) -> Throttle {
        self.throttle
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn isolates_panics(&self) -> bool {
        self.isolate_panics
    }
}

fn noop<T: 'static, D: 'static>() -> CallbackFn<T, D> {
    Rc::new(|_: &T, _: &mut D| {})
}

impl<T: 'static, D: 'static> TryFrom<Options<T, D>> for TripwireConfig<T, D> {
    type Error = ConfigError;

    fn try_from(options: Options<T, D>) -> Result<Self> {
        let test = options.test.ok_or(ConfigError::Missing {
            option: ConfigOption::Test,
        })?;
        let pass = options.pass.ok_or(ConfigError::Missing {
            option: ConfigOption::Pass,
        })?;

        Ok(Self {
            test,
            pass,
            fail: options.fail.unwrap_or_else(noop),
            init_data: options.init_data.unwrap_or_else(noop),
            observer: options.observer.unwrap_or_else(tracing_observer),
            throttle: options.settings.throttle,
            label: options.settings.label,
            isolate_panics: options.settings.isolate_panics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    type Opts = Options<&'static str, Vec<u32>>;

    #[test]
    fn missing_test_is_reported_first() {
        let err = Opts::new().validate().unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing {
                option: ConfigOption::Test
            }
        );
    }

    #[test]
    fn missing_pass() {
        let err = Opts::new().test(|_, _| true).validate().unwrap_err();
        assert_eq!(err.option(), ConfigOption::Pass);
    }

    #[test]
    fn defaults_apply() {
        let config = Opts::new()
            .test(|_, _| true)
            .pass(|_, _| {})
            .validate()
            .expect("valid");
        assert_eq!(config.throttle(), Throttle::Enabled);
        assert_eq!(config.label(), None);
        assert!(!config.isolates_panics());

        let mut data = vec![1];
        (config.fail)(&"t", &mut data);
        (config.init_data)(&"t", &mut data);
        assert_eq!(data, vec![1]);
    }

    #[test]
    fn settings_load_from_json() {
        let settings: Settings =
            serde_json::from_str(r#"{"throttle": 40, "label": "hero", "isolatePanics": true}"#)
                .expect("settings");
        let config = Opts::from_settings(settings)
            .test(|_, _| true)
            .pass(|_, _| {})
            .validate()
            .expect("valid");
        assert_eq!(config.throttle(), Throttle::Interval(Duration::from_millis(40)));
        assert_eq!(config.label(), Some("hero"));
        assert!(config.isolates_panics());
    }

    #[test]
    fn oversized_throttle_in_settings_is_an_error() {
        let err = serde_json::from_str::<Settings>(r#"{"throttle": 1e300}"#).unwrap_err();
        assert!(err.to_string().contains("throttle"));
    }

    #[test]
    fn empty_settings_use_defaults() {
        let settings: Settings = serde_json::from_str("{}").expect("settings");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn debug_redacts_callbacks() {
        let options = Opts::new().test(|_, _| true).label("nav");
        let rendered = format!("{:?}", options);
        assert!(rendered.contains("<redacted>"));
        assert!(rendered.contains("nav"));
    }

    #[test]
    fn validated_config_debug_shows_settings_only() {
        let config = Opts::new()
            .test(|_, _| true)
            .pass(|_, _| {})
            .throttle(false)
            .validate()
            .expect("valid");
        let rendered = format!("{:?}", config);
        assert!(rendered.starts_with("TripwireConfig {"));
        assert!(rendered.contains("test: <redacted>"));
        assert!(rendered.contains("throttle: Disabled"));
    }
}
