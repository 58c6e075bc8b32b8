//! Tri-state trip tracking for one watched target.

use serde::{Deserialize, Serialize};

/// Last known outcome of the watched condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripState {
    /// No evaluation has completed yet.
    #[default]
    Unset,
    Passing,
    Failing,
}

/// Callback a transition asks the watcher to invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    FirePass,
    FireFail,
}

/// Decides, per test outcome, whether a callback must fire.
///
/// `Unset` counts as "not passing" so the first passing outcome fires `pass`,
/// and as "not failing" so the first failing outcome fires `fail`. Repeating
/// an outcome never fires twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TripMachine {
    state: TripState,
}

impl TripMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TripState {
        self.state
    }

    /// Feed a completed test outcome. The state only ever changes here.
    pub fn transition(&mut self, passed: bool) -> Option<Effect> {
        match (passed, self.state) {
            (true, TripState::Passing) | (false, TripState::Failing) => None,
            (true, _) => {
                self.state = TripState::Passing;
                Some(Effect::FirePass)
            }
            (false, _) => {
                self.state = TripState::Failing;
                Some(Effect::FireFail)
            }
        }
    }
}
