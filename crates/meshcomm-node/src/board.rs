//! Host stand-in for the board's LEDs and buttons.
//!
//! LED changes are logged. Button state is set by the console (or by the
//! sleepy-at-boot setting) and read back by the engine.

use std::collections::{HashMap, HashSet};

use meshcomm_commissioning::{ButtonId, Indicator};

#[derive(Debug, Default)]
pub struct LogBoard {
    indicators: HashMap<Indicator, bool>,
    pressed: HashSet<ButtonId>,
}

impl LogBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn indicator(&self, indicator: Indicator) -> bool {
        self.indicators.get(&indicator).copied().unwrap_or(false)
    }

    pub fn set_indicator(&mut self, indicator: Indicator, on: bool) {
        let previous = self.indicators.insert(indicator, on).unwrap_or(false);
        if previous != on {
            tracing::info!(led = ?indicator, on, "indicator");
        }
    }

    pub fn is_pressed(&self, button: ButtonId) -> bool {
        self.pressed.contains(&button)
    }

    pub fn press(&mut self, button: ButtonId) {
        self.pressed.insert(button);
    }

    pub fn release(&mut self, button: ButtonId) {
        self.pressed.remove(&button);
    }
}
