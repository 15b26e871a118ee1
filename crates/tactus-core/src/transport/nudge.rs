//! Accelerating repeat for the rewind and fast-forward buttons.
//!
//! The controller only computes what a press or tick should do; the state
//! machine applies the returned [`NudgeAction`]. All methods take the current
//! time so the behaviour can be driven deterministically.

use std::time::{Duration, Instant};

const ACCEL_START: f64 = 1.0;
const ACCEL_STEP: f64 = 0.1;
const ACCEL_MAX: f64 = 6.0;

/// Scrub units per second of held button, before acceleration.
const UNITS_PER_SECOND: f64 = 10.0;

/// Presses younger than this snap to the grid instead of scrubbing.
const QUICK_SNAP_WINDOW: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NudgeDirection {
    Rewind,
    FastForward,
}

impl NudgeDirection {
    pub fn opposite(self) -> Self {
        match self {
            Self::Rewind => Self::FastForward,
            Self::FastForward => Self::Rewind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NudgeAction {
    /// Move by `units` scrub intervals; negative is backwards.
    Scrub { units: f64 },
    /// Jump to the next grid line in `direction`.
    Snap(NudgeDirection),
}

#[derive(Debug)]
struct ButtonRepeater {
    down: bool,
    first_press: bool,
    accel: f64,
    button_down_time: Instant,
    last_click_time: Instant,
}

impl ButtonRepeater {
    fn new(now: Instant) -> Self {
        Self {
            down: false,
            first_press: false,
            accel: ACCEL_START,
            button_down_time: now,
            last_click_time: now,
        }
    }

    /// Returns whether the down state changed.
    fn set_down(&mut self, down: bool, now: Instant) -> bool {
        self.accel = ACCEL_START;
        self.last_click_time = now;

        if down == self.down {
            return false;
        }
        self.down = down;
        if down {
            self.first_press = true;
            self.button_down_time = now;
        }
        true
    }

    fn tick(&mut self, direction: NudgeDirection, snap: bool, now: Instant) -> Option<NudgeAction> {
        let mut secs = now.saturating_duration_since(self.last_click_time).as_secs_f64();
        self.last_click_time = now;

        if direction == NudgeDirection::Rewind {
            secs = -secs;
        }

        if snap && now.saturating_duration_since(self.button_down_time) < QUICK_SNAP_WINDOW {
            if self.first_press {
                self.first_press = false;
                return Some(NudgeAction::Snap(direction));
            }
            return None;
        }

        secs *= self.accel;
        self.accel = (self.accel + ACCEL_STEP).min(ACCEL_MAX);

        Some(NudgeAction::Scrub {
            units: secs * UNITS_PER_SECOND,
        })
    }
}

#[derive(Debug)]
pub struct NudgeController {
    rewind: ButtonRepeater,
    fast_forward: ButtonRepeater,
    snap: bool,
}

impl NudgeController {
    pub fn new(now: Instant) -> Self {
        Self {
            rewind: ButtonRepeater::new(now),
            fast_forward: ButtonRepeater::new(now),
            snap: true,
        }
    }

    /// Enable the quick snap at the start of a press.
    pub fn set_snap(&mut self, snap: bool) {
        self.snap = snap;
    }

    pub fn is_down(&self, direction: NudgeDirection) -> bool {
        self.button(direction).down
    }

    pub fn any_down(&self) -> bool {
        self.rewind.down || self.fast_forward.down
    }

    /// Current acceleration factor of `direction`.
    pub fn acceleration(&self, direction: NudgeDirection) -> f64 {
        self.button(direction).accel
    }

    /// Press `direction` and run its first tick immediately.
    pub fn press_at(&mut self, direction: NudgeDirection, now: Instant) -> Option<NudgeAction> {
        if self.button_mut(direction).set_down(true, now) {
            self.tick_one(direction, now)
        } else {
            None
        }
    }

    pub fn release_at(&mut self, direction: NudgeDirection, now: Instant) {
        self.button_mut(direction).set_down(false, now);
    }

    /// Repeat tick for whichever button is held.
    pub fn tick_at(&mut self, now: Instant) -> Option<NudgeAction> {
        if self.rewind.down {
            if let Some(action) = self.tick_one(NudgeDirection::Rewind, now) {
                return Some(action);
            }
        }
        if self.fast_forward.down {
            return self.tick_one(NudgeDirection::FastForward, now);
        }
        None
    }

    /// A single press, tick and release.
    pub fn nudge_at(&mut self, direction: NudgeDirection, now: Instant) -> Vec<NudgeAction> {
        let mut actions = Vec::with_capacity(2);
        actions.extend(self.press_at(direction, now));
        actions.extend(self.tick_one(direction, now));
        self.release_at(direction, now);
        actions
    }

    fn tick_one(&mut self, direction: NudgeDirection, now: Instant) -> Option<NudgeAction> {
        // don't respond to both buttons at once
        let (this, other) = match direction {
            NudgeDirection::Rewind => (&self.rewind, &self.fast_forward),
            NudgeDirection::FastForward => (&self.fast_forward, &self.rewind),
        };
        if other.down && other.button_down_time <= this.button_down_time {
            return None;
        }

        let snap = self.snap;
        self.button_mut(direction).tick(direction, snap, now)
    }

    fn button(&self, direction: NudgeDirection) -> &ButtonRepeater {
        match direction {
            NudgeDirection::Rewind => &self.rewind,
            NudgeDirection::FastForward => &self.fast_forward,
        }
    }

    fn button_mut(&mut self, direction: NudgeDirection) -> &mut ButtonRepeater {
        match direction {
            NudgeDirection::Rewind => &mut self.rewind,
            NudgeDirection::FastForward => &mut self.fast_forward,
        }
    }
}
