/// Outcome of feeding one sample into a [`HysteresisCounter`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Transition {
    Idle,
    Accumulating,
    /// The counter just reached the window.
    Detected { start: f64 },
    /// The condition ceased after the episode was detected.
    Ended { start: f64, last: f64 },
}

/// Confirm/release debounce shared by every tracker.
///
/// Consecutive in-condition samples increment the count. `Detected` fires on the one
/// sample where the count equals the window, so an episode is reported once however
/// long it lasts. When the condition ceases the count resets; `Ended` fires only if
/// the episode had reached the window.
#[derive(Clone, Debug)]
pub struct HysteresisCounter {
    window: usize,
    count: usize,
    start: f64,
    last: f64,
}

impl HysteresisCounter {
    pub fn new(window: usize) -> Self {
        Self { window: window.max(1), count: 0, start: 0.0, last: 0.0 }
    }

    pub fn observe(&mut self, active: bool, timestamp: f64) -> Transition {
        if active {
            self.count += 1;
            if self.count == 1 {
                self.start = timestamp;
            }
            self.last = timestamp;
            if self.count == self.window {
                return Transition::Detected { start: self.start };
            }
            return Transition::Accumulating;
        }

        let reached = self.count >= self.window;
        let (start, last) = (self.start, self.last);
        self.reset();
        if reached {
            Transition::Ended { start, last }
        } else {
            Transition::Idle
        }
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.start = 0.0;
        self.last = 0.0;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn window(&self) -> usize {
        self.window
    }
}
