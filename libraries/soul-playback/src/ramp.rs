//! Stepped gain ramp
//!
//! A ramp moves a gain from one level to another in a fixed number of equal
//! steps, one step per interval. It is polled with the current time rather
//! than owning a timer, so the driver (tokio interval, browser timer, test)
//! decides how often it runs; late polls catch up on every step that fell due.

use std::time::Duration;

/// Gain ramp state machine
#[derive(Debug, Clone, PartialEq)]
pub struct GainRamp {
    from: f32,
    target: f32,
    steps: u32,
    taken: u32,
    interval: Duration,
    next_due: Duration,
    cancelled: bool,
}

impl GainRamp {
    /// Start a ramp at `now`; the first step falls due one interval later
    pub fn new(from: f32, target: f32, steps: u32, interval: Duration, now: Duration) -> Self {
        Self {
            from,
            target,
            steps: steps.max(1),
            taken: 0,
            interval,
            next_due: now + interval,
            cancelled: false,
        }
    }

    /// Gain reached so far
    pub fn current(&self) -> f32 {
        if self.taken >= self.steps {
            self.target
        } else {
            self.from + (self.target - self.from) * (self.taken as f32 / self.steps as f32)
        }
    }

    /// Gain the ramp is heading to
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Steps taken so far
    pub fn steps_taken(&self) -> u32 {
        self.taken
    }

    /// Total number of steps
    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Fraction of steps taken, 0.0 to 1.0
    pub fn progress(&self) -> f32 {
        self.taken as f32 / self.steps as f32
    }

    /// Whether the target was reached or the ramp was cancelled
    pub fn is_finished(&self) -> bool {
        self.cancelled || self.taken >= self.steps
    }

    /// Take every step due at `now`
    ///
    /// Returns the new gain if at least one step was taken.
    pub fn poll(&mut self, now: Duration) -> Option<f32> {
        if self.is_finished() || now < self.next_due {
            return None;
        }
        while self.taken < self.steps && now >= self.next_due {
            self.taken += 1;
            self.next_due += self.interval;
        }
        Some(self.current())
    }

    /// Aim at a new target over the remaining steps
    pub fn retarget(&mut self, target: f32) {
        if self.is_finished() {
            self.from = target;
            self.target = target;
            return;
        }
        let current = self.current();
        self.from = current;
        self.target = target;
        self.steps -= self.taken;
        self.taken = 0;
    }

    /// Multiply both ends of the ramp, keeping its progress
    ///
    /// Two ramps summing to a level keep summing to the scaled level.
    pub fn scale(&mut self, factor: f32) {
        self.from *= factor;
        self.target *= factor;
    }

    /// Jump straight to the target and stop
    pub fn finish(&mut self) -> f32 {
        self.taken = self.steps;
        self.target
    }

    /// Stop where it is
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS_100: Duration = Duration::from_millis(100);

    #[test]
    fn steps_once_per_interval() {
        let mut ramp = GainRamp::new(0.0, 1.0, 10, MS_100, Duration::ZERO);

        assert_eq!(ramp.poll(Duration::from_millis(50)), None);
        let g = ramp.poll(Duration::from_millis(100)).unwrap();
        assert!((g - 0.1).abs() < 1e-6);
        assert_eq!(ramp.poll(Duration::from_millis(150)), None);
    }

    #[test]
    fn late_poll_catches_up() {
        let mut ramp = GainRamp::new(1.0, 0.0, 10, MS_100, Duration::ZERO);
        let g = ramp.poll(Duration::from_millis(450)).unwrap();
        assert_eq!(ramp.steps_taken(), 4);
        assert!((g - 0.6).abs() < 1e-6);
    }

    #[test]
    fn ends_exactly_on_target() {
        let mut ramp = GainRamp::new(0.3, 0.0, 10, MS_100, Duration::ZERO);
        assert_eq!(ramp.poll(Duration::from_secs(5)), Some(0.0));
        assert!(ramp.is_finished());
        assert_eq!(ramp.poll(Duration::from_secs(6)), None);
    }

    #[test]
    fn cancel_freezes_gain() {
        let mut ramp = GainRamp::new(0.0, 1.0, 10, MS_100, Duration::ZERO);
        ramp.poll(Duration::from_millis(300));
        ramp.cancel();
        assert!(ramp.is_finished());
        assert_eq!(ramp.poll(Duration::from_secs(2)), None);
        assert!((ramp.current() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn retarget_uses_remaining_steps() {
        let mut ramp = GainRamp::new(0.0, 1.0, 10, MS_100, Duration::ZERO);
        ramp.poll(Duration::from_millis(500));
        ramp.retarget(0.5);
        assert_eq!(ramp.steps(), 5);
        assert_eq!(ramp.poll(Duration::from_millis(1000)), Some(0.5));
    }

    #[test]
    fn scale_keeps_progress_and_mirrored_sum() {
        let mut out = GainRamp::new(0.8, 0.0, 10, MS_100, Duration::ZERO);
        let mut inc = GainRamp::new(0.0, 0.8, 10, MS_100, Duration::ZERO);
        out.poll(Duration::from_millis(500));
        inc.poll(Duration::from_millis(500));

        out.scale(0.25);
        inc.scale(0.25);
        assert_eq!(out.steps_taken(), 5);
        assert!((out.current() + inc.current() - 0.2).abs() < 1e-6);
        assert!((inc.target() - 0.2).abs() < 1e-6);

        out.poll(Duration::from_millis(700));
        inc.poll(Duration::from_millis(700));
        assert!((out.current() + inc.current() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn zero_steps_behaves_as_one() {
        let mut ramp = GainRamp::new(0.0, 0.8, 0, MS_100, Duration::ZERO);
        assert_eq!(ramp.poll(MS_100), Some(0.8));
    }
}
