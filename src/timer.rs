//! Per-session countdown for the challenge being done.
//!
//! Pure state: the caller owns the clock and calls `tick()` once a second.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
    Finished,
}

/// What a single `tick()` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not running; nothing changed.
    Ignored,
    /// One second elapsed; `remaining` left.
    Counted { remaining: u32 },
    /// The countdown reached its end on this tick.
    Finished,
}

#[derive(Debug, Clone)]
pub struct CountdownTimer {
    status: TimerStatus,
    initial: u32,
    remaining: u32,
}

impl Default for CountdownTimer {
    fn default() -> Self {
        Self {
            status: TimerStatus::Idle,
            initial: 0,
            remaining: 0,
        }
    }
}

impl CountdownTimer {
    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining
    }

    pub fn initial_secs(&self) -> u32 {
        self.initial
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.initial.saturating_sub(self.remaining)
    }

    /// True while a countdown is in progress (running or paused).
    pub fn is_active(&self) -> bool {
        matches!(self.status, TimerStatus::Running | TimerStatus::Paused)
    }

    /// Start a fresh countdown, discarding any previous one.
    pub fn start(&mut self, secs: u32) {
        self.initial = secs;
        self.remaining = secs;
        self.status = TimerStatus::Running;
    }

    pub fn pause(&mut self) -> bool {
        if self.status != TimerStatus::Running {
            return false;
        }
        self.status = TimerStatus::Paused;
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.status != TimerStatus::Paused {
            return false;
        }
        self.status = TimerStatus::Running;
        true
    }

    /// Abandon the countdown. Remaining drops to zero; status goes back to idle.
    pub fn stop(&mut self) {
        self.remaining = 0;
        self.status = TimerStatus::Idle;
    }

    pub fn tick(&mut self) -> TickOutcome {
        if self.status != TimerStatus::Running {
            return TickOutcome::Ignored;
        }
        if self.remaining == 0 {
            self.status = TimerStatus::Finished;
            return TickOutcome::Finished;
        }
        self.remaining -= 1;
        TickOutcome::Counted {
            remaining: self.remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_down_then_finishes_on_the_following_tick() {
        let mut t = CountdownTimer::default();
        t.start(2);
        assert_eq!(t.tick(), TickOutcome::Counted { remaining: 1 });
        assert_eq!(t.tick(), TickOutcome::Counted { remaining: 0 });
        assert_eq!(t.status(), TimerStatus::Running);
        assert_eq!(t.tick(), TickOutcome::Finished);
        assert_eq!(t.status(), TimerStatus::Finished);
        assert_eq!(t.tick(), TickOutcome::Ignored);
        assert_eq!(t.elapsed_secs(), 2);
    }

    #[test]
    fn pause_freezes_and_resume_continues() {
        let mut t = CountdownTimer::default();
        t.start(60);
        t.tick();
        assert!(t.pause());
        assert!(!t.pause());
        assert_eq!(t.tick(), TickOutcome::Ignored);
        assert_eq!(t.remaining_secs(), 59);
        assert!(t.resume());
        assert_eq!(t.tick(), TickOutcome::Counted { remaining: 58 });
        assert_eq!(t.elapsed_secs(), 2);
        assert!(t.is_active());
    }

    #[test]
    fn stop_zeroes_without_finishing() {
        let mut t = CountdownTimer::default();
        t.start(30);
        t.tick();
        t.stop();
        assert_eq!(t.status(), TimerStatus::Idle);
        assert_eq!(t.remaining_secs(), 0);
        assert!(!t.is_active());
        assert_eq!(t.tick(), TickOutcome::Ignored);
        assert!(!t.resume());
    }

    #[test]
    fn restart_discards_previous_countdown() {
        let mut t = CountdownTimer::default();
        t.start(10);
        t.tick();
        t.start(5);
        assert_eq!(t.initial_secs(), 5);
        assert_eq!(t.elapsed_secs(), 0);
    }
}
