//! Timeline timing and clock resolution
//!
//! A [`Timing`] turns "time since Begin, in the parent's units" into a
//! [`ClockSnapshot`]: which phase the timeline is in, which iteration it is
//! on, and how far through its simple duration it sits. Timelines never
//! accumulate state per tick; the same elapsed time always resolves to the
//! same snapshot, which is what makes Seek and nested storyboards cheap.
//!
//! Times are milliseconds.

/// Simple duration of one forward pass
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Duration {
    /// Derived from the timeline's content (children or key frames)
    #[default]
    Automatic,
    Time(f64),
    Forever,
}

/// How many times the simple duration (plus reverse) repeats
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RepeatBehavior {
    Count(u32),
    Forever,
    /// Total active time, in the timeline's own (speed-scaled) time
    Duration(f64),
}

impl Default for RepeatBehavior {
    fn default() -> Self {
        RepeatBehavior::Count(1)
    }
}

/// What happens to animated values once the active period ends
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FillBehavior {
    /// Hold the final value
    #[default]
    HoldEnd,
    /// Release the value back to the underlying sources
    Stop,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timing {
    pub begin_offset: f64,
    pub duration: Duration,
    pub speed_ratio: f64,
    pub auto_reverse: bool,
    pub repeat: RepeatBehavior,
    pub fill: FillBehavior,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            begin_offset: 0.0,
            duration: Duration::Automatic,
            speed_ratio: 1.0,
            auto_reverse: false,
            repeat: RepeatBehavior::Count(1),
            fill: FillBehavior::HoldEnd,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockPhase {
    /// Elapsed time has not reached the begin offset
    Before,
    Active,
    /// Active period is over; the snapshot describes the end position
    Completed,
}

/// Resolved position of a timeline
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockSnapshot {
    pub phase: ClockPhase,
    /// Position inside the current iteration, reverse half included
    pub current_time: f64,
    /// Position inside the forward simple duration; children of a storyboard
    /// are driven by this
    pub simple_time: f64,
    pub iteration: u32,
    /// `simple_time / duration`, in `[0, 1]`
    pub progress: f64,
    /// In the reverse half of an auto-reversing iteration
    pub reversed: bool,
}

impl ClockSnapshot {
    pub const BEFORE: ClockSnapshot = ClockSnapshot {
        phase: ClockPhase::Before,
        current_time: 0.0,
        simple_time: 0.0,
        iteration: 0,
        progress: 0.0,
        reversed: false,
    };
}

impl Timing {
    fn speed(&self) -> f64 {
        if self.speed_ratio > 0.0 && self.speed_ratio.is_finite() {
            self.speed_ratio
        } else {
            1.0
        }
    }

    /// Simple duration given the timeline's natural duration; `None` is unbounded
    pub fn simple_duration(&self, natural: Option<f64>) -> Option<f64> {
        match self.duration {
            Duration::Time(ms) => Some(ms.max(0.0)),
            Duration::Forever => None,
            Duration::Automatic => natural.map(|ms| ms.max(0.0)),
        }
    }

    /// One iteration, forward plus reverse
    fn period(&self, simple: f64) -> f64 {
        if self.auto_reverse {
            simple * 2.0
        } else {
            simple
        }
    }

    /// Active duration in the timeline's own time; `None` is unbounded
    fn active_local(&self, simple: Option<f64>) -> Option<f64> {
        match self.repeat {
            RepeatBehavior::Forever => None,
            RepeatBehavior::Duration(ms) => Some(ms.max(0.0)),
            RepeatBehavior::Count(n) => simple.map(|d| self.period(d) * n.max(1) as f64),
        }
    }

    /// Begin offset plus active duration, in parent time; `None` is unbounded
    pub fn end_time(&self, natural: Option<f64>) -> Option<f64> {
        self.active_local(self.simple_duration(natural))
            .map(|active| self.begin_offset + active / self.speed())
    }

    /// Resolve `parent_elapsed` (time since Begin, parent units)
    pub fn resolve(&self, parent_elapsed: f64, natural: Option<f64>) -> ClockSnapshot {
        let local = (parent_elapsed - self.begin_offset) * self.speed();
        if local < 0.0 {
            return ClockSnapshot::BEFORE;
        }

        let simple = self.simple_duration(natural);
        let active = self.active_local(simple);

        let Some(d) = simple else {
            // Unbounded simple duration; only a repeat duration can end it
            let (phase, time) = match active {
                Some(end) if local >= end => (ClockPhase::Completed, end),
                _ => (ClockPhase::Active, local),
            };
            return ClockSnapshot {
                phase,
                current_time: time,
                simple_time: time,
                iteration: 0,
                progress: 0.0,
                reversed: false,
            };
        };

        let period = self.period(d);
        if period <= 0.0 {
            let end_progress = if self.auto_reverse { 0.0 } else { 1.0 };
            return ClockSnapshot {
                phase: ClockPhase::Completed,
                current_time: 0.0,
                simple_time: 0.0,
                iteration: 0,
                progress: end_progress,
                reversed: self.auto_reverse,
            };
        }

        let (phase, iteration, in_iteration) = match active {
            Some(end) if local >= end => {
                if end <= 0.0 {
                    (ClockPhase::Completed, 0, 0.0)
                } else {
                    let iteration = ((end / period).ceil() as u32).saturating_sub(1);
                    (ClockPhase::Completed, iteration, end - iteration as f64 * period)
                }
            }
            _ => {
                let iteration = (local / period).floor();
                (ClockPhase::Active, iteration as u32, local - iteration * period)
            }
        };

        let (simple_time, reversed) = if self.auto_reverse && in_iteration > d {
            ((2.0 * d - in_iteration).max(0.0), true)
        } else {
            (in_iteration.min(d), false)
        };
        let progress = if d > 0.0 { simple_time / d } else { 1.0 };

        ClockSnapshot {
            phase,
            current_time: in_iteration,
            simple_time,
            iteration,
            progress: progress.clamp(0.0, 1.0),
            reversed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing(ms: f64) -> Timing {
        Timing {
            duration: Duration::Time(ms),
            ..Timing::default()
        }
    }

    #[test]
    fn test_single_pass() {
        let t = timing(1000.0);
        let mid = t.resolve(500.0, None);
        assert_eq!(mid.phase, ClockPhase::Active);
        assert_eq!(mid.progress, 0.5);

        let end = t.resolve(1000.0, None);
        assert_eq!(end.phase, ClockPhase::Completed);
        assert_eq!(end.progress, 1.0);
        assert_eq!(end.iteration, 0);

        let past = t.resolve(5000.0, None);
        assert_eq!(past, end);
    }

    #[test]
    fn test_begin_offset_and_speed() {
        let t = Timing {
            begin_offset: 200.0,
            speed_ratio: 2.0,
            ..timing(1000.0)
        };
        assert_eq!(t.resolve(100.0, None).phase, ClockPhase::Before);
        assert_eq!(t.resolve(450.0, None).progress, 0.5);
        assert_eq!(t.end_time(None), Some(700.0));
        assert_eq!(t.resolve(700.0, None).phase, ClockPhase::Completed);
    }

    #[test]
    fn test_auto_reverse_folds_progress() {
        let t = Timing {
            auto_reverse: true,
            ..timing(1000.0)
        };
        assert_eq!(t.resolve(500.0, None).progress, 0.5);
        let back = t.resolve(1500.0, None);
        assert!(back.reversed);
        assert_eq!(back.progress, 0.5);

        let end = t.resolve(2000.0, None);
        assert_eq!(end.phase, ClockPhase::Completed);
        assert_eq!(end.progress, 0.0);
    }

    #[test]
    fn test_repeat_count_and_duration() {
        let t = Timing {
            repeat: RepeatBehavior::Count(3),
            ..timing(100.0)
        };
        let second = t.resolve(150.0, None);
        assert_eq!(second.iteration, 1);
        assert_eq!(second.progress, 0.5);
        let end = t.resolve(300.0, None);
        assert_eq!(end.phase, ClockPhase::Completed);
        assert_eq!(end.iteration, 2);
        assert_eq!(end.progress, 1.0);

        let partial = Timing {
            repeat: RepeatBehavior::Duration(250.0),
            ..timing(100.0)
        };
        let end = partial.resolve(400.0, None);
        assert_eq!(end.phase, ClockPhase::Completed);
        assert_eq!(end.iteration, 2);
        assert!((end.progress - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_forever() {
        let repeat = Timing {
            repeat: RepeatBehavior::Forever,
            ..timing(100.0)
        };
        assert_eq!(repeat.end_time(None), None);
        assert_eq!(repeat.resolve(1_000_050.0, None).phase, ClockPhase::Active);

        let unbounded = Timing {
            duration: Duration::Forever,
            ..Timing::default()
        };
        let snap = unbounded.resolve(5000.0, None);
        assert_eq!(snap.phase, ClockPhase::Active);
        assert_eq!(snap.simple_time, 5000.0);
    }

    #[test]
    fn test_automatic_uses_natural_duration() {
        let t = Timing::default();
        assert_eq!(t.resolve(250.0, Some(500.0)).progress, 0.5);
        assert_eq!(t.end_time(Some(500.0)), Some(500.0));
        assert_eq!(t.end_time(None), None);
    }

    #[test]
    fn test_zero_duration_completes_immediately() {
        let snap = timing(0.0).resolve(0.0, None);
        assert_eq!(snap.phase, ClockPhase::Completed);
        assert_eq!(snap.progress, 1.0);
    }
}
