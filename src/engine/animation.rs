//! Time-based animation plans for both wheel variants.
//!
//! A plan is computed once from the pre-drawn winner and then sampled against
//! elapsed wall-clock time, so the number or spacing of ticks never changes
//! where the animation ends.

use std::time::Duration;

use crate::presentation::{WheelFrame, WheelLayout, layout::FULL_TURN};

/// Result of sampling a plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSample {
    /// Frame to draw.
    pub frame: WheelFrame,
    /// Whether this is the final frame.
    pub finished: bool,
}

/// Monotonic decelerating easing (`1 - (1 - t)^4`); its slope reaches zero at `t = 1`.
pub fn ease_out_quart(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(4)
}

/// Continuous variant: rotate from `start` to `target` with easing.
#[derive(Debug, Clone, PartialEq)]
pub struct RotationPlan {
    start: f64,
    target: f64,
    duration: Duration,
}

impl RotationPlan {
    /// Plan a spin that ends with `fraction` of the winner's sector under the pointer.
    ///
    /// The target is `start + min_turns * 360 + offset` where the offset in
    /// `[0, 360)` is derived from the winner, never the other way around.
    pub fn towards(
        layout: &WheelLayout,
        start: f64,
        winner_index: usize,
        fraction: f64,
        min_turns: u32,
        duration: Duration,
    ) -> Self {
        let resting = layout.resting_rotation(winner_index, fraction);
        let offset = (resting - start).rem_euclid(FULL_TURN);
        let offset = if offset >= FULL_TURN { 0.0 } else { offset };
        let target = start + f64::from(min_turns) * FULL_TURN + offset;

        Self {
            start,
            target,
            duration,
        }
    }

    /// Rotation the wheel starts from.
    pub fn start(&self) -> f64 {
        self.start
    }

    /// Rotation the wheel comes to rest at.
    pub fn target(&self) -> f64 {
        self.target
    }

    /// Sample the eased rotation `elapsed` after the start.
    pub fn sample(&self, elapsed: Duration) -> FrameSample {
        let progress = if self.duration.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
        };

        let angle = if progress >= 1.0 {
            self.target
        } else {
            self.start + (self.target - self.start) * ease_out_quart(progress)
        };

        FrameSample {
            frame: WheelFrame::Rotation { angle },
            finished: progress >= 1.0,
        }
    }
}

/// Tuning of the discrete highlight variant. Cosmetic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightTiming {
    /// Full revolutions required before the highlight may stop.
    pub min_rounds: u32,
    /// Delay between the first steps.
    pub initial_delay: Duration,
    /// Delay increase per step, multiplied by the completed revolutions.
    pub delay_step: Duration,
    /// Upper bound of the per-step delay.
    pub max_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Step {
    at: Duration,
    index: usize,
}

/// Discrete variant: a highlight walking the ring with growing delays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightPlan {
    steps: Vec<Step>,
}

impl HighlightPlan {
    /// Precompute the highlight schedule ending on `winner_index`.
    ///
    /// The highlight starts on sector 0, completes at least `min_rounds` full
    /// revolutions and then stops the first time it reaches the winner.
    pub fn towards(option_count: usize, winner_index: usize, timing: HighlightTiming) -> Self {
        let count = option_count.max(1);
        let winner_index = winner_index.min(count - 1);

        let mut steps = Vec::new();
        let mut at = Duration::ZERO;
        let mut delay = timing.initial_delay;
        let mut index = 0;
        let mut rounds = 0u32;

        loop {
            steps.push(Step { at, index });
            if rounds >= timing.min_rounds && index == winner_index {
                break;
            }

            index = (index + 1) % count;
            if index == 0 {
                rounds += 1;
            }
            delay = (delay + timing.delay_step * rounds).min(timing.max_delay);
            at += delay;
        }

        Self { steps }
    }

    /// Number of highlight steps, the final one included.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Time of the final step.
    pub fn total_duration(&self) -> Duration {
        self.steps.last().map_or(Duration::ZERO, |step| step.at)
    }

    /// Highlight active `elapsed` after the start.
    pub fn sample(&self, elapsed: Duration) -> FrameSample {
        let reached = self.steps.partition_point(|step| step.at <= elapsed);
        let current = reached.saturating_sub(1).min(self.steps.len().saturating_sub(1));
        let index = self.steps.get(current).map_or(0, |step| step.index);

        FrameSample {
            frame: WheelFrame::Highlight { index },
            finished: reached >= self.steps.len(),
        }
    }
}

/// Animation for one spin session.
#[derive(Debug, Clone, PartialEq)]
pub enum Animation {
    /// Continuous rotation.
    Rotation(RotationPlan),
    /// Discrete highlight cycling.
    Highlight(HighlightPlan),
}

impl Animation {
    /// Sample the frame for `elapsed` time since the animation started.
    pub fn sample(&self, elapsed: Duration) -> FrameSample {
        match self {
            Animation::Rotation(plan) => plan.sample(elapsed),
            Animation::Highlight(plan) => plan.sample(elapsed),
        }
    }
}
