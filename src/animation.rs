//! Time-driven interpolation
//!
//! An [`Animation`] interpolates linearly between a start and a target value over a
//! fixed duration, optionally remapping progress through an [`Easing`] curve. It does
//! not own a timer: the owner polls it with [`Animation::tick`] once per repaint of the
//! output it was started on, and applies the returned value.
//!
//! ```
//! use std::time::Duration;
//! use meridian::animation::{Animation, AnimationFrame};
//! use meridian::utils::{Rectangle, Time};
//! # use meridian::{config::ShellConfig, shell::Shell};
//! # let mut shell = Shell::new(ShellConfig::default());
//! # let output = shell.add_output("DP-1", Rectangle::from_loc_and_size((0, 0), (1920, 1080)));
//!
//! let mut fade = Animation::new(0.0_f64, 1.0);
//! fade.run(output, Duration::from_millis(100));
//!
//! assert_eq!(fade.tick(Time::from_millis(1000)), Some(AnimationFrame::Update(0.0)));
//! assert_eq!(fade.tick(Time::from_millis(1050)), Some(AnimationFrame::Update(0.5)));
//! assert_eq!(fade.tick(Time::from_millis(1101)), Some(AnimationFrame::Finished(1.0)));
//! assert_eq!(fade.tick(Time::from_millis(1200)), None);
//! ```

use std::{fmt, time::Duration};

use tracing::trace;

use crate::{
    output::OutputId,
    utils::{Logical, Point, Time},
};

/// Values an [`Animation`] can interpolate
pub trait Lerp: Copy {
    /// Linear interpolation between `self` and `target`, `f` being in `[0, 1]`
    fn lerp(self, target: Self, f: f64) -> Self;
}

impl Lerp for f64 {
    #[inline]
    fn lerp(self, target: Self, f: f64) -> Self {
        self + (target - self) * f
    }
}

impl Lerp for Point<f64, Logical> {
    #[inline]
    fn lerp(self, target: Self, f: f64) -> Self {
        Point::new(self.x.lerp(target.x, f), self.y.lerp(target.y, f))
    }
}

/// Monotonic remapping of the animation progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Easing {
    /// Progress maps to itself
    #[default]
    Linear,
    /// Decelerating towards the target
    OutQuad,
    /// Accelerating, then decelerating
    InOutCubic,
}

impl Easing {
    /// Remap a progress value in `[0, 1]`
    pub fn apply(self, f: f64) -> f64 {
        match self {
            Easing::Linear => f,
            Easing::OutQuad => 1.0 - (1.0 - f) * (1.0 - f),
            Easing::InOutCubic => {
                if f < 0.5 {
                    4.0 * f * f * f
                } else {
                    1.0 - (-2.0 * f + 2.0).powi(3) / 2.0
                }
            }
        }
    }
}

/// A value produced by one tick of a running [`Animation`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationFrame<T> {
    /// Intermediate value, the animation keeps running
    Update(T),
    /// The target value; the animation has stopped
    Finished(T),
}

impl<T: Copy> AnimationFrame<T> {
    /// The value carried by this frame
    pub fn value(&self) -> T {
        match self {
            AnimationFrame::Update(v) | AnimationFrame::Finished(v) => *v,
        }
    }

    /// Whether this is the final frame
    pub fn is_finished(&self) -> bool {
        matches!(self, AnimationFrame::Finished(_))
    }
}

#[derive(Debug, Clone, Copy)]
enum State {
    Idle,
    Running {
        output: OutputId,
        duration: Duration,
        // taken from the first tick after `run`
        started: Option<Time>,
    },
}

/// Callback invoked once when an animation delivers its target value
pub type DoneCallback<T> = Box<dyn FnOnce(T)>;

/// A time-driven linear interpolator
pub struct Animation<T> {
    start: T,
    target: T,
    easing: Easing,
    state: State,
    done: Option<DoneCallback<T>>,
}

impl<T: fmt::Debug> fmt::Debug for Animation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Animation")
            .field("start", &self.start)
            .field("target", &self.target)
            .field("easing", &self.easing)
            .field("state", &self.state)
            .field("done", &self.done.as_ref().map(|_| "..."))
            .finish()
    }
}

impl<T: Lerp> Animation<T> {
    /// Create an idle animation
    pub fn new(start: T, target: T) -> Self {
        Animation {
            start,
            target,
            easing: Easing::Linear,
            state: State::Idle,
            done: None,
        }
    }

    /// Set the value the animation starts from
    pub fn set_start(&mut self, start: T) {
        self.start = start;
    }

    /// Set the value the animation ends on
    pub fn set_target(&mut self, target: T) {
        self.target = target;
    }

    /// The value the animation ends on
    pub fn target(&self) -> T {
        self.target
    }

    /// Set the easing curve used to remap progress
    pub fn set_easing(&mut self, easing: Easing) {
        self.easing = easing;
    }

    /// Start (or restart) the animation on the repaint cycle of `output`
    ///
    /// Restarting a running animation resets its timestamp. Any done callback of the
    /// previous run is discarded without being called.
    pub fn run(&mut self, output: OutputId, duration: Duration) {
        self.done = None;
        self.state = State::Running {
            output,
            duration,
            started: None,
        };
    }

    /// Like [`Animation::run`], invoking `done` with the target value once it is reached
    pub fn run_with<F>(&mut self, output: OutputId, duration: Duration, done: F)
    where
        F: FnOnce(T) + 'static,
    {
        self.run(output, duration);
        self.done = Some(Box::new(done));
    }

    /// Whether the animation is currently running
    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running { .. })
    }

    /// The output whose repaint cycle drives this animation, if running
    pub fn output(&self) -> Option<OutputId> {
        match self.state {
            State::Running { output, .. } => Some(output),
            State::Idle => None,
        }
    }

    /// Stop the animation without delivering the target
    ///
    /// Returns `false` if it was not running. Calling it repeatedly is harmless.
    pub fn stop(&mut self) -> bool {
        self.done = None;
        let was_running = self.is_running();
        self.state = State::Idle;
        was_running
    }

    /// Advance the animation to `now`
    ///
    /// Returns `None` if the animation is not running. Once the elapsed time exceeds
    /// the duration the target value is returned as [`AnimationFrame::Finished`]
    /// exactly once and the done callback, if any, is invoked.
    pub fn tick(&mut self, now: Time) -> Option<AnimationFrame<T>> {
        let State::Running {
            duration,
            ref mut started,
            ..
        } = self.state
        else {
            return None;
        };

        let started = *started.get_or_insert(now);
        let elapsed = started.duration_since(now);

        if elapsed > duration {
            trace!(?elapsed, ?duration, "animation finished");
            self.state = State::Idle;
            if let Some(done) = self.done.take() {
                done(self.target);
            }
            return Some(AnimationFrame::Finished(self.target));
        }

        let f = if duration.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0)
        };
        Some(AnimationFrame::Update(
            self.start.lerp(self.target, self.easing.apply(f)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc, time::Duration};

    use super::*;

    fn output() -> OutputId {
        OutputId::next()
    }

    #[test]
    fn interpolates_linearly() {
        let mut anim = Animation::new(10.0_f64, 20.0);
        anim.run(output(), Duration::from_millis(200));
        assert_eq!(anim.tick(Time::from_millis(0)), Some(AnimationFrame::Update(10.0)));
        assert_eq!(anim.tick(Time::from_millis(50)), Some(AnimationFrame::Update(12.5)));
        assert_eq!(anim.tick(Time::from_millis(200)), Some(AnimationFrame::Update(20.0)));
        assert_eq!(anim.tick(Time::from_millis(201)), Some(AnimationFrame::Finished(20.0)));
        assert!(!anim.is_running());
    }

    #[test]
    fn done_callback_runs_once() {
        let calls = Rc::new(Cell::new(0));
        let mut anim = Animation::new(0.0_f64, 1.0);
        let counter = calls.clone();
        anim.run_with(output(), Duration::from_millis(10), move |v| {
            assert_eq!(v, 1.0);
            counter.set(counter.get() + 1);
        });
        anim.tick(Time::from_millis(0));
        assert!(anim.tick(Time::from_millis(11)).unwrap().is_finished());
        assert_eq!(anim.tick(Time::from_millis(12)), None);
        assert_eq!(anim.tick(Time::from_millis(13)), None);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn restart_resets_timestamp() {
        let mut anim = Animation::new(0.0_f64, 100.0);
        let out = output();
        anim.run(out, Duration::from_millis(100));
        anim.tick(Time::from_millis(0));
        anim.tick(Time::from_millis(90));
        anim.run(out, Duration::from_millis(100));
        assert_eq!(anim.tick(Time::from_millis(95)), Some(AnimationFrame::Update(0.0)));
        assert_eq!(anim.tick(Time::from_millis(145)), Some(AnimationFrame::Update(50.0)));
    }

    #[test]
    fn stop_is_idempotent_and_skips_callback() {
        let called = Rc::new(Cell::new(false));
        let mut anim = Animation::new(0.0_f64, 1.0);
        let flag = called.clone();
        anim.run_with(output(), Duration::from_millis(10), move |_| flag.set(true));
        assert!(anim.stop());
        assert!(!anim.stop());
        assert_eq!(anim.tick(Time::from_millis(100)), None);
        assert!(!called.get());
    }

    #[test]
    fn easing_is_monotonic_and_anchored() {
        for easing in [Easing::Linear, Easing::OutQuad, Easing::InOutCubic] {
            assert_eq!(easing.apply(0.0), 0.0);
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-9);
            let mut last = 0.0;
            for i in 1..=100 {
                let v = easing.apply(i as f64 / 100.0);
                assert!(v >= last, "{easing:?} not monotonic at {i}");
                last = v;
            }
        }
    }

    #[test]
    fn points_interpolate_per_axis() {
        let mut anim = Animation::new(Point::<f64, Logical>::from((0.0, 0.0)), Point::from((-100.0, 40.0)));
        anim.run(output(), Duration::from_millis(100));
        anim.tick(Time::from_millis(0));
        assert_eq!(
            anim.tick(Time::from_millis(25)).map(|f| f.value()),
            Some(Point::from((-25.0, 10.0)))
        );
    }
}
