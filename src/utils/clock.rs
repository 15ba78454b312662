use std::{mem::MaybeUninit, time::Duration};

/// Monotonic clock
///
/// Repaint ticks handed to [`Shell::tick`](crate::shell::Shell::tick) are expected to be
/// taken from this clock (or from the presentation timestamps of the output, which use
/// the same clock domain).
#[derive(Debug)]
pub struct Clock {
    clk_id: libc::clockid_t,
}

impl Clock {
    /// Initialize a new monotonic clock
    pub fn new() -> std::io::Result<Self> {
        let clk_id = libc::CLOCK_MONOTONIC;
        clock_get_time(clk_id)?;
        Ok(Clock { clk_id })
    }

    /// Returns the current time
    ///
    /// Falls back to the zero timestamp in the (never observed) case of the kernel
    /// rejecting a clock id that was accepted by [`Clock::new`].
    pub fn now(&self) -> Time {
        clock_get_time(self.clk_id)
            .map(|tp| Time::from(Duration::new(tp.tv_sec as u64, tp.tv_nsec as u32)))
            .unwrap_or_default()
    }
}

/// A point in time of the monotonic clock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(Duration);

impl Time {
    /// Create a timestamp from milliseconds since the clock epoch
    pub fn from_millis(ms: u64) -> Self {
        Time(Duration::from_millis(ms))
    }

    /// Milliseconds since the clock epoch
    pub fn as_millis(&self) -> u64 {
        self.0.as_millis() as u64
    }

    /// Gets the duration between self and a later time
    ///
    /// Saturates to zero if `later` is in fact earlier.
    pub fn duration_since(&self, later: Time) -> Duration {
        later.0.saturating_sub(self.0)
    }
}

impl From<Duration> for Time {
    fn from(tp: Duration) -> Self {
        Time(tp)
    }
}

impl From<Time> for Duration {
    fn from(time: Time) -> Self {
        time.0
    }
}

impl std::ops::Add<Duration> for Time {
    type Output = Time;

    fn add(self, rhs: Duration) -> Time {
        Time(self.0 + rhs)
    }
}

fn clock_get_time(clk_id: libc::clockid_t) -> Result<libc::timespec, std::io::Error> {
    let mut tp = MaybeUninit::zeroed();
    unsafe {
        let res = libc::clock_gettime(clk_id, tp.as_mut_ptr());

        if res < 0 {
            return Err(std::io::Error::last_os_error());
        }

        Ok(tp.assume_init())
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::{Clock, Time};

    #[test]
    fn monotonic() {
        let clock = Clock::new().unwrap();
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
        let zero = Time::from(Duration::ZERO);
        assert_eq!(zero.duration_since(first), first.into());
    }

    #[test]
    fn duration_since_saturates() {
        let early = Time::from_millis(10);
        let late = Time::from_millis(25);
        assert_eq!(early.duration_since(late), Duration::from_millis(15));
        assert_eq!(late.duration_since(early), Duration::ZERO);
    }
}
