//! Wait bounds for semaphores and the transmit completion wait.

use core::time::Duration;

/// How long a blocking operation may wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Try once, never wait.
    NoWait,
    /// Wait until satisfied.
    Forever,
    /// Wait at most this long.
    After(Duration),
}

impl Timeout {
    pub fn from_millis(ms: u64) -> Self {
        Timeout::After(Duration::from_millis(ms))
    }

    /// Deadline for this wait given the current tick, `None` for `Forever`.
    pub fn deadline(self, now_ms: u64) -> Option<Deadline> {
        match self {
            Timeout::NoWait => Some(Deadline { at_ms: now_ms }),
            Timeout::Forever => None,
            Timeout::After(d) => Some(Deadline {
                at_ms: now_ms.saturating_add(duration_ms(d)),
            }),
        }
    }
}

/// Absolute expiry on the platform's millisecond tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at_ms: u64,
}

impl Deadline {
    pub fn at_ms(&self) -> u64 {
        self.at_ms
    }

    pub fn expired(&self, now_ms: u64) -> bool {
        now_ms >= self.at_ms
    }

    /// Time left, zero once expired.
    pub fn remaining(&self, now_ms: u64) -> Duration {
        Duration::from_millis(self.at_ms.saturating_sub(now_ms))
    }
}

/// Whole milliseconds, rounding sub-millisecond waits up.
pub fn duration_ms(d: Duration) -> u64 {
    let ms = d.as_millis();
    let ms = if d.subsec_nanos() % 1_000_000 != 0 { ms + 1 } else { ms };
    u64::try_from(ms).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_expiry() {
        let deadline = Timeout::from_millis(20).deadline(1_000).unwrap();
        assert_eq!(deadline.at_ms(), 1_020);
        assert!(!deadline.expired(1_019));
        assert!(deadline.expired(1_020));
        assert_eq!(deadline.remaining(1_005), Duration::from_millis(15));
        assert_eq!(deadline.remaining(2_000), Duration::ZERO);
    }

    #[test]
    fn test_forever_has_no_deadline() {
        assert!(Timeout::Forever.deadline(0).is_none());
        assert!(Timeout::NoWait.deadline(7).unwrap().expired(7));
    }

    #[test]
    fn test_sub_millisecond_rounds_up() {
        assert_eq!(duration_ms(Duration::from_micros(1)), 1);
        assert_eq!(duration_ms(Duration::from_millis(3)), 3);
    }
}
