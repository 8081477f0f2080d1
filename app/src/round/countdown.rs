use std::fmt;

/// Seconds left in the live round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Countdown {
    /// No start timestamp is known yet.
    #[default]
    Waiting,
    Remaining(u64),
}

impl Countdown {
    pub fn compute(start_timestamp: Option<u64>, now: u64, duration_secs: u64) -> Self {
        match start_timestamp {
            None => Countdown::Waiting,
            Some(start) => {
                Countdown::Remaining(start.saturating_add(duration_secs).saturating_sub(now))
            }
        }
    }

    pub fn remaining(self) -> Option<u64> {
        match self {
            Countdown::Waiting => None,
            Countdown::Remaining(secs) => Some(secs),
        }
    }

    pub fn is_expired(self) -> bool {
        self == Countdown::Remaining(0)
    }

    /// `mm:ss`, or `--:--` while waiting.
    pub fn label(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Countdown::Waiting => f.write_str("--:--"),
            Countdown::Remaining(secs) => write!(f, "{:02}:{:02}", secs / 60, secs % 60),
        }
    }
}

/// Fires once when an observed countdown reaches zero.
///
/// Only a transition counts: a countdown first seen at zero never fires, and
/// the latch re-arms when the start timestamp changes.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExpiryLatch {
    start: Option<u64>,
    previous: Option<u64>,
    fired: bool,
}

impl ExpiryLatch {
    pub fn observe(&mut self, start_timestamp: Option<u64>, countdown: Countdown) -> bool {
        if start_timestamp != self.start {
            self.start = start_timestamp;
            self.previous = None;
            self.fired = false;
        }

        let current = countdown.remaining();
        let fire = !self.fired
            && matches!(self.previous, Some(prev) if prev > 0)
            && current == Some(0);
        if fire {
            self.fired = true;
        }
        self.previous = current;
        fire
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn labels() {
        assert_eq!(Countdown::Waiting.label(), "--:--");
        assert_eq!(Countdown::Remaining(60).label(), "01:00");
        assert_eq!(Countdown::Remaining(9).label(), "00:09");
        assert_eq!(Countdown::compute(Some(100), 130, 60), Countdown::Remaining(30));
        assert_eq!(Countdown::compute(Some(100), 500, 60), Countdown::Remaining(0));
        assert_eq!(Countdown::compute(None, 500, 60), Countdown::Waiting);
    }

    proptest! {
        #[test]
        fn countdown_never_increases(start in 0u64..1_000_000, now in 0u64..2_000_000, step in 0u64..120) {
            let before = Countdown::compute(Some(start), now, 60);
            let after = Countdown::compute(Some(start), now + step, 60);
            prop_assert!(after.remaining() <= before.remaining());
        }
    }

    #[test]
    fn latch_fires_once_per_expiry() {
        let mut latch = ExpiryLatch::default();
        let start = Some(100);
        let fired: Vec<bool> = [158, 159, 160, 161, 170]
            .into_iter()
            .map(|now| latch.observe(start, Countdown::compute(start, now, 60)))
            .collect();
        assert_eq!(fired, vec![false, false, true, false, false]);
    }

    #[test]
    fn latch_needs_a_transition() {
        let mut latch = ExpiryLatch::default();
        assert!(!latch.observe(Some(100), Countdown::Remaining(0)));
        assert!(!latch.observe(Some(100), Countdown::Remaining(0)));
        assert!(!latch.observe(None, Countdown::Waiting));
    }

    #[test]
    fn latch_rearms_on_new_start() {
        let mut latch = ExpiryLatch::default();
        assert!(!latch.observe(Some(100), Countdown::Remaining(1)));
        assert!(latch.observe(Some(100), Countdown::Remaining(0)));

        assert!(!latch.observe(Some(160), Countdown::Remaining(60)));
        assert!(!latch.observe(Some(160), Countdown::Remaining(1)));
        assert!(latch.observe(Some(160), Countdown::Remaining(0)));
    }
}
