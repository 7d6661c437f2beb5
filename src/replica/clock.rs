use serde::{Deserialize, Serialize};
use std::cmp;

/// LamportTs is a scalar logical timestamp. Causally related events carry
/// increasing timestamps; concurrent events are only partially ordered.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LamportTs(u64);

impl LamportTs {
    pub fn new(ts: u64) -> Self {
        LamportTs(ts)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// LamportClock is this replica's logical clock. It only ever moves forward.
///
/// The clock itself is a plain counter; the owning `Replica` guards it with a
/// mutex so `tick_local` and `merge` are atomic with respect to each other.
pub(crate) struct LamportClock {
    counter: u64,
}

impl LamportClock {
    pub(crate) fn new() -> Self {
        LamportClock { counter: 0 }
    }

    /// Advances the clock for a locally accepted client write and returns the
    /// timestamp assigned to that write.
    pub(crate) fn tick_local(&mut self) -> LamportTs {
        self.counter += 1;
        LamportTs(self.counter)
    }

    /// Folds an observed remote timestamp into the clock. The next locally
    /// stamped event must strictly follow anything we have seen, hence the +1.
    pub(crate) fn merge(&mut self, remote: LamportTs) {
        self.counter = cmp::max(self.counter, remote.0 + 1);
    }

    pub(crate) fn current(&self) -> LamportTs {
        LamportTs(self.counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_is_monotone() {
        let mut clock = LamportClock::new();
        let mut previous = clock.current();
        for _ in 0..10 {
            let next = clock.tick_local();
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn merge_takes_max_plus_one() {
        let mut clock = LamportClock::new();
        clock.tick_local();
        clock.tick_local();
        assert_eq!(LamportTs::new(2), clock.current());

        // A remote timestamp behind us must not rewind the clock.
        clock.merge(LamportTs::new(1));
        assert_eq!(LamportTs::new(2), clock.current());

        // A remote timestamp ahead of us pulls us strictly past it.
        clock.merge(LamportTs::new(7));
        assert_eq!(LamportTs::new(8), clock.current());
    }

    #[test]
    fn merge_of_equal_timestamp_still_advances() {
        let mut clock = LamportClock::new();
        clock.tick_local();
        clock.merge(LamportTs::new(1));
        assert_eq!(LamportTs::new(2), clock.current());
    }
}
