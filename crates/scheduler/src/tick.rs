use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

/// Anything that can pace the frame scheduler.
pub trait TickSource {
    /// Blocks until the next tick; `None` ends playback.
    fn next_tick(&mut self) -> Option<Instant>;
}

/// Fixed-cadence ticks from a background timer.
pub struct IntervalTicker {
    receiver: Receiver<Instant>,
    interval: Duration,
    remaining: Option<u64>,
}

impl IntervalTicker {
    pub fn new(interval: Duration) -> Self {
        Self {
            receiver: crossbeam_channel::tick(interval),
            interval,
            remaining: None,
        }
    }

    /// Stops after `ticks` ticks.
    pub fn with_limit(mut self, ticks: u64) -> Self {
        self.remaining = Some(ticks);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl TickSource for IntervalTicker {
    fn next_tick(&mut self) -> Option<Instant> {
        match self.remaining.as_mut() {
            Some(0) => return None,
            Some(remaining) => *remaining -= 1,
            None => {}
        }
        self.receiver.recv().ok()
    }
}

/// Replays a fixed list of instants.
#[derive(Debug, Clone, Default)]
pub struct ManualTicker {
    ticks: VecDeque<Instant>,
}

impl ManualTicker {
    pub fn new(ticks: impl IntoIterator<Item = Instant>) -> Self {
        Self {
            ticks: ticks.into_iter().collect(),
        }
    }

    /// `count` ticks spaced `interval` apart, the first at `start`.
    pub fn every(start: Instant, interval: Duration, count: u32) -> Self {
        Self::new((0..count).map(|step| start + interval * step))
    }

    pub fn push(&mut self, at: Instant) {
        self.ticks.push_back(at);
    }
}

impl TickSource for ManualTicker {
    fn next_tick(&mut self) -> Option<Instant> {
        self.ticks.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_ticker_honours_limit() {
        let mut ticker = IntervalTicker::new(Duration::from_millis(1)).with_limit(3);
        let mut last = None;
        for _ in 0..3 {
            let now = ticker.next_tick().expect("tick");
            if let Some(previous) = last {
                assert!(now >= previous);
            }
            last = Some(now);
        }
        assert!(ticker.next_tick().is_none());
    }

    #[test]
    fn manual_ticker_replays_in_order() {
        let start = Instant::now();
        let mut ticker = ManualTicker::every(start, Duration::from_millis(10), 2);
        ticker.push(start + Duration::from_secs(1));
        assert_eq!(ticker.next_tick(), Some(start));
        assert_eq!(ticker.next_tick(), Some(start + Duration::from_millis(10)));
        assert_eq!(ticker.next_tick(), Some(start + Duration::from_secs(1)));
        assert_eq!(ticker.next_tick(), None);
    }
}
