//! Causal fractal pivot confirmation: a pivot at bar `i` is only confirmed
//! once `pivot_window` bars past it have closed, so no snapshot ever reports
//! a pivot using data from after its own timestamp.

use std::collections::VecDeque;
use ybi_core::{Level, LevelKind};

struct Candidate {
    high: f64,
    low: f64,
}

pub struct PivotTracker {
    window: usize,
    buf: VecDeque<Candidate>,
    pub confirmed: Vec<Level>,
}

impl PivotTracker {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            buf: VecDeque::with_capacity(2 * window + 1),
            confirmed: Vec::new(),
        }
    }

    /// Feed one bar's (high, low). Returns true if this push confirmed a
    /// new pivot (appended to `self.confirmed`).
    pub fn push(&mut self, high: f64, low: f64) -> bool {
        self.buf.push_back(Candidate { high, low });
        let span = 2 * self.window + 1;
        if self.buf.len() < span {
            return false;
        }

        let center = self.window;
        let center_high = self.buf[center].high;
        let center_low = self.buf[center].low;
        let is_pivot_high = self.buf.iter().all(|c| c.high <= center_high);
        let is_pivot_low = self.buf.iter().all(|c| c.low >= center_low);

        let mut confirmed = false;
        if is_pivot_high {
            self.confirmed.push(Level {
                price: center_high,
                kind: LevelKind::PivotHigh,
            });
            confirmed = true;
        }
        if is_pivot_low {
            self.confirmed.push(Level {
                price: center_low,
                kind: LevelKind::PivotLow,
            });
            confirmed = true;
        }

        self.buf.pop_front();
        confirmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirms_a_simple_pivot_high() {
        let mut t = PivotTracker::new(2);
        let highs = [10.0, 11.0, 15.0, 11.0, 10.0, 9.0];
        let mut any = false;
        for h in highs {
            if t.push(h, h - 1.0) {
                any = true;
            }
        }
        assert!(any);
        assert!(t.confirmed.iter().any(|l| l.price == 15.0));
    }

    #[test]
    fn no_pivot_on_monotonic_series() {
        let mut t = PivotTracker::new(2);
        for h in [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0] {
            t.push(h, h - 1.0);
        }
        assert!(t.confirmed.is_empty());
    }
}
