//! Rolling maximum (peak) over the trailing n values.
//!
//! PEAK(n)[i] = max(C[i-j] for j in 0..n)
//! Warmup: undefined until n values have been pushed.
//! Backed by a monotonic deque of (arrival, value) pairs so each update is
//! amortized O(1).

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct RollingMax {
    window: usize,
    seen: u64,
    candidates: VecDeque<(u64, f64)>,
}

impl RollingMax {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            seen: 0,
            candidates: VecDeque::new(),
        }
    }

    pub fn update(&mut self, value: f64) -> Option<f64> {
        if self.window == 0 {
            return None;
        }

        let arrival = self.seen;
        self.seen += 1;

        while let Some(&(_, back)) = self.candidates.back() {
            if back <= value {
                self.candidates.pop_back();
            } else {
                break;
            }
        }
        self.candidates.push_back((arrival, value));

        let oldest_in_window = self.seen.saturating_sub(self.window as u64);
        while let Some(&(idx, _)) = self.candidates.front() {
            if idx < oldest_in_window {
                self.candidates.pop_front();
            } else {
                break;
            }
        }

        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        if self.window == 0 || self.seen < self.window as u64 {
            return None;
        }
        self.candidates.front().map(|&(_, v)| v)
    }

    pub fn reset(&mut self) {
        self.seen = 0;
        self.candidates.clear();
    }
}
