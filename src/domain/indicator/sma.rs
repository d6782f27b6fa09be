//! Simple Moving Average over a fixed ring buffer.
//!
//! SMA(n)[i] = sum(C[i-j] for j in 0..n) / n
//! Warmup: undefined until n values have been pushed.
//! Each update is O(1): the value leaving the ring is subtracted from the
//! running sum, the arriving value is added. The sum is recomputed from the
//! ring each time it wraps, so rounding drift never outlives one window.

#[derive(Debug, Clone)]
pub struct Sma {
    window: usize,
    ring: Vec<f64>,
    next: usize,
    sum: f64,
}

impl Sma {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            ring: Vec::with_capacity(window),
            next: 0,
            sum: 0.0,
        }
    }

    /// Push the newest value and return the average once the window is full.
    pub fn update(&mut self, value: f64) -> Option<f64> {
        if self.window == 0 {
            return None;
        }

        if self.ring.len() < self.window {
            self.ring.push(value);
        } else {
            self.sum -= self.ring[self.next];
            self.ring[self.next] = value;
        }
        self.sum += value;
        self.next = (self.next + 1) % self.window;
        if self.next == 0 {
            self.sum = self.ring.iter().sum();
        }

        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        if self.window > 0 && self.ring.len() == self.window {
            Some(self.sum / self.window as f64)
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.ring.clear();
        self.next = 0;
        self.sum = 0.0;
    }
}
