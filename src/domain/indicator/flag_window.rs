//! Count of true flags among the last n observations.
//!
//! Used for "k of the last n bars" rules. Undefined until n flags have been
//! pushed.

#[derive(Debug, Clone)]
pub struct FlagWindow {
    ring: Vec<bool>,
    window: usize,
    next: usize,
    trues: usize,
}

impl FlagWindow {
    pub fn new(window: usize) -> Self {
        Self {
            ring: Vec::with_capacity(window),
            window,
            next: 0,
            trues: 0,
        }
    }

    pub fn push(&mut self, flag: bool) {
        if self.window == 0 {
            return;
        }
        if self.ring.len() < self.window {
            self.ring.push(flag);
        } else {
            if self.ring[self.next] {
                self.trues -= 1;
            }
            self.ring[self.next] = flag;
        }
        if flag {
            self.trues += 1;
        }
        self.next = (self.next + 1) % self.window;
    }

    pub fn count(&self) -> Option<usize> {
        if self.window > 0 && self.ring.len() == self.window {
            Some(self.trues)
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.ring.clear();
        self.next = 0;
        self.trues = 0;
    }
}
