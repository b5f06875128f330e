use std::collections::VecDeque;

/// Fixed-length window of recent intensities, oldest first.
///
/// Starts zero-filled and never changes length: every push evicts the oldest
/// value.
#[derive(Debug, Clone)]
pub struct RollingHistory {
    values: VecDeque<f64>,
    capacity: usize,
}

impl RollingHistory {
    /// Returns `None` for a zero capacity.
    pub fn new(capacity: usize) -> Option<Self> {
        if capacity == 0 {
            return None;
        }
        let mut values = VecDeque::with_capacity(capacity);
        values.resize(capacity, 0.0);
        Some(Self { values, capacity })
    }

    pub fn push(&mut self, value: f64) {
        self.values.pop_front();
        self.values.push_back(value);
    }

    pub fn snapshot(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }

    pub fn latest(&self) -> f64 {
        self.values.back().copied().unwrap_or(0.0)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
