use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::models::MAX_INTENSITY;

/// Shared alert threshold, stored as `f64` bits in a single atomic word.
///
/// Clones share the same value. The presenter writes, the detection loop
/// reads once per tick.
#[derive(Debug, Clone)]
pub struct Threshold {
    bits: Arc<AtomicU64>,
}

impl Threshold {
    pub fn new(value: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(clamp(value).to_bits())),
        }
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Store `value` clamped to `[0, MAX_INTENSITY]` and return what was stored.
    pub fn set(&self, value: f64) -> f64 {
        let value = clamp(value);
        self.bits.store(value.to_bits(), Ordering::Release);
        value
    }

    pub fn adjust(&self, delta: f64) -> f64 {
        self.set(self.get() + delta)
    }
}

fn clamp(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, MAX_INTENSITY)
}
