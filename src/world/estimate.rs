//! Decaying belief primitive
//!
//! An `Estimate` remembers the last value written, the confidence it was
//! written with and when. Confidence is evaluated lazily with a hyperbolic
//! law, `c0 * k / (k + |t - t0|)`, so old information keeps a shrinking but
//! nonzero weight. Writes overwrite; nothing is blended.

use crate::core::types::{Angle, Cycle, Point2};

/// Values an `Estimate` can hold
pub trait EstimateValue: Copy + std::fmt::Debug + PartialEq {
    /// Canonical form applied on every write
    fn normalized(self) -> Self {
        self
    }
}

impl EstimateValue for f64 {}

impl EstimateValue for Point2 {}

impl EstimateValue for Angle {
    fn normalized(self) -> Self {
        Angle::new(self.degrees())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate<V> {
    value: V,
    confidence: f64,
    time_recorded: Cycle,
    forever: bool,
    decay: f64,
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

impl<V: EstimateValue> Estimate<V> {
    /// A decaying estimate recorded at `time` with decay constant `decay`
    pub fn new(value: V, confidence: f64, time: Cycle, decay: f64) -> Self {
        Self {
            value: value.normalized(),
            confidence: clamp_confidence(confidence),
            time_recorded: time,
            forever: false,
            decay: if decay.is_finite() && decay > 0.0 {
                decay
            } else {
                f64::MIN_POSITIVE
            },
        }
    }

    /// A time-invariant estimate
    pub fn fixed(value: V, confidence: f64) -> Self {
        Self {
            forever: true,
            ..Self::new(value, confidence, 0, 1.0)
        }
    }

    pub fn value(&self) -> V {
        self.value
    }

    pub fn time_recorded(&self) -> Cycle {
        self.time_recorded
    }

    pub fn is_forever(&self) -> bool {
        self.forever
    }

    pub fn decay(&self) -> f64 {
        self.decay
    }

    /// Cycles elapsed since the value was written
    pub fn age(&self, now: Cycle) -> u32 {
        now.abs_diff(self.time_recorded)
    }

    pub fn confidence_at(&self, now: Cycle) -> f64 {
        if self.forever {
            return self.confidence;
        }
        let elapsed = self.age(now) as f64;
        self.confidence * self.decay / (self.decay + elapsed)
    }

    pub fn read(&self, now: Cycle) -> (V, f64) {
        (self.value, self.confidence_at(now))
    }

    /// Overwrite value and confidence and restart the decay clock
    ///
    /// Forever estimates are immutable; returns `false` when the write was ignored.
    pub fn update(&mut self, value: V, confidence: f64, now: Cycle) -> bool {
        if self.forever {
            return false;
        }
        self.value = value.normalized();
        self.confidence = clamp_confidence(confidence);
        self.time_recorded = now;
        true
    }

    /// Pin the value; the current confidence becomes time-invariant
    pub fn set_forever(&mut self, value: V) {
        self.value = value.normalized();
        self.forever = true;
    }
}

/// Write into an optional estimate slot, creating it on first sighting
pub fn record<V: EstimateValue>(
    slot: &mut Option<Estimate<V>>,
    value: V,
    confidence: f64,
    now: Cycle,
    decay: f64,
) {
    match slot {
        Some(estimate) => {
            estimate.update(value, confidence, now);
        }
        None => *slot = Some(Estimate::new(value, confidence, now, decay)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_confidence_after_k_cycles() {
        let e = Estimate::new(Angle::new(20.0), 1.0, 10, 5.0);
        assert!((e.confidence_at(15) - 0.5).abs() < 1e-12);
        assert_eq!(e.confidence_at(10), 1.0);
    }

    #[test]
    fn test_decay_never_reaches_zero() {
        let e = Estimate::new(1.0_f64, 0.8, 0, 3.0);
        let late = e.confidence_at(1_000_000);
        assert!(late > 0.0);
        assert!(late < 1e-5);
    }

    #[test]
    fn test_forever_is_time_invariant() {
        let e = Estimate::fixed(Point2::new(1.0, 2.0), 0.9);
        assert_eq!(e.confidence_at(0), 0.9);
        assert_eq!(e.confidence_at(6000), 0.9);
    }

    #[test]
    fn test_update_overwrites_without_blending() {
        let mut e = Estimate::new(10.0_f64, 1.0, 0, 5.0);
        assert!(e.update(20.0, 0.4, 7));
        assert_eq!(e.read(7), (20.0, 0.4));
        assert_eq!(e.time_recorded(), 7);
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut once = Estimate::new(1.0_f64, 1.0, 0, 5.0);
        once.update(3.0, 0.7, 4);
        let mut twice = once;
        twice.update(3.0, 0.7, 4);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_forever_ignores_update() {
        let mut e = Estimate::fixed(Point2::ZERO, 1.0);
        assert!(!e.update(Point2::new(5.0, 5.0), 0.1, 3));
        assert_eq!(e.value(), Point2::ZERO);
    }

    #[test]
    fn test_set_forever_freezes_confidence() {
        let mut e = Estimate::new(2.0_f64, 0.6, 5, 3.0);
        e.set_forever(4.0);
        assert!(e.is_forever());
        assert_eq!(e.read(500), (4.0, 0.6));
    }

    #[test]
    fn test_angles_normalize_on_write() {
        let mut e = Estimate::new(Angle::new(0.0), 1.0, 0, 5.0);
        e.update(Angle::new(270.0), 1.0, 1);
        assert_eq!(e.value().degrees(), -90.0);
        assert!((e.value().delta(Angle::new(100.0)).degrees() + 170.0).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let e = Estimate::new(0.0_f64, 3.0, 0, 5.0);
        assert_eq!(e.confidence_at(0), 1.0);
        let e = Estimate::new(0.0_f64, f64::NAN, 0, 5.0);
        assert_eq!(e.confidence_at(0), 0.0);
    }
}
