use serde::{Deserialize, Serialize};

use crate::types::AccelerationSample;

/// Mount orientation of the sensor relative to the vehicle's forward axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Unset,
    Front,
    Right,
    Left,
    Back,
}

impl Orientation {
    /// Classify one gravity-dominated sample from its two horizontal axes.
    ///
    /// Exactly one axis must leave the dead-zone (strictly) while the other stays inside it;
    /// every other combination is ambiguous.
    pub fn classify(x: f64, y: f64, dead_zone: f64) -> Self {
        let x_quiet = x.abs() < dead_zone;
        let y_quiet = y.abs() < dead_zone;

        if x > dead_zone && y_quiet {
            Orientation::Front
        } else if x < -dead_zone && y_quiet {
            Orientation::Back
        } else if y < -dead_zone && x_quiet {
            Orientation::Right
        } else if y > dead_zone && x_quiet {
            Orientation::Left
        } else {
            Orientation::Unset
        }
    }

    /// Rotate camera axes into vehicle axes. `z` is untouched.
    pub fn remap(&self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Orientation::Unset | Orientation::Front => (x, y),
            Orientation::Right => (-y, x),
            Orientation::Left => (y, -x),
            Orientation::Back => (-x, -y),
        }
    }
}

/// Debounced orientation lock.
///
/// Counts consecutive samples with the same classification and locks once the count
/// reaches the confirmation threshold. The lock is permanent for the lifetime of the
/// resolver.
#[derive(Clone, Debug)]
pub struct OrientationResolver {
    dead_zone: f64,
    confirmation: usize,
    candidate: Orientation,
    count: usize,
    locked: Option<Orientation>,
}

impl OrientationResolver {
    pub fn new(dead_zone: f64, confirmation: usize) -> Self {
        Self {
            dead_zone,
            confirmation: confirmation.max(1),
            candidate: Orientation::Unset,
            count: 0,
            locked: None,
        }
    }

    /// Feed one raw sample; returns the locked orientation, or `Unset` while unresolved.
    pub fn resolve(&mut self, sample: &AccelerationSample) -> Orientation {
        if let Some(locked) = self.locked {
            return locked;
        }

        let current = Orientation::classify(sample.x, sample.y, self.dead_zone);
        if current == Orientation::Unset {
            self.candidate = Orientation::Unset;
            self.count = 0;
            return Orientation::Unset;
        }

        if current == self.candidate {
            self.count += 1;
        } else {
            self.candidate = current;
            self.count = 1;
        }

        if self.count >= self.confirmation {
            log::info!("Orientation locked: {:?} after {} samples", current, self.count);
            self.locked = Some(current);
            return current;
        }
        Orientation::Unset
    }

    /// Remap a sample into vehicle axes; `None` until the orientation is locked.
    pub fn remap(&self, sample: &AccelerationSample) -> Option<AccelerationSample> {
        let orientation = self.locked?;
        let (x, y) = orientation.remap(sample.x, sample.y);
        Some(sample.with_axes(x, y, sample.z))
    }

    pub fn locked(&self) -> Option<Orientation> {
        self.locked
    }

    pub fn pending_count(&self) -> usize {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(x: f64, y: f64) -> AccelerationSample {
        AccelerationSample::new(x, y, 1.0, 0.0)
    }

    #[test]
    fn test_classify_bands() {
        assert_eq!(Orientation::classify(0.5, 0.0, 0.05), Orientation::Front);
        assert_eq!(Orientation::classify(-0.5, 0.0, 0.05), Orientation::Back);
        assert_eq!(Orientation::classify(0.0, -0.5, 0.05), Orientation::Right);
        assert_eq!(Orientation::classify(0.0, 0.5, 0.05), Orientation::Left);
    }

    #[test]
    fn test_classify_ambiguous() {
        assert_eq!(Orientation::classify(0.5, 0.5, 0.05), Orientation::Unset);
        assert_eq!(Orientation::classify(0.0, 0.0, 0.05), Orientation::Unset);
        // boundary is not outside the dead-zone
        assert_eq!(Orientation::classify(0.05, 0.0, 0.05), Orientation::Unset);
    }

    #[test]
    fn test_remap_axes() {
        assert_eq!(Orientation::Front.remap(1.0, 2.0), (1.0, 2.0));
        assert_eq!(Orientation::Right.remap(1.0, 2.0), (-2.0, 1.0));
        assert_eq!(Orientation::Left.remap(1.0, 2.0), (2.0, -1.0));
        assert_eq!(Orientation::Back.remap(1.0, 2.0), (-1.0, -2.0));
    }

    #[test]
    fn test_locks_on_tenth_sample() {
        let mut resolver = OrientationResolver::new(0.05, 10);
        for _ in 0..9 {
            assert_eq!(resolver.resolve(&sample(0.0, -0.2)), Orientation::Unset);
            assert!(resolver.remap(&sample(0.0, -0.2)).is_none());
        }
        assert_eq!(resolver.resolve(&sample(0.0, -0.2)), Orientation::Right);

        let remapped = resolver.remap(&sample(0.0, -0.2)).unwrap();
        assert!((remapped.x - 0.2).abs() < 1e-12);
        assert!(remapped.y.abs() < 1e-12);
    }

    #[test]
    fn test_ambiguous_sample_resets_counter() {
        let mut resolver = OrientationResolver::new(0.05, 10);
        for _ in 0..9 {
            resolver.resolve(&sample(0.2, 0.0));
        }
        assert_eq!(resolver.pending_count(), 9);
        resolver.resolve(&sample(0.2, 0.2));
        assert_eq!(resolver.pending_count(), 0);

        for _ in 0..9 {
            assert_eq!(resolver.resolve(&sample(0.2, 0.0)), Orientation::Unset);
        }
        assert_eq!(resolver.resolve(&sample(0.2, 0.0)), Orientation::Front);
    }

    #[test]
    fn test_flip_restarts_at_one() {
        let mut resolver = OrientationResolver::new(0.05, 10);
        for _ in 0..5 {
            resolver.resolve(&sample(0.2, 0.0));
        }
        resolver.resolve(&sample(-0.2, 0.0));
        assert_eq!(resolver.pending_count(), 1);
    }

    #[test]
    fn test_lock_is_permanent() {
        let mut resolver = OrientationResolver::new(0.05, 3);
        for _ in 0..3 {
            resolver.resolve(&sample(-0.3, 0.0));
        }
        assert_eq!(resolver.resolve(&sample(0.0, 0.4)), Orientation::Back);
        assert_eq!(resolver.locked(), Some(Orientation::Back));
    }
}
