//! Bounded history of single-mass readings.

use std::collections::VecDeque;

use crate::types::Sample;

/// Default number of samples kept.
pub const DEFAULT_CAPACITY: usize = 500;

/// Insertion-ordered sample history; the oldest entries are evicted once
/// `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct PeakHistoryBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl Default for PeakHistoryBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl PeakHistoryBuffer {
    /// A buffer holding at most `capacity` samples (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, sample: Sample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Sample> + ExactSizeIterator {
        self.samples.iter()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn timestamps(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.timestamp).collect()
    }

    pub fn intensities(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.intensity).collect()
    }

    /// Samples recorded at `mz`, oldest first.
    pub fn series_for(&self, mz: u32) -> impl Iterator<Item = &Sample> {
        self.samples.iter().filter(move |s| s.mz == mz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Detector, UNIT_AMPERE};

    fn sample(t: f64, mz: u32) -> Sample {
        Sample {
            timestamp: t,
            mz,
            intensity: t * 1e-12,
            detector: Detector::Faraday,
            unit: UNIT_AMPERE.to_string(),
        }
    }

    #[test]
    fn evicts_oldest_first() {
        let mut buf = PeakHistoryBuffer::with_capacity(3);
        for t in [1.0, 2.0, 3.0, 4.0] {
            buf.append(sample(t, 28));
        }
        assert_eq!(buf.timestamps(), vec![2.0, 3.0, 4.0]);
        assert_eq!(buf.last().map(|s| s.timestamp), Some(4.0));
    }

    #[test]
    fn clear_empties_everything() {
        let mut buf = PeakHistoryBuffer::with_capacity(2);
        buf.append(sample(1.0, 28));
        buf.clear();
        assert!(buf.is_empty());
        assert!(buf.timestamps().is_empty());
        assert!(buf.intensities().is_empty());
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut buf = PeakHistoryBuffer::with_capacity(0);
        buf.append(sample(1.0, 4));
        buf.append(sample(2.0, 40));
        assert_eq!(buf.capacity(), 1);
        assert_eq!(buf.series_for(40).count(), 1);
    }
}
