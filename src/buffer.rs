/// How the level is stored when the write index sits at slot 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WrapPolicy {
    /// Level goes into the last slot and slot 0 is blanked, leaving a gap
    /// on the chart at every wrap boundary.
    #[default]
    MarkWrap,
    /// Plain write at slot 0.
    SingleWrite,
}

/// Fixed-size circular store of recent levels with parallel elapsed-time labels.
///
/// Both sequences always hold exactly `capacity` entries. Levels start out
/// empty, labels start at 0.00 seconds.
#[derive(Clone, Debug)]
pub struct SampleBuffer {
    levels: Vec<Option<f64>>,
    times: Vec<f64>,
    write_index: usize,
    policy: WrapPolicy,
}

impl SampleBuffer {
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize, policy: WrapPolicy) -> Self {
        assert!(capacity > 0, "sample buffer capacity must be non-zero");
        Self {
            levels: vec![None; capacity],
            times: vec![0.0; capacity],
            write_index: 0,
            policy,
        }
    }

    /// Stores one sample at the write index and advances it. Returns the
    /// slot that received the level.
    pub fn push(&mut self, elapsed: f64, level: f64) -> usize {
        let capacity = self.capacity();
        let slot = match (self.write_index, self.policy) {
            (0, WrapPolicy::MarkWrap) => {
                self.levels[capacity - 1] = Some(level);
                self.levels[0] = None;
                capacity - 1
            }
            (index, _) => {
                self.levels[index] = Some(level);
                index
            }
        };
        self.times[self.write_index] = elapsed;
        self.write_index = (self.write_index + 1) % capacity;
        slot
    }

    pub fn capacity(&self) -> usize {
        self.levels.len()
    }

    pub fn write_index(&self) -> usize {
        self.write_index
    }

    /// Slot whose time label was written last.
    pub fn last_written(&self) -> usize {
        (self.write_index + self.capacity() - 1) % self.capacity()
    }

    #[cfg(test)]
    pub fn levels(&self) -> &[Option<f64>] {
        &self.levels
    }

    #[cfg(test)]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Elapsed-time label for a slot, formatted with two decimals.
    pub fn label(&self, slot: usize) -> String {
        format!("{:.2}", self.times[slot])
    }

    /// Number of slots currently holding a level.
    pub fn occupancy(&self) -> usize {
        self.levels.iter().filter(|l| l.is_some()).count()
    }

    /// `(elapsed, level)` for every filled slot, oldest label first.
    pub fn points(&self) -> Vec<(f64, f64)> {
        let mut points: Vec<(f64, f64)> = self
            .times
            .iter()
            .zip(&self.levels)
            .filter_map(|(&t, level)| level.map(|l| (t, l)))
            .collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty_with_full_length() {
        let buf = SampleBuffer::new(240, WrapPolicy::MarkWrap);
        assert_eq!(buf.levels().len(), 240);
        assert_eq!(buf.times().len(), 240);
        assert_eq!(buf.occupancy(), 0);
        assert_eq!(buf.write_index(), 0);
        assert_eq!(buf.label(17), "0.00");
    }

    #[test]
    fn first_write_lands_in_last_slot_and_blanks_slot_zero() {
        let mut buf = SampleBuffer::new(4, WrapPolicy::MarkWrap);
        let slot = buf.push(0.0, 12.5);
        assert_eq!(slot, 3);
        assert_eq!(buf.levels(), &[None, None, None, Some(12.5)]);
        assert_eq!(buf.times()[0], 0.0);
        assert_eq!(buf.write_index(), 1);
    }

    #[test]
    fn occupancy_tracks_tick_count_until_full() {
        let mut buf = SampleBuffer::new(8, WrapPolicy::MarkWrap);
        for k in 1..8 {
            buf.push(k as f64 * 0.25, 1.0);
            assert_eq!(buf.occupancy(), k);
            assert_eq!(buf.write_index(), k % 8);
        }
    }

    #[test]
    fn wrap_overwrites_last_slot_and_clears_first() {
        let mut buf = SampleBuffer::new(3, WrapPolicy::MarkWrap);
        buf.push(0.0, 1.0);
        buf.push(0.25, 2.0);
        buf.push(0.5, 3.0);
        assert_eq!(buf.write_index(), 0);
        assert_eq!(buf.levels(), &[None, Some(2.0), Some(3.0)]);

        let slot = buf.push(0.75, 4.0);
        assert_eq!(slot, 2);
        assert_eq!(buf.levels(), &[None, Some(2.0), Some(4.0)]);
        assert_eq!(buf.times(), &[0.75, 0.25, 0.5]);
    }

    #[test]
    fn single_write_policy_fills_every_slot() {
        let mut buf = SampleBuffer::new(3, WrapPolicy::SingleWrite);
        for k in 0..5 {
            buf.push(k as f64, k as f64 * 10.0);
            assert_eq!(buf.occupancy(), (k + 1).min(3));
        }
        assert_eq!(buf.levels(), &[Some(30.0), Some(40.0), Some(20.0)]);
        assert_eq!(buf.write_index(), 2);
    }

    #[test]
    fn points_are_ordered_by_elapsed_time() {
        let mut buf = SampleBuffer::new(3, WrapPolicy::SingleWrite);
        buf.push(1.0, 10.0);
        buf.push(2.0, 20.0);
        buf.push(3.0, 30.0);
        buf.push(4.0, 40.0);
        assert_eq!(buf.points(), vec![(2.0, 20.0), (3.0, 30.0), (4.0, 40.0)]);
    }

    #[test]
    fn labels_use_two_decimals() {
        let mut buf = SampleBuffer::new(2, WrapPolicy::MarkWrap);
        buf.push(0.0, 1.0);
        buf.push(0.25, 1.0);
        assert_eq!(buf.label(0), "0.00");
        assert_eq!(buf.label(1), "0.25");
        assert_eq!(buf.last_written(), 1);
    }
}
