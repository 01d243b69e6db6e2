/// Level above which a tick is classified as an alert.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Threshold(f64);

impl Threshold {
    pub fn new(value: f64) -> Threshold {
        Threshold(value.max(0.0))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Moves the threshold by `delta`, stopping at zero.
    pub fn nudge(&mut self, delta: f64) {
        self.0 = (self.0 + delta).max(0.0);
    }

    pub fn classify(self, level: f64) -> AlertState {
        if level > self.0 {
            AlertState::Alert
        } else {
            AlertState::Normal
        }
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Threshold(20.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AlertState {
    #[default]
    Normal,
    Alert,
}

impl AlertState {
    pub fn is_alert(self) -> bool {
        self == AlertState::Alert
    }
}

/// Result of one sampling tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickOutcome {
    /// 1-based tick number within the session.
    pub tick: u64,
    pub level: f64,
    pub elapsed: f64,
    /// Slot the level was stored in. Differs from the write index on wrap.
    pub slot: usize,
    pub alert: AlertState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_is_strictly_greater() {
        let t = Threshold::new(25.0);
        assert_eq!(t.classify(25.0), AlertState::Normal);
        assert_eq!(t.classify(25.01), AlertState::Alert);
        assert_eq!(t.classify(0.0), AlertState::Normal);
    }

    #[test]
    fn nudge_stops_at_zero() {
        let mut t = Threshold::new(1.0);
        t.nudge(-1.0);
        t.nudge(-1.0);
        assert_eq!(t.value(), 0.0);
        t.nudge(3.0);
        assert_eq!(t.value(), 3.0);
    }

    #[test]
    fn negative_threshold_is_clamped() {
        assert_eq!(Threshold::new(-5.0).value(), 0.0);
    }
}
