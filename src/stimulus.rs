use std::time::Duration;

/// Reveals a sequence one symbol per interval, advanced by tick durations.
#[derive(Debug, Clone)]
pub struct StimulusPlayback {
    sequence: Vec<char>,
    symbol_interval: Duration,
    elapsed: Duration,
}

impl StimulusPlayback {
    pub fn new(sequence: Vec<char>, symbol_interval: Duration) -> Self {
        Self {
            sequence,
            // a zero interval would never advance
            symbol_interval: symbol_interval.max(Duration::from_millis(1)),
            elapsed: Duration::ZERO,
        }
    }

    pub fn advance_by(&mut self, dt: Duration) {
        self.elapsed = self.elapsed.saturating_add(dt).min(self.total_duration());
    }

    pub fn total_duration(&self) -> Duration {
        self.symbol_interval * self.sequence.len() as u32
    }

    /// Index of the symbol on screen, or `None` once playback has ended.
    pub fn position(&self) -> Option<usize> {
        let idx = (self.elapsed.as_millis() / self.symbol_interval.as_millis()) as usize;
        (idx < self.sequence.len()).then_some(idx)
    }

    pub fn visible_symbol(&self) -> Option<char> {
        self.position().map(|idx| self.sequence[idx])
    }

    /// Fraction of symbols shown so far, counting the one on screen.
    pub fn progress(&self) -> f64 {
        if self.sequence.is_empty() {
            return 1.0;
        }
        let shown = self.position().map_or(self.sequence.len(), |idx| idx + 1);
        shown as f64 / self.sequence.len() as f64
    }

    pub fn is_finished(&self) -> bool {
        self.position().is_none()
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: Duration = Duration::from_millis(1000);

    #[test]
    fn test_reveals_one_symbol_per_interval() {
        let mut playback = StimulusPlayback::new(vec!['4', '7', '1'], SEC);

        assert_eq!(playback.visible_symbol(), Some('4'));
        playback.advance_by(Duration::from_millis(999));
        assert_eq!(playback.visible_symbol(), Some('4'));
        playback.advance_by(Duration::from_millis(1));
        assert_eq!(playback.visible_symbol(), Some('7'));
        playback.advance_by(SEC);
        assert_eq!(playback.visible_symbol(), Some('1'));
        assert!(!playback.is_finished());

        playback.advance_by(SEC);
        assert!(playback.is_finished());
        assert_eq!(playback.visible_symbol(), None);
    }

    #[test]
    fn test_progress_counts_visible_symbol() {
        let mut playback = StimulusPlayback::new(vec!['1', '2', '3', '4'], SEC);
        assert_eq!(playback.progress(), 0.25);
        playback.advance_by(SEC * 2);
        assert_eq!(playback.progress(), 0.75);
        playback.advance_by(SEC * 10);
        assert_eq!(playback.progress(), 1.0);
    }

    #[test]
    fn test_repeated_symbols_are_shown_separately() {
        let mut playback = StimulusPlayback::new(vec!['3', '3'], SEC);
        assert_eq!(playback.position(), Some(0));
        playback.advance_by(SEC);
        assert_eq!(playback.position(), Some(1));
        assert_eq!(playback.visible_symbol(), Some('3'));
    }

    #[test]
    fn test_empty_sequence_is_finished() {
        let playback = StimulusPlayback::new(vec![], SEC);
        assert!(playback.is_finished());
        assert!(playback.is_empty());
        assert_eq!(playback.progress(), 1.0);
    }

    #[test]
    fn test_zero_interval_still_progresses() {
        let mut playback = StimulusPlayback::new(vec!['1', '2'], Duration::ZERO);
        playback.advance_by(Duration::from_millis(5));
        assert!(playback.is_finished());
    }
}
