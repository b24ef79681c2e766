use std::time::Instant;

/// Keeps only characters from the symbol set, in the order typed. A character
/// outside the set is matched by its other case when that one is in the set.
pub fn normalize_input(raw: &str, symbols: &[char]) -> String {
    raw.chars()
        .filter_map(|c| {
            if symbols.contains(&c) {
                return Some(c);
            }
            c.to_uppercase()
                .chain(c.to_lowercase())
                .find(|alt| symbols.contains(alt))
        })
        .collect()
}

/// Measures how long the participant takes to answer, from the end of the
/// stimulus to submission.
#[derive(Debug, Clone, Default)]
pub struct ResponseTimer {
    started_at: Option<Instant>,
}

impl ResponseTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
    }

    pub fn clear(&mut self) {
        self.started_at = None;
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn elapsed_secs(&self) -> Option<f64> {
        self.started_at.map(|start| start.elapsed().as_secs_f64())
    }
}
