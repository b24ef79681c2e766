//! The adaptive span test engine.
//!
//! A [`SpanTrial`] owns the stimulus for the current length and the statistics
//! of one session. It performs no I/O and no timing: the presentation layer
//! shows [`SpanTrial::current_sequence`], measures how long the participant
//! took, decides correctness against [`SpanTrial::target_sequence`] and
//! reports back through [`SpanTrial::record_attempt`].

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use itertools::Itertools;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::SpanError;

pub const DEFAULT_STARTING_LENGTH: usize = 3;
pub const DEFAULT_SYMBOLS: &str = "0123456789";

/// Recall direction, fixed for the lifetime of a session.
#[derive(
    Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ValueEnum, strum_macros::Display,
)]
pub enum Mode {
    #[default]
    Forward,
    Backward,
}

impl FromStr for Mode {
    type Err = SpanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "forward" | "f" | "0" => Ok(Mode::Forward),
            "backward" | "b" | "1" => Ok(Mode::Backward),
            other => Err(SpanError::InvalidMode(other.to_string())),
        }
    }
}

impl TryFrom<i64> for Mode {
    type Error = SpanError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Mode::Forward),
            1 => Ok(Mode::Backward),
            other => Err(SpanError::InvalidMode(other.to_string())),
        }
    }
}

/// Construction parameters for a [`SpanTrial`].
#[derive(Debug, Clone, PartialEq)]
pub struct SpanConfig {
    pub starting_length: usize,
    pub symbols: Vec<char>,
    pub mode: Mode,
    /// Fixed seed for reproducible sequences; entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for SpanConfig {
    fn default() -> Self {
        Self {
            starting_length: DEFAULT_STARTING_LENGTH,
            symbols: DEFAULT_SYMBOLS.chars().collect(),
            mode: Mode::Forward,
            seed: None,
        }
    }
}

/// One recorded submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub length: usize,
    pub sequence: String,
    pub time_taken: f64,
    pub input_sequence: String,
    pub is_correct: bool,
}

pub struct SpanTrial {
    length: usize,
    symbols: Vec<char>,
    sequence: Vec<char>,
    mode: Mode,
    max_success_length: usize,
    max_success_time: f64,
    correct_attempts: usize,
    total_attempts: usize,
    history: Vec<TrialRecord>,
    rng: StdRng,
}

impl fmt::Debug for SpanTrial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpanTrial")
            .field("length", &self.length)
            .field("mode", &self.mode)
            .field("sequence", &self.sequence_string())
            .field("max_success_length", &self.max_success_length)
            .field("correct_attempts", &self.correct_attempts)
            .field("total_attempts", &self.total_attempts)
            .finish_non_exhaustive()
    }
}

impl SpanTrial {
    /// Forward-mode trial over `symbols` starting at `starting_length`.
    pub fn create(starting_length: usize, symbols: &[char]) -> Result<Self, SpanError> {
        Self::new(SpanConfig {
            starting_length,
            symbols: symbols.to_vec(),
            ..SpanConfig::default()
        })
    }

    pub fn new(config: SpanConfig) -> Result<Self, SpanError> {
        if config.starting_length < 1 {
            return Err(SpanError::InvalidConfiguration(
                "starting length must be at least 1".to_string(),
            ));
        }

        let symbols: Vec<char> = config.symbols.into_iter().unique().collect();
        if symbols.is_empty() {
            return Err(SpanError::InvalidConfiguration(
                "symbol set must not be empty".to_string(),
            ));
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut trial = Self {
            length: config.starting_length,
            symbols,
            sequence: Vec::new(),
            mode: config.mode,
            max_success_length: 0,
            max_success_time: 0.0,
            correct_attempts: 0,
            total_attempts: 0,
            history: Vec::new(),
            rng,
        };
        trial.sequence = trial.generate_sequence();
        Ok(trial)
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn symbols(&self) -> &[char] {
        &self.symbols
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn max_success_length(&self) -> usize {
        self.max_success_length
    }

    pub fn max_success_time(&self) -> f64 {
        self.max_success_time
    }

    pub fn correct_attempts(&self) -> usize {
        self.correct_attempts
    }

    pub fn total_attempts(&self) -> usize {
        self.total_attempts
    }

    pub fn history(&self) -> &[TrialRecord] {
        &self.history
    }

    pub fn current_sequence(&self) -> Vec<char> {
        self.sequence.clone()
    }

    /// The answer expected under `mode`. The stored sequence is always in
    /// presentation order.
    pub fn target_sequence(&self, mode: Mode) -> Vec<char> {
        match mode {
            Mode::Forward => self.current_sequence(),
            Mode::Backward => self.sequence.iter().rev().copied().collect(),
        }
    }

    /// Expected answer for the session's own mode.
    pub fn expected_answer(&self) -> String {
        self.target_sequence(self.mode).into_iter().collect()
    }

    /// Compares an already normalised reproduction with the expected answer.
    pub fn is_correct(&self, normalized_input: &str) -> bool {
        !normalized_input.is_empty() && normalized_input == self.expected_answer()
    }

    pub fn record_attempt(&mut self, input_sequence: &str, time_taken: f64, is_correct: bool) {
        let time_taken = if time_taken.is_finite() && time_taken > 0.0 {
            time_taken
        } else {
            0.0
        };

        self.total_attempts += 1;
        if is_correct {
            self.correct_attempts += 1;
            if self.length > self.max_success_length {
                self.max_success_length = self.length;
                self.max_success_time = time_taken;
            }
        }

        self.history.push(TrialRecord {
            length: self.length,
            sequence: self.sequence_string(),
            time_taken,
            input_sequence: input_sequence.to_string(),
            is_correct,
        });
    }

    /// Step up one symbol. Only called after a correct attempt.
    pub fn advance(&mut self) {
        self.length += 1;
        self.sequence = self.generate_sequence();
    }

    pub fn regenerate_at_same_length(&mut self) {
        self.sequence = self.generate_sequence();
    }

    /// Fresh trial with the same symbols and mode; history and counters are
    /// not carried over.
    pub fn reset(&mut self, starting_length: usize) -> Result<SpanTrial, SpanError> {
        Self::new(SpanConfig {
            starting_length,
            symbols: self.symbols.clone(),
            mode: self.mode,
            seed: Some(self.rng.gen()),
        })
    }

    pub fn accuracy(&self) -> f64 {
        if self.total_attempts > 0 {
            self.correct_attempts as f64 / self.total_attempts as f64
        } else {
            0.0
        }
    }

    pub fn sequence_string(&self) -> String {
        self.sequence.iter().collect()
    }

    // independent uniform draws with replacement
    fn generate_sequence(&mut self) -> Vec<char> {
        (0..self.length)
            .map(|_| self.symbols[self.rng.gen_range(0..self.symbols.len())])
            .collect()
    }
}
