use chrono::{DateTime, Local};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::response::normalize_input;
use crate::span::{
    Mode, SpanConfig, SpanTrial, TrialRecord, DEFAULT_STARTING_LENGTH, DEFAULT_SYMBOLS,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    pub email: String,
}

impl Participant {
    pub fn new(name: &str, email: &str) -> Result<Self, SessionError> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() || email.is_empty() {
            return Err(SessionError::MissingParticipant);
        }

        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(Self {
                name: name.to_string(),
                email: email.to_string(),
            }),
            _ => Err(SessionError::InvalidEmail(email.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub starting_length: usize,
    pub symbols: Vec<char>,
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            starting_length: DEFAULT_STARTING_LENGTH,
            symbols: DEFAULT_SYMBOLS.chars().collect(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    AwaitingConfig,
    ShowingStimulus,
    AwaitingResponse,
    Scored { correct: bool, time_taken: f64 },
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::AwaitingConfig => "awaiting configuration",
            Phase::ShowingStimulus => "showing the stimulus",
            Phase::AwaitingResponse => "awaiting a response",
            Phase::Scored { .. } => "showing the score",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Start { participant: Participant, mode: Mode },
    StimulusShown,
    Submit { input: String, time_taken: f64 },
    /// Move on from the score: next length after a success, same sequence after a miss.
    Continue,
    /// New sequence at the current length.
    Retry,
    /// Show the current sequence again.
    Replay,
    Restart,
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Start { .. } => "start",
            SessionEvent::StimulusShown => "stimulus shown",
            SessionEvent::Submit { .. } => "submit",
            SessionEvent::Continue => "continue",
            SessionEvent::Retry => "retry",
            SessionEvent::Replay => "replay",
            SessionEvent::Restart => "restart",
        }
    }
}

/// Terminal summary handed to the persistence layer in one piece.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub name: String,
    pub email: String,
    pub mode: Mode,
    pub max_success_length: usize,
    pub max_success_time: f64,
    pub accuracy: f64,
    pub history: Vec<TrialRecord>,
    pub recorded_at: DateTime<Local>,
}

/// One participant's run through the test, driven by discrete events.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    participant: Option<Participant>,
    trial: Option<SpanTrial>,
    phase: Phase,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            participant: None,
            trial: None,
            phase: Phase::AwaitingConfig,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn trial(&self) -> Option<&SpanTrial> {
        self.trial.as_ref()
    }

    pub fn participant(&self) -> Option<&Participant> {
        self.participant.as_ref()
    }

    pub fn mode(&self) -> Option<Mode> {
        self.trial.as_ref().map(SpanTrial::mode)
    }

    pub fn handle(&mut self, event: SessionEvent) -> Result<Phase, SessionError> {
        let invalid = SessionError::InvalidTransition {
            phase: self.phase.name(),
            event: event.name(),
        };

        let next = match (self.phase, event) {
            (Phase::AwaitingConfig, SessionEvent::Start { participant, mode }) => {
                let trial = SpanTrial::new(SpanConfig {
                    starting_length: self.config.starting_length,
                    symbols: self.config.symbols.clone(),
                    mode,
                    seed: self.config.seed,
                })?;
                info!(
                    "session started for {} in {} mode at length {}",
                    participant.email,
                    mode,
                    trial.length()
                );
                self.participant = Some(participant);
                self.trial = Some(trial);
                Phase::ShowingStimulus
            }
            (Phase::ShowingStimulus, SessionEvent::StimulusShown) => Phase::AwaitingResponse,
            (Phase::AwaitingResponse, SessionEvent::Submit { input, time_taken }) => {
                let trial = self.trial.as_mut().ok_or(invalid)?;
                let normalized = normalize_input(&input, trial.symbols());
                let correct = trial.is_correct(&normalized);
                trial.record_attempt(&normalized, time_taken, correct);
                // the recorded time is clamped; report that one
                let time_taken = trial
                    .history()
                    .last()
                    .map_or(0.0, |record| record.time_taken);
                debug!(
                    "attempt {} at length {}: correct={} in {:.2}s",
                    trial.total_attempts(),
                    trial.length(),
                    correct,
                    time_taken
                );
                Phase::Scored {
                    correct,
                    time_taken,
                }
            }
            (Phase::Scored { correct: true, .. }, SessionEvent::Continue) => {
                let trial = self.trial.as_mut().ok_or(invalid)?;
                trial.advance();
                debug!("advanced to length {}", trial.length());
                Phase::ShowingStimulus
            }
            (Phase::Scored { correct: false, .. }, SessionEvent::Continue) => {
                Phase::AwaitingResponse
            }
            (
                Phase::AwaitingResponse | Phase::Scored { correct: false, .. },
                SessionEvent::Retry,
            ) => {
                let trial = self.trial.as_mut().ok_or(invalid)?;
                trial.regenerate_at_same_length();
                debug!("new sequence at length {}", trial.length());
                Phase::ShowingStimulus
            }
            (
                Phase::AwaitingResponse | Phase::Scored { correct: false, .. },
                SessionEvent::Replay,
            ) => {
                Phase::ShowingStimulus
            }
            (
                Phase::ShowingStimulus | Phase::AwaitingResponse | Phase::Scored { .. },
                SessionEvent::Restart,
            ) => {
                let starting_length = self.config.starting_length;
                let fresh = self
                    .trial
                    .as_mut()
                    .ok_or(invalid)?
                    .reset(starting_length)?;
                info!("session restarted at length {}", fresh.length());
                self.trial = Some(fresh);
                Phase::ShowingStimulus
            }
            _ => return Err(invalid),
        };

        self.phase = next;
        Ok(next)
    }

    /// Summary of the session so far; `None` before the test has started.
    pub fn snapshot(&self, recorded_at: DateTime<Local>) -> Option<SessionSnapshot> {
        let participant = self.participant.as_ref()?;
        let trial = self.trial.as_ref()?;
        Some(SessionSnapshot {
            name: participant.name.clone(),
            email: participant.email.clone(),
            mode: trial.mode(),
            max_success_length: trial.max_success_length(),
            max_success_time: trial.max_success_time(),
            accuracy: trial.accuracy(),
            history: trial.history().to_vec(),
            recorded_at,
        })
    }

    pub fn finish(self, recorded_at: DateTime<Local>) -> Option<SessionSnapshot> {
        self.snapshot(recorded_at)
    }
}
