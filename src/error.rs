use thiserror::Error;

/// Errors raised while configuring a span trial.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpanError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A recall direction outside forward/backward reached the engine boundary.
    #[error("invalid mode '{0}', expected forward or backward")]
    InvalidMode(String),
}

/// Errors raised by the session state machine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("name and email are both required")]
    MissingParticipant,

    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),

    #[error("cannot handle {event} while {phase}")]
    InvalidTransition {
        phase: &'static str,
        event: &'static str,
    },

    #[error(transparent)]
    Span(#[from] SpanError),
}

/// Errors raised by the result store.
#[derive(Debug, Error)]
pub enum ResultsError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("could not encode history: {0}")]
    Json(#[from] serde_json::Error),

    #[error("export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("no saved session with id {0}")]
    NotFound(i64),

    #[error("stored session {id} is malformed: {reason}")]
    Malformed { id: i64, reason: String },
}

pub type ResultsResult<T> = std::result::Result<T, ResultsError>;
