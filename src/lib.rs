// Library surface for the binary and for headless/integration tests.
pub mod app;
pub mod app_dirs;
pub mod config;
pub mod error;
pub mod response;
pub mod results;
pub mod runtime;
pub mod session;
pub mod span;
pub mod stimulus;
pub mod ui;

pub use error::{ResultsError, SessionError, SpanError};
pub use session::{Participant, Phase, Session, SessionEvent, SessionSnapshot};
pub use span::{Mode, SpanConfig, SpanTrial, TrialRecord};
