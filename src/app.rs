use std::time::Duration;

use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use log::{debug, error, info};

use crate::config::Config;
use crate::response::ResponseTimer;
use crate::results::ResultStore;
use crate::session::{Participant, Phase, Session, SessionEvent};
use crate::span::Mode;
use crate::stimulus::StimulusPlayback;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Intake,
    ModeSelect,
    Ready,
    Testing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntakeField {
    #[default]
    Name,
    Email,
}

#[derive(Debug, Clone, Default)]
pub struct IntakeForm {
    pub name: String,
    pub email: String,
    pub focus: IntakeField,
    pub warning: Option<String>,
}

impl IntakeForm {
    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            IntakeField::Name => &mut self.name,
            IntakeField::Email => &mut self.email,
        }
    }

    fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            IntakeField::Name => IntakeField::Email,
            IntakeField::Email => IntakeField::Name,
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

impl StatusMessage {
    fn info(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Info,
            text: text.into(),
        }
    }

    fn success(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Success,
            text: text.into(),
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            text: text.into(),
        }
    }
}

/// Presentation state around one [`Session`]: the intake form, stimulus
/// playback, answer timing and typed input.
pub struct App {
    pub config: Config,
    pub state: AppState,
    pub intake: IntakeForm,
    pub selected_mode: Mode,
    pub session: Session,
    pub playback: Option<StimulusPlayback>,
    pub timer: ResponseTimer,
    pub input: String,
    pub status: Option<StatusMessage>,
    /// Best saved span for the participant in the selected mode.
    pub personal_best: Option<usize>,
    pub should_quit: bool,
    feedback_elapsed: Duration,
    participant: Option<Participant>,
    store: Option<Box<dyn ResultStore>>,
}

impl App {
    pub fn new(config: Config, seed: Option<u64>, store: Option<Box<dyn ResultStore>>) -> Self {
        let session = Session::new(config.session_config(seed));
        Self {
            selected_mode: config.mode,
            config,
            state: AppState::Intake,
            intake: IntakeForm::default(),
            session,
            playback: None,
            timer: ResponseTimer::new(),
            input: String::new(),
            status: None,
            personal_best: None,
            should_quit: false,
            feedback_elapsed: Duration::ZERO,
            participant: None,
            store,
        }
    }

    pub fn participant(&self) -> Option<&Participant> {
        self.participant.as_ref()
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if key.code == KeyCode::Esc || (ctrl && key.code == KeyCode::Char('c')) {
            self.should_quit = true;
            return;
        }

        match self.state {
            AppState::Intake => self.on_intake_key(key, ctrl),
            AppState::ModeSelect => self.on_mode_key(key),
            AppState::Ready => {
                if key.code == KeyCode::Enter {
                    self.start_test();
                }
            }
            AppState::Testing => self.on_test_key(key, ctrl),
        }
    }

    pub fn on_tick(&mut self, dt: Duration) {
        if self.state != AppState::Testing {
            return;
        }

        match self.session.phase() {
            Phase::ShowingStimulus => {
                if let Some(playback) = self.playback.as_mut() {
                    playback.advance_by(dt);
                    if playback.is_finished() {
                        self.dispatch(SessionEvent::StimulusShown);
                    }
                }
            }
            // a miss waits for the participant to try again
            Phase::Scored { correct: true, .. } => {
                self.feedback_elapsed += dt;
                if self.feedback_elapsed >= self.config.feedback_duration() {
                    self.dispatch(SessionEvent::Continue);
                }
            }
            Phase::Scored { correct: false, .. }
            | Phase::AwaitingConfig
            | Phase::AwaitingResponse => {}
        }
    }

    fn on_intake_key(&mut self, key: KeyEvent, ctrl: bool) {
        match key.code {
            KeyCode::Char(c) if !ctrl => self.intake.focused_mut().push(c),
            KeyCode::Backspace => {
                self.intake.focused_mut().pop();
            }
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                self.intake.toggle_focus()
            }
            KeyCode::Enter => {
                if self.intake.focus == IntakeField::Name && self.intake.email.is_empty() {
                    self.intake.focus = IntakeField::Email;
                    return;
                }
                match Participant::new(&self.intake.name, &self.intake.email) {
                    Ok(participant) => {
                        self.participant = Some(participant);
                        self.intake.warning = None;
                        self.state = AppState::ModeSelect;
                    }
                    Err(e) => self.intake.warning = Some(e.to_string()),
                }
            }
            _ => {}
        }
    }

    fn on_mode_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up | KeyCode::Down | KeyCode::Left | KeyCode::Right | KeyCode::Tab => {
                self.selected_mode = match self.selected_mode {
                    Mode::Forward => Mode::Backward,
                    Mode::Backward => Mode::Forward,
                }
            }
            KeyCode::Char('f') => self.selected_mode = Mode::Forward,
            KeyCode::Char('b') => self.selected_mode = Mode::Backward,
            KeyCode::Char(c) => {
                if let Some(mode) = c
                    .to_digit(10)
                    .and_then(|d| Mode::try_from(i64::from(d)).ok())
                {
                    self.selected_mode = mode;
                }
            }
            KeyCode::Enter => {
                self.personal_best = self.lookup_personal_best();
                self.state = AppState::Ready;
            }
            _ => {}
        }
    }

    fn lookup_personal_best(&self) -> Option<usize> {
        let store = self.store.as_ref()?;
        let participant = self.participant.as_ref()?;
        match store.best_for_email(&participant.email, self.selected_mode) {
            Ok(best) => best,
            Err(e) => {
                error!("could not read personal best: {}", e);
                None
            }
        }
    }

    fn on_test_key(&mut self, key: KeyEvent, ctrl: bool) {
        if ctrl {
            match key.code {
                KeyCode::Char('r') => self.dispatch(SessionEvent::Restart),
                KeyCode::Char('t') => self.dispatch(SessionEvent::Retry),
                KeyCode::Char('p') => self.dispatch(SessionEvent::Replay),
                KeyCode::Char('s') => self.save_results(),
                _ => {}
            }
            return;
        }

        match (self.session.phase(), key.code) {
            (Phase::AwaitingResponse, KeyCode::Char(c)) => self.input.push(c),
            (Phase::AwaitingResponse, KeyCode::Backspace) => {
                self.input.pop();
            }
            (Phase::AwaitingResponse, KeyCode::Enter) => self.submit(),
            (Phase::Scored { .. }, KeyCode::Enter) => self.dispatch(SessionEvent::Continue),
            _ => {}
        }
    }

    fn start_test(&mut self) {
        let Some(participant) = self.participant.clone() else {
            self.state = AppState::Intake;
            return;
        };

        self.state = AppState::Testing;
        self.dispatch(SessionEvent::Start {
            participant,
            mode: self.selected_mode,
        });
        if self.session.phase() == Phase::AwaitingConfig {
            // configuration was rejected; the error is already in `status`
            self.state = AppState::Ready;
        }
    }

    fn submit(&mut self) {
        let time_taken = self.timer.elapsed_secs().unwrap_or(0.0);
        let input = std::mem::take(&mut self.input);
        self.dispatch(SessionEvent::Submit { input, time_taken });
    }

    /// Feeds one event to the session and sets up whatever the new phase needs
    /// on screen.
    pub fn dispatch(&mut self, event: SessionEvent) {
        let name = event.name();
        match self.session.handle(event) {
            Ok(phase) => {
                debug!("{} -> {}", name, phase.name());
                self.enter_phase(phase);
            }
            Err(e) => {
                debug!("rejected {}: {}", name, e);
                self.status = Some(StatusMessage::error(e.to_string()));
            }
        }
    }

    fn enter_phase(&mut self, phase: Phase) {
        match phase {
            Phase::ShowingStimulus => {
                let sequence = self
                    .session
                    .trial()
                    .map(|t| t.current_sequence())
                    .unwrap_or_default();
                self.playback = Some(StimulusPlayback::new(
                    sequence,
                    self.config.symbol_interval(),
                ));
                self.input.clear();
                self.timer.clear();
            }
            Phase::AwaitingResponse => {
                self.playback = None;
                self.input.clear();
                self.timer.start();
            }
            Phase::Scored { .. } => {
                self.feedback_elapsed = Duration::ZERO;
                self.timer.clear();
            }
            Phase::AwaitingConfig => {}
        }
    }

    pub fn save_results(&mut self) {
        let Some(snapshot) = self.session.snapshot(Local::now()) else {
            self.status = Some(StatusMessage::info("Nothing to save yet."));
            return;
        };
        let Some(store) = self.store.as_mut() else {
            self.status = Some(StatusMessage::error(
                "No results database is available; results were not saved.",
            ));
            return;
        };

        match store.save(&snapshot) {
            Ok(id) => {
                info!("results saved as session {}", id);
                self.status = Some(StatusMessage::success(format!(
                    "Saved #{}: mode {}, max length {}, accuracy {:.2}%",
                    id,
                    snapshot.mode,
                    snapshot.max_success_length,
                    snapshot.accuracy * 100.0
                )));
            }
            Err(e) => {
                error!("failed to save results: {}", e);
                self.status = Some(StatusMessage::error(format!(
                    "Failed to save results: {e}"
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResultsResult;
    use crate::results::{ResultsDb, SavedSession};
    use crate::session::SessionSnapshot;
    use std::sync::{Arc, Mutex};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_str(app: &mut App, s: &str) {
        for c in s.chars() {
            app.on_key(key(KeyCode::Char(c)));
        }
    }

    fn test_config() -> Config {
        Config {
            symbol_interval_ms: 100,
            feedback_ms: 200,
            ..Config::default()
        }
    }

    /// Drives the app from the intake form to the first response prompt.
    fn app_awaiting_response(mode: Mode, store: Option<Box<dyn ResultStore>>) -> App {
        let mut app = App::new(test_config(), Some(1), store);
        type_str(&mut app, "Ada");
        app.on_key(key(KeyCode::Tab));
        type_str(&mut app, "ada@example.com");
        app.on_key(key(KeyCode::Enter));
        if mode == Mode::Backward {
            app.on_key(key(KeyCode::Down));
        }
        app.on_key(key(KeyCode::Enter));
        app.on_key(key(KeyCode::Enter));
        app.on_tick(Duration::from_secs(10));
        assert_eq!(app.session.phase(), Phase::AwaitingResponse);
        app
    }

    fn expected(app: &App) -> String {
        app.session.trial().unwrap().expected_answer()
    }

    #[derive(Clone, Default)]
    struct MemoryStore {
        saved: Arc<Mutex<Vec<SessionSnapshot>>>,
    }

    impl ResultStore for MemoryStore {
        fn save(&mut self, snapshot: &SessionSnapshot) -> ResultsResult<i64> {
            let mut saved = self.saved.lock().unwrap();
            saved.push(snapshot.clone());
            Ok(saved.len() as i64)
        }

        fn recent(&self, _limit: usize) -> ResultsResult<Vec<SavedSession>> {
            Ok(vec![])
        }

        fn get(&self, id: i64) -> ResultsResult<SavedSession> {
            Err(crate::error::ResultsError::NotFound(id))
        }

        fn best_for_email(&self, email: &str, mode: Mode) -> ResultsResult<Option<usize>> {
            let saved = self.saved.lock().unwrap();
            Ok(saved
                .iter()
                .filter(|s| s.email == email && s.mode == mode)
                .map(|s| s.max_success_length)
                .max())
        }
    }

    #[test]
    fn test_intake_requires_both_fields() {
        let mut app = App::new(test_config(), None, None);
        type_str(&mut app, "Ada");
        app.on_key(key(KeyCode::Enter));
        assert_eq!(app.intake.focus, IntakeField::Email);
        assert_eq!(app.state, AppState::Intake);

        app.on_key(key(KeyCode::Tab));
        app.on_key(key(KeyCode::Backspace));
        app.on_key(key(KeyCode::Backspace));
        app.on_key(key(KeyCode::Backspace));
        app.on_key(key(KeyCode::Tab));
        type_str(&mut app, "ada@example.com");
        app.on_key(key(KeyCode::Enter));

        assert_eq!(app.state, AppState::Intake);
        assert!(app.intake.warning.is_some());
    }

    #[test]
    fn test_intake_rejects_bad_email() {
        let mut app = App::new(test_config(), None, None);
        type_str(&mut app, "Ada");
        app.on_key(key(KeyCode::Tab));
        type_str(&mut app, "not-an-email");
        app.on_key(key(KeyCode::Enter));
        assert_eq!(app.state, AppState::Intake);
        assert!(app.intake.warning.as_deref().unwrap().contains("not-an-email"));
    }

    #[test]
    fn test_mode_selection() {
        let mut app = App::new(test_config(), None, None);
        app.state = AppState::ModeSelect;
        assert_eq!(app.selected_mode, Mode::Forward);
        app.on_key(key(KeyCode::Down));
        assert_eq!(app.selected_mode, Mode::Backward);
        app.on_key(key(KeyCode::Char('f')));
        assert_eq!(app.selected_mode, Mode::Forward);
        app.on_key(key(KeyCode::Enter));
        assert_eq!(app.state, AppState::Ready);
    }

    #[test]
    fn test_stimulus_plays_then_prompts() {
        let mut app = App::new(test_config(), Some(1), None);
        type_str(&mut app, "Ada");
        app.on_key(key(KeyCode::Tab));
        type_str(&mut app, "ada@example.com");
        app.on_key(key(KeyCode::Enter));
        app.on_key(key(KeyCode::Enter));
        app.on_key(key(KeyCode::Enter));

        assert_eq!(app.state, AppState::Testing);
        assert_eq!(app.session.phase(), Phase::ShowingStimulus);
        let first = app.session.trial().unwrap().current_sequence()[0];
        assert_eq!(app.playback.as_ref().unwrap().visible_symbol(), Some(first));

        // typing while the sequence is on screen is ignored
        type_str(&mut app, "9");
        assert!(app.input.is_empty());

        app.on_tick(Duration::from_millis(150));
        assert_eq!(app.session.phase(), Phase::ShowingStimulus);
        app.on_tick(Duration::from_millis(200));
        assert_eq!(app.session.phase(), Phase::AwaitingResponse);
        assert!(app.timer.is_running());
        assert!(app.playback.is_none());
    }

    #[test]
    fn test_correct_answer_auto_advances() {
        let mut app = app_awaiting_response(Mode::Forward, None);
        let answer = expected(&app);
        type_str(&mut app, &answer);
        app.on_key(key(KeyCode::Enter));

        assert!(matches!(
            app.session.phase(),
            Phase::Scored { correct: true, .. }
        ));
        // a correct answer can only move on to the next length
        app.on_key(ctrl('t'));
        app.on_key(ctrl('p'));
        assert_eq!(app.status.as_ref().unwrap().kind, StatusKind::Error);
        assert!(matches!(app.session.phase(), Phase::Scored { .. }));
        app.on_tick(Duration::from_millis(100));
        assert!(matches!(app.session.phase(), Phase::Scored { .. }));
        app.on_tick(Duration::from_millis(100));
        assert_eq!(app.session.phase(), Phase::ShowingStimulus);
        assert_eq!(app.session.trial().unwrap().length(), 4);
    }

    #[test]
    fn test_backward_answer() {
        let mut app = app_awaiting_response(Mode::Backward, None);
        let shown = app.session.trial().unwrap().sequence_string();
        let reversed: String = shown.chars().rev().collect();
        type_str(&mut app, &reversed);
        app.on_key(key(KeyCode::Enter));
        assert!(matches!(
            app.session.phase(),
            Phase::Scored { correct: true, .. }
        ));
    }

    #[test]
    fn test_wrong_answer_returns_to_prompt() {
        let mut app = app_awaiting_response(Mode::Forward, None);
        let before = app.session.trial().unwrap().current_sequence();
        type_str(&mut app, "x");
        app.on_key(key(KeyCode::Enter));
        assert!(matches!(
            app.session.phase(),
            Phase::Scored { correct: false, .. }
        ));
        app.on_tick(Duration::from_secs(10));
        assert!(matches!(app.session.phase(), Phase::Scored { .. }));

        app.on_key(key(KeyCode::Enter));
        assert_eq!(app.session.phase(), Phase::AwaitingResponse);
        assert_eq!(app.session.trial().unwrap().current_sequence(), before);
        assert!(app.timer.is_running());
        assert!(app.input.is_empty());
    }

    #[test]
    fn test_control_keys() {
        let mut app = app_awaiting_response(Mode::Forward, None);

        app.on_key(ctrl('p'));
        assert_eq!(app.session.phase(), Phase::ShowingStimulus);

        // retry is not allowed while the stimulus is showing
        app.on_key(ctrl('t'));
        assert_eq!(app.status.as_ref().unwrap().kind, StatusKind::Error);

        app.on_tick(Duration::from_secs(10));
        app.on_key(ctrl('t'));
        assert_eq!(app.session.phase(), Phase::ShowingStimulus);
        assert_eq!(app.session.trial().unwrap().length(), 3);

        app.on_key(ctrl('r'));
        assert_eq!(app.session.phase(), Phase::ShowingStimulus);
        assert_eq!(app.session.trial().unwrap().total_attempts(), 0);
    }

    #[test]
    fn test_escape_quits() {
        let mut app = App::new(test_config(), None, None);
        app.on_key(key(KeyCode::Esc));
        assert!(app.should_quit);

        let mut app = App::new(test_config(), None, None);
        app.on_key(ctrl('c'));
        assert!(app.should_quit);
    }

    #[test]
    fn test_save_hands_off_snapshot() {
        let store = MemoryStore::default();
        let saved = store.saved.clone();
        let mut app = app_awaiting_response(Mode::Forward, Some(Box::new(store)));

        let answer = expected(&app);
        type_str(&mut app, &answer);
        app.on_key(key(KeyCode::Enter));
        app.on_key(ctrl('s'));

        let saved = saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].email, "ada@example.com");
        assert_eq!(saved[0].max_success_length, 3);
        assert_eq!(saved[0].history.len(), 1);
        assert_eq!(app.status.as_ref().unwrap().kind, StatusKind::Success);
    }

    #[test]
    fn test_save_to_database() {
        let db = ResultsDb::open_in_memory().unwrap();
        let mut app = app_awaiting_response(Mode::Backward, Some(Box::new(db)));
        type_str(&mut app, "0");
        app.on_key(key(KeyCode::Enter));
        app.on_key(ctrl('s'));

        let status = app.status.as_ref().unwrap();
        assert_eq!(status.kind, StatusKind::Success);
        assert!(status.text.contains("Backward"));
        assert!(status.text.contains("0.00%"));
    }

    #[test]
    fn test_save_without_store_reports_error() {
        let mut app = app_awaiting_response(Mode::Forward, None);
        app.on_key(ctrl('s'));
        assert_eq!(app.status.as_ref().unwrap().kind, StatusKind::Error);
        assert_eq!(app.personal_best, None);
    }

    #[test]
    fn test_mode_selection_by_number() {
        let mut app = App::new(test_config(), None, None);
        app.state = AppState::ModeSelect;
        app.on_key(key(KeyCode::Char('1')));
        assert_eq!(app.selected_mode, Mode::Backward);
        app.on_key(key(KeyCode::Char('7')));
        assert_eq!(app.selected_mode, Mode::Backward);
        app.on_key(key(KeyCode::Char('0')));
        assert_eq!(app.selected_mode, Mode::Forward);
    }

    #[test]
    fn test_personal_best_loaded_for_selected_mode() {
        let store = MemoryStore::default();
        {
            let mut saved = store.saved.lock().unwrap();
            for (mode, best) in [(Mode::Forward, 6), (Mode::Forward, 8), (Mode::Backward, 5)] {
                saved.push(SessionSnapshot {
                    name: "Ada".into(),
                    email: "ada@example.com".into(),
                    mode,
                    max_success_length: best,
                    max_success_time: 2.0,
                    accuracy: 1.0,
                    history: vec![],
                    recorded_at: Local::now(),
                });
            }
        }

        let mut app = App::new(test_config(), Some(1), Some(Box::new(store.clone())));
        type_str(&mut app, "Ada");
        app.on_key(key(KeyCode::Tab));
        type_str(&mut app, "ada@example.com");
        app.on_key(key(KeyCode::Enter));
        app.on_key(key(KeyCode::Enter));
        assert_eq!(app.state, AppState::Ready);
        assert_eq!(app.personal_best, Some(8));

        let mut app = App::new(test_config(), Some(1), Some(Box::new(store)));
        type_str(&mut app, "Grace");
        app.on_key(key(KeyCode::Tab));
        type_str(&mut app, "grace@example.com");
        app.on_key(key(KeyCode::Enter));
        app.on_key(key(KeyCode::Char('b')));
        app.on_key(key(KeyCode::Enter));
        assert_eq!(app.personal_best, None);
    }
}
