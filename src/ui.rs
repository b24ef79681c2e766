use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Widget, Wrap},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::{
    app::{App, AppState, IntakeField, StatusKind},
    session::Phase,
    span::Mode,
};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;
const TITLE: &str = "Working Memory Test";

/// Keeps the rightmost part of `s` that fits in `max_width` columns.
pub fn fit_tail(s: &str, max_width: usize) -> &str {
    if s.width() <= max_width {
        return s;
    }
    let mut used = 0;
    for (idx, c) in s.char_indices().rev() {
        used += c.width().unwrap_or(0);
        if used > max_width {
            return &s[idx + c.len_utf8()..];
        }
    }
    s
}

fn mode_hint(mode: Mode) -> &'static str {
    match mode {
        Mode::Forward => "type the sequence in the order it was shown",
        Mode::Backward => "type the sequence in reverse order",
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let dim = Style::default().add_modifier(Modifier::DIM);

        let outer = Block::default()
            .borders(Borders::ALL)
            .title(Span::styled(TITLE, bold.fg(Color::Cyan)));
        let inner = outer.inner(area);
        outer.render(area, buf);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Min(6),    // body
                Constraint::Length(2), // stats
                Constraint::Length(2), // status
                Constraint::Length(1), // key hints
            ])
            .split(inner);

        match self.state {
            AppState::Intake => render_intake(self, chunks[0], buf),
            AppState::ModeSelect => render_mode_select(self, chunks[0], buf),
            AppState::Ready => render_ready(self, chunks[0], buf),
            AppState::Testing => render_test(self, chunks[0], buf),
        }

        if let Some(trial) = self.session.trial() {
            let stats = Line::from(vec![
                Span::raw("Current sequence length: "),
                Span::styled(trial.length().to_string(), bold),
                Span::raw("   Max successful length: "),
                Span::styled(trial.max_success_length().to_string(), bold),
                Span::raw(format!("   Accuracy: {:.2}%", trial.accuracy() * 100.0)),
            ]);
            Paragraph::new(stats)
                .alignment(Alignment::Center)
                .render(chunks[1], buf);
        }

        if let Some(status) = &self.status {
            let color = match status.kind {
                StatusKind::Info => Color::Yellow,
                StatusKind::Success => Color::Green,
                StatusKind::Error => Color::Red,
            };
            Paragraph::new(Span::styled(status.text.as_str(), Style::default().fg(color)))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .render(chunks[2], buf);
        }

        let hints = match self.state {
            AppState::Intake => "(tab) switch field  (enter) continue  (esc) quit",
            AppState::ModeSelect => "(↑/↓ or 0/1) choose  (enter) confirm  (esc) quit",
            AppState::Ready => "(enter) start  (esc) quit",
            AppState::Testing => {
                "(enter) submit  (ctrl+t) new sequence  (ctrl+p) replay  (ctrl+r) restart  (ctrl+s) save  (esc) quit"
            }
        };
        Paragraph::new(Span::styled(hints, dim.add_modifier(Modifier::ITALIC)))
            .alignment(Alignment::Center)
            .render(chunks[3], buf);
    }
}

fn render_intake(app: &App, area: Rect, buf: &mut Buffer) {
    let label = Style::default().add_modifier(Modifier::BOLD);
    let field = |name: &'static str, value: &str, focused: bool| {
        let marker = if focused { "▸ " } else { "  " };
        let value_style = if focused {
            Style::default().add_modifier(Modifier::UNDERLINED)
        } else {
            Style::default()
        };
        let max = (area.width as usize).saturating_sub(12);
        Line::from(vec![
            Span::raw(marker),
            Span::styled(format!("{name:<7}"), label),
            Span::styled(fit_tail(value, max).to_string(), value_style),
            Span::styled(if focused { "_" } else { "" }, label),
        ])
    };

    let mut lines = vec![
        Line::from("Enter your name and email to begin."),
        Line::default(),
        field(
            "Name",
            &app.intake.name,
            app.intake.focus == IntakeField::Name,
        ),
        field(
            "Email",
            &app.intake.email,
            app.intake.focus == IntakeField::Email,
        ),
    ];
    if let Some(warning) = &app.intake.warning {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            format!("Please enter your name and email before starting the test ({warning})."),
            Style::default().fg(Color::Yellow),
        )));
    }

    Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .render(area, buf);
}

fn render_mode_select(app: &App, area: Rect, buf: &mut Buffer) {
    let mut lines = vec![Line::from("Choose mode:"), Line::default()];
    for mode in [Mode::Forward, Mode::Backward] {
        let selected = app.selected_mode == mode;
        let style = if selected {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        lines.push(Line::from(vec![
            Span::styled(if selected { "▸ " } else { "  " }, style),
            Span::styled(mode.to_string(), style),
            Span::styled(format!("  {}", mode_hint(mode)), Style::default().add_modifier(Modifier::DIM)),
        ]));
    }
    Paragraph::new(lines).render(area, buf);
}

fn render_ready(app: &App, area: Rect, buf: &mut Buffer) {
    let who = app
        .participant()
        .map(|p| format!("{} <{}>", p.name, p.email))
        .unwrap_or_default();
    let best = match app.personal_best {
        Some(best) => format!("Personal best: {best}"),
        None => "No saved result in this mode yet".to_string(),
    };
    let lines = vec![
        Line::from(who),
        Line::from(format!(
            "Mode: {} ({})",
            app.selected_mode,
            mode_hint(app.selected_mode)
        )),
        Line::from(Span::styled(best, Style::default().fg(Color::Green))),
        Line::default(),
        Line::from("Each symbol is shown once. Watch closely, then type the sequence."),
        Line::default(),
        Line::from(Span::styled(
            "Press enter to start",
            Style::default().add_modifier(Modifier::BOLD),
        )),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(area, buf);
}

fn render_test(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    match app.session.phase() {
        Phase::ShowingStimulus => {
            Paragraph::new("Remember the sequence:")
                .alignment(Alignment::Center)
                .render(chunks[0], buf);

            if let Some(playback) = &app.playback {
                let symbol = playback
                    .visible_symbol()
                    .map(String::from)
                    .unwrap_or_default();
                let mid = Rect {
                    y: chunks[1].y + chunks[1].height / 2,
                    height: 1,
                    ..chunks[1]
                };
                Paragraph::new(Span::styled(
                    symbol,
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ))
                .alignment(Alignment::Center)
                .render(mid, buf);

                Gauge::default()
                    .gauge_style(Style::default().fg(Color::Cyan))
                    .ratio(playback.progress().clamp(0.0, 1.0))
                    .label(format!(
                        "{}/{}",
                        playback.position().map_or(playback.len(), |p| p + 1),
                        playback.len()
                    ))
                    .render(chunks[2], buf);
            }
        }
        Phase::AwaitingResponse => {
            let mode = app.session.mode().unwrap_or_default();
            Paragraph::new(format!("Enter the sequence ({}):", mode_hint(mode)))
                .alignment(Alignment::Center)
                .render(chunks[0], buf);

            let max = (chunks[1].width as usize).saturating_sub(2);
            let input = Line::from(vec![
                Span::styled(
                    fit_tail(&app.input, max).to_string(),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
            ]);
            let mid = Rect {
                y: chunks[1].y + chunks[1].height / 2,
                height: 1,
                ..chunks[1]
            };
            Paragraph::new(input)
                .alignment(Alignment::Center)
                .render(mid, buf);
        }
        Phase::Scored {
            correct,
            time_taken,
        } => {
            let (text, color) = if correct {
                (
                    format!(
                        "Correct! Time taken: {time_taken:.2} seconds. Moving to the next sequence..."
                    ),
                    Color::Green,
                )
            } else {
                (
                    format!("Incorrect. Time taken: {time_taken:.2} seconds. Try again!"),
                    Color::Red,
                )
            };
            let mid = Rect {
                y: chunks[1].y + chunks[1].height / 2,
                height: 1,
                ..chunks[1]
            };
            Paragraph::new(Span::styled(
                text,
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(mid, buf);
        }
        Phase::AwaitingConfig => {}
    }
}
