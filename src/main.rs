use chrono::Local;
use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use log::{info, warn};
use memspan::{
    app::App,
    app_dirs::AppDirs,
    config::{ConfigOverrides, ConfigStore, FileConfigStore},
    results::{ResultStore, ResultsDb, SavedSession},
    runtime::{AppEvent, CrosstermEventSource, FixedTicker, Runner},
    span::Mode,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    fs::{self, OpenOptions},
    io::{self, stdin},
    path::PathBuf,
};

/// digit span working memory test for the terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal digit span test: memorise a sequence of symbols shown one at a time, type it back forward or in reverse, and track how long a sequence you can hold."
)]
pub struct Cli {
    /// length of the first sequence
    #[clap(short = 'l', long)]
    starting_length: Option<usize>,

    /// symbols sequences are drawn from
    #[clap(short = 's', long)]
    symbols: Option<String>,

    /// recall direction preselected on the mode screen
    #[clap(short = 'm', long, value_enum)]
    mode: Option<Mode>,

    /// milliseconds each symbol stays on screen
    #[clap(long)]
    symbol_interval_ms: Option<u64>,

    /// milliseconds the "correct" message stays up
    #[clap(long)]
    feedback_ms: Option<u64>,

    /// seed for reproducible sequences
    #[clap(long)]
    seed: Option<u64>,

    /// persist the given settings as the new defaults
    #[clap(long)]
    save_config: bool,

    /// results database to use instead of the default one
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// list saved sessions, newest first
    History {
        #[clap(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// print one saved session with every attempt
    Show { id: i64 },
    /// write all saved sessions to a CSV file
    Export { path: PathBuf },
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            starting_length: self.starting_length,
            symbols: self.symbols.clone(),
            mode: self.mode,
            symbol_interval_ms: self.symbol_interval_ms,
            feedback_ms: self.feedback_ms,
        }
    }

    fn open_db(&self) -> Result<ResultsDb, Box<dyn Error>> {
        let db = match &self.db {
            Some(path) => ResultsDb::open(path)?,
            None => ResultsDb::open_default()?,
        };
        Ok(db)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging();

    match &cli.command {
        Some(Command::History { limit }) => {
            let db = cli.open_db()?;
            print!("{}", format_history(&db.recent(*limit)?));
        }
        Some(Command::Show { id }) => {
            let db = cli.open_db()?;
            print!("{}", format_session(&db.get(*id)?));
        }
        Some(Command::Export { path }) => {
            let db = cli.open_db()?;
            let n = db.export_csv(path)?;
            println!("Exported {} session(s) to {}", n, path.display());
        }
        None => run(&cli)?,
    }

    Ok(())
}

/// Logs go to a file so they never land on the alternate screen.
fn init_logging() {
    let Some(path) = AppDirs::log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("memspan=info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let store = FileConfigStore::new();
    let config = store.load().with_overrides(&cli.overrides());

    if let Err(e) = config.validate() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::InvalidValue, e.to_string()).exit();
    }

    if cli.save_config {
        store.save(&config)?;
        info!("saved config to {}", store.path().display());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let results: Option<Box<dyn ResultStore>> = match cli.open_db() {
        Ok(db) => Some(Box::new(db)),
        Err(e) => {
            warn!("results database unavailable, saving disabled: {}", e);
            None
        }
    };

    let mut app = App::new(config, cli.seed, results);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let outcome = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Some(snapshot) = app.session.finish(Local::now()) {
        info!(
            "session over for {}: mode {}, max length {}, accuracy {:.2}",
            snapshot.email, snapshot.mode, snapshot.max_success_length, snapshot.accuracy
        );
    }

    outcome
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let mut runner = Runner::new(CrosstermEventSource::new(), FixedTicker::default());

    terminal.draw(|f| f.render_widget(&*app, f.area()))?;
    while !app.should_quit {
        match runner.step() {
            AppEvent::Key(key) => app.on_key(key),
            AppEvent::Tick(dt) => app.on_tick(dt),
            AppEvent::Resize => {}
        }
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;
    }

    Ok(())
}

fn format_history(sessions: &[SavedSession]) -> String {
    if sessions.is_empty() {
        return "No saved sessions.\n".to_string();
    }

    let mut out = format!(
        "{:>4}  {:<19}  {:<16}  {:<24}  {:<8}  {:>7}  {:>8}  {:>8}\n",
        "ID", "DATE", "NAME", "EMAIL", "MODE", "MAX LEN", "MAX TIME", "ACCURACY"
    );
    for saved in sessions {
        let s = &saved.snapshot;
        out.push_str(&format!(
            "{:>4}  {:<19}  {:<16}  {:<24}  {:<8}  {:>7}  {:>7.2}s  {:>7.2}%\n",
            saved.id,
            s.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            s.name,
            s.email,
            s.mode,
            s.max_success_length,
            s.max_success_time,
            s.accuracy * 100.0
        ));
    }
    out
}

fn format_session(saved: &SavedSession) -> String {
    let s = &saved.snapshot;
    let mut out = format!(
        "Session #{}\nDate:                {}\nName:                {}\nEmail:               {}\nMode:                {}\nMax success length:  {}\nMax success time:    {:.2}s\nAccuracy:            {:.2}%\n",
        saved.id,
        s.recorded_at.format("%Y-%m-%d %H:%M:%S"),
        s.name,
        s.email,
        s.mode,
        s.max_success_length,
        s.max_success_time,
        s.accuracy * 100.0
    );

    if s.history.is_empty() {
        out.push_str("\nNo attempts recorded.\n");
        return out;
    }

    out.push_str(&format!(
        "\n{:>3}  {:>6}  {:<20}  {:<20}  {:>8}  {}\n",
        "#", "LENGTH", "SEQUENCE", "INPUT", "TIME", "RESULT"
    ));
    for (i, record) in s.history.iter().enumerate() {
        out.push_str(&format!(
            "{:>3}  {:>6}  {:<20}  {:<20}  {:>7.2}s  {}\n",
            i + 1,
            record.length,
            record.sequence,
            record.input_sequence,
            record.time_taken,
            if record.is_correct { "correct" } else { "incorrect" }
        ));
    }
    out
}
