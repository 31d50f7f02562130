pub mod ui;

use clap::{error::ErrorKind, Args, CommandFactory, Parser, Subcommand, ValueEnum};
use crossterm::{
    event::{DisableBracketedPaste, EnableBracketedPaste, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    fs,
    io::{self, stdin},
    path::PathBuf,
    time::Duration,
};
use tracing::{info, warn};

use verbatim::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    db::SqliteStore,
    demo,
    generate::{self, CardGenerator, GeminiGenerator},
    logging,
    model::{now_millis, AssistanceConfig, CardPatch, DeckPatch, Scope, StudyData, TimeRecord},
    runtime::{keystroke_for, CrosstermEventSource, FixedTicker, MonotonicClock, Runner, StudyEvent},
    session::{Handoff, SessionController, SessionEvent},
    session_log::SessionLog,
    store::Store,
    typing_policy::{Admission, Keystroke},
    util::format_elapsed,
};

const SHAKE_MS: u64 = 200;

/// memorize prose verbatim by typing it
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Memorize prose verbatim by typing it from memory. Only correct characters are accepted; ghost text, full text and autocorrect can help along the way."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// list decks
    Decks,
    /// create, rename or remove a deck
    Deck {
        #[command(subcommand)]
        action: DeckAction,
    },
    /// list the cards of a deck
    Cards { deck_id: String },
    /// create, edit or remove a card
    Card {
        #[command(subcommand)]
        action: CardAction,
    },
    /// study a single card or a whole deck
    Study {
        #[clap(value_enum)]
        scope: ScopeArg,
        id: String,
        #[command(flatten)]
        assistance: AssistanceFlags,
    },
    /// show the best three times of a card or deck
    Best {
        #[clap(value_enum)]
        scope: ScopeArg,
        id: String,
    },
    /// generate cards into a deck from a prompt
    Generate {
        deck_id: String,
        #[clap(required = true)]
        prompt: Vec<String>,
    },
    /// add the bundled sample decks
    Demo,
    /// write every deck, card and time to a JSON file
    Export { path: PathBuf },
    /// replace all data with a previously exported JSON file
    Import { path: PathBuf },
}

#[derive(Subcommand, Debug, Clone)]
enum DeckAction {
    Add {
        name: String,
        #[clap(short, long)]
        description: Option<String>,
    },
    Rename {
        id: String,
        name: String,
        #[clap(short, long)]
        description: Option<String>,
    },
    Rm { id: String },
}

#[derive(Subcommand, Debug, Clone)]
enum CardAction {
    Add {
        deck_id: String,
        title: String,
        #[command(flatten)]
        content: ContentArgs,
    },
    Edit {
        id: String,
        #[clap(short, long)]
        title: Option<String>,
        #[command(flatten)]
        content: ContentArgs,
    },
    Rm { id: String },
}

#[derive(Args, Debug, Clone, Default)]
struct ContentArgs {
    /// card text
    #[clap(short, long, conflicts_with = "file")]
    content: Option<String>,
    /// read the card text from a file
    #[clap(short, long)]
    file: Option<PathBuf>,
}

impl ContentArgs {
    fn read(&self) -> io::Result<Option<String>> {
        match (&self.content, &self.file) {
            (Some(text), _) => Ok(Some(text.clone())),
            (None, Some(path)) => fs::read_to_string(path).map(Some),
            (None, None) => Ok(None),
        }
    }
}

#[derive(Args, Debug, Clone, Copy, Default)]
struct AssistanceFlags {
    /// reveal the next few characters after a pause
    #[clap(long)]
    ghost_text: bool,
    /// show the whole text while typing
    #[clap(long)]
    full_text: bool,
    /// ignore case and skip punctuation
    #[clap(long)]
    autocorrect: bool,
}

impl AssistanceFlags {
    /// Flags switch assistance on for this session on top of the configured defaults.
    fn resolve(&self, defaults: AssistanceConfig) -> AssistanceConfig {
        AssistanceConfig {
            ghost_text: self.ghost_text || defaults.ghost_text,
            full_text: self.full_text || defaults.full_text,
            autocorrect: self.autocorrect || defaults.autocorrect,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ScopeArg {
    Card,
    Deck,
}

impl From<ScopeArg> for Scope {
    fn from(s: ScopeArg) -> Self {
        match s {
            ScopeArg::Card => Scope::Card,
            ScopeArg::Deck => Scope::Deck,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Studying,
    Done,
}

pub struct App {
    pub controller: SessionController,
    pub state: AppState,
    pub handoff: Option<Handoff>,
    pub best: Vec<TimeRecord>,
    /// Monotonic time of the last event, used for the session clock.
    pub now_ms: u64,
    /// Wall-clock time, used for "3 days ago" labels.
    pub wall_now_ms: i64,
    pub shake_until_ms: Option<u64>,
}

impl App {
    pub fn new(controller: SessionController) -> Self {
        Self {
            controller,
            state: AppState::Studying,
            handoff: None,
            best: Vec::new(),
            now_ms: 0,
            wall_now_ms: now_millis(),
            shake_until_ms: None,
        }
    }

    pub fn is_shaking(&self) -> bool {
        self.shake_until_ms.is_some_and(|until| self.now_ms < until)
    }

    pub fn on_key(&mut self, key: &Keystroke, now_ms: u64) -> Admission {
        self.now_ms = now_ms;
        self.controller.handle_key(key, now_ms)
    }

    pub fn on_tick(&mut self, now_ms: u64) {
        self.now_ms = now_ms;
        self.wall_now_ms = now_millis();
        self.controller.tick(now_ms);
    }

    /// Apply queued controller events: persist records, log the finished
    /// session and switch to the completion screen.
    pub fn pump_events<S: Store + ?Sized>(
        &mut self,
        store: &mut S,
        log: Option<&SessionLog>,
    ) -> Result<(), Box<dyn Error>> {
        while let Some(event) = self.controller.poll_event() {
            match event {
                SessionEvent::Rejected(_) => {
                    self.shake_until_ms = Some(self.now_ms + SHAKE_MS);
                }
                SessionEvent::Record(record) => {
                    store.add_time_record(record)?;
                }
                SessionEvent::SessionCompleted(handoff) => {
                    if let Some(log) = log {
                        if let Err(e) = log.append(&handoff) {
                            warn!(error = %e, "could not append to session log");
                        }
                    }
                    if let Some(id) = self.controller.plan().scope_id() {
                        self.best = store.best_times(handoff.mode, id)?;
                    }
                    self.handoff = Some(handoff);
                    self.state = AppState::Done;
                }
                SessionEvent::Started
                | SessionEvent::GhostRevealed(_)
                | SessionEvent::CardCompleted { .. } => {}
            }
        }
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let _log_guard = AppDirs::log_dir().and_then(|dir| logging::init(&dir));

    if let Err(e) = run(cli) {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::InvalidValue, e.to_string()).exit();
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = FileConfigStore::new().load();
    let mut store = SqliteStore::open_default()?;
    if demo::seed_if_empty(&mut store)? {
        info!("seeded demo decks into an empty store");
    }

    match cli.command.unwrap_or(Command::Decks) {
        Command::Decks => print_decks(&store)?,
        Command::Deck { action } => run_deck_action(&mut store, action)?,
        Command::Cards { deck_id } => print_cards(&store, &deck_id)?,
        Command::Card { action } => run_card_action(&mut store, action)?,
        Command::Study {
            scope,
            id,
            assistance,
        } => study(&mut store, &config, scope.into(), &id, assistance)?,
        Command::Best { scope, id } => print_best(&store, scope.into(), &id)?,
        Command::Generate { deck_id, prompt } => {
            if store.deck(&deck_id)?.is_none() {
                return Err(format!("deck {deck_id} not found").into());
            }
            let generator = GeminiGenerator::from_config(&config)?;
            let cards = generator.generate(&prompt.join(" "))?;
            let added = generate::replay_into_store(&mut store, &deck_id, &cards)?;
            println!("added {added} cards");
        }
        Command::Demo => {
            let added = demo::load_demo_data(&mut store)?;
            println!("added {added} demo decks");
        }
        Command::Export { path } => {
            let data = store.snapshot()?;
            fs::write(&path, serde_json::to_vec_pretty(&data)?)?;
            println!("exported to {}", path.display());
        }
        Command::Import { path } => {
            let data: StudyData = serde_json::from_slice(&fs::read(&path)?)?;
            store.restore(data)?;
            println!("imported {}", path.display());
        }
    }
    Ok(())
}

fn print_decks<S: Store + ?Sized>(store: &S) -> Result<(), Box<dyn Error>> {
    let decks = store.decks()?;
    if decks.is_empty() {
        println!("no decks yet, try `verbatim demo`");
    }
    for deck in decks {
        let count = store.cards_in_deck(&deck.id)?.len();
        println!("{}  {}  ({} cards)", deck.id, deck.name, count);
        if let Some(desc) = deck.description.as_deref().filter(|d| !d.is_empty()) {
            println!("    {desc}");
        }
    }
    Ok(())
}

fn print_cards<S: Store + ?Sized>(store: &S, deck_id: &str) -> Result<(), Box<dyn Error>> {
    if store.deck(deck_id)?.is_none() {
        return Err(format!("deck {deck_id} not found").into());
    }
    for card in store.cards_in_deck(deck_id)? {
        println!("{}  {}  ({} chars)", card.id, card.title, card.content.chars().count());
    }
    Ok(())
}

fn run_deck_action<S: Store + ?Sized>(store: &mut S, action: DeckAction) -> Result<(), Box<dyn Error>> {
    match action {
        DeckAction::Add { name, description } => {
            let deck = store.create_deck(&name, description.as_deref())?;
            println!("{}", deck.id);
        }
        DeckAction::Rename {
            id,
            name,
            description,
        } => store.update_deck(
            &id,
            DeckPatch {
                name: Some(name),
                description,
            },
        )?,
        DeckAction::Rm { id } => store.delete_deck(&id)?,
    }
    Ok(())
}

fn run_card_action<S: Store + ?Sized>(store: &mut S, action: CardAction) -> Result<(), Box<dyn Error>> {
    match action {
        CardAction::Add {
            deck_id,
            title,
            content,
        } => {
            let Some(text) = content.read()? else {
                return Err("card text required: pass --content or --file".into());
            };
            let card = store.create_card(&deck_id, &title, &text)?;
            println!("{}", card.id);
        }
        CardAction::Edit { id, title, content } => store.update_card(
            &id,
            CardPatch {
                title,
                content: content.read()?,
            },
        )?,
        CardAction::Rm { id } => store.delete_card(&id)?,
    }
    Ok(())
}

fn print_best<S: Store + ?Sized>(store: &S, scope: Scope, id: &str) -> Result<(), Box<dyn Error>> {
    let records = store.best_times(scope, id)?;
    if records.is_empty() {
        println!("no times recorded for {scope} {id}");
        return Ok(());
    }
    let now = now_millis();
    for (i, r) in records.iter().enumerate() {
        let flags = r.assistance.enabled_flags();
        println!(
            "{}. {}  {}  {}",
            i + 1,
            format_elapsed(r.elapsed_ms),
            if flags.is_empty() {
                "no assistance".to_string()
            } else {
                flags.join(", ")
            },
            verbatim::util::humanize_completed_at(r.completed_at, now)
        );
    }
    Ok(())
}

fn study(
    store: &mut SqliteStore,
    config: &Config,
    scope: Scope,
    id: &str,
    flags: AssistanceFlags,
) -> Result<(), Box<dyn Error>> {
    let plan = match scope {
        Scope::Card => store.card_plan(id)?,
        Scope::Deck => store.deck_plan(id)?,
    };
    let Some(plan) = plan else {
        println!("Nothing to study.");
        return Ok(());
    };

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let settings = config.session_settings(flags.resolve(config.default_assistance));
    let clock = MonotonicClock::new();
    let controller = SessionController::new(plan, settings, clock.now_ms())?;
    let mut app = App::new(controller);
    let log = SessionLog::open_default();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(
        &mut terminal,
        &mut app,
        store,
        log.as_ref(),
        &clock,
        Duration::from_millis(config.tick_rate_ms),
    );

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableBracketedPaste, LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result?;
    if let Some(handoff) = &app.handoff {
        println!(
            "{} \"{}\" done in {}",
            handoff.mode,
            handoff.title,
            format_elapsed(handoff.elapsed_ms)
        );
    }
    Ok(())
}

fn start_tui<B: Backend, S: Store + ?Sized>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    store: &mut S,
    log: Option<&SessionLog>,
    clock: &MonotonicClock,
    tick_rate: Duration,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(CrosstermEventSource::new(), FixedTicker::new(tick_rate));

    loop {
        terminal.draw(|f| ui(app, f))?;

        let now = clock.now_ms();
        match runner.step() {
            StudyEvent::Tick => app.on_tick(now),
            StudyEvent::Resize => {}
            StudyEvent::Paste(text) => {
                if app.state == AppState::Studying {
                    app.on_key(&Keystroke::Insert(text), now);
                }
            }
            StudyEvent::Key(key) => {
                let ctrl_c = key.modifiers.contains(KeyModifiers::CONTROL)
                    && key.code == KeyCode::Char('c');
                match app.state {
                    AppState::Done => break,
                    AppState::Studying if key.code == KeyCode::Esc || ctrl_c => {
                        app.controller.cancel();
                        break;
                    }
                    AppState::Studying => {
                        if let Some(stroke) = keystroke_for(&key) {
                            app.on_key(&stroke, now);
                        }
                    }
                }
            }
        }

        app.pump_events(store, log)?;
    }

    Ok(())
}

fn ui(app: &mut App, f: &mut Frame) {
    f.render_widget(&*app, f.area());
}
