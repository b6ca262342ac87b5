//! Core TUI application state and event loop.
//!
//! Screens never touch the disk themselves. They return [`Command`]s, which
//! the loop runs on a blocking pool and answers with [`Msg`]s over a channel.

use std::fs::OpenOptions;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;
use std::time::Duration;

use color_eyre::eyre::Result;
use crossterm::{
    event::{
        self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use pluqqy_shared::{Pipeline, editor_command};
use pluqqy_storage::Store;

use crate::event::{Command, Msg, Project, View, launch_editor, load_pools, open_external, perform};
use crate::screens::{ListScreen, PipelineBuilder, Screen};

type Term = Terminal<CrosstermBackend<io::Stdout>>;

/// Result channel for background work, stamped with the screen generation
/// that asked for it. Switching screens starts a new generation, and anything
/// still in flight for the old screen is dropped on arrival.
struct Mailbox {
    generation: u64,
    tx: Sender<(u64, Msg)>,
    rx: Receiver<(u64, Msg)>,
}

/// Sending half handed to a background task.
#[derive(Clone)]
struct Reply {
    generation: u64,
    tx: Sender<(u64, Msg)>,
}

impl Reply {
    fn send(&self, msg: Msg) {
        let _ = self.tx.send((self.generation, msg));
    }
}

impl Mailbox {
    fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            generation: 0,
            tx,
            rx,
        }
    }

    fn reply(&self) -> Reply {
        Reply {
            generation: self.generation,
            tx: self.tx.clone(),
        }
    }

    fn advance(&mut self) {
        self.generation += 1;
    }

    /// Next message addressed to the current screen, skipping stale ones.
    fn try_next(&self) -> Option<Msg> {
        while let Ok((generation, msg)) = self.rx.try_recv() {
            if generation == self.generation {
                return Some(msg);
            }
            debug!(generation, current = self.generation, "dropping stale result");
        }
        None
    }
}

/// Application state.
pub(crate) struct App {
    project: Project,
    screen: Screen,
    runtime: Runtime,
    mailbox: Mailbox,
    size: (u16, u16),
    should_quit: bool,
}

impl App {
    fn new(project: Project, size: (u16, u16)) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;
        Ok(Self {
            project,
            screen: Screen::List(ListScreen::new()),
            runtime,
            mailbox: Mailbox::new(),
            size,
            should_quit: false,
        })
    }

    /// Feed one message to the active screen and run what it asks for.
    fn dispatch(&mut self, msg: Msg, terminal: &mut Term) -> Result<()> {
        if let Msg::Resize(w, h) = msg {
            self.size = (w, h);
        }
        let cmd = self.screen.update(msg);
        match cmd {
            Some(cmd) => self.execute(cmd, terminal),
            None => Ok(()),
        }
    }

    fn execute(&mut self, cmd: Command, terminal: &mut Term) -> Result<()> {
        match cmd {
            Command::Batch(cmds) => {
                for cmd in cmds {
                    self.execute(cmd, terminal)?;
                }
            }
            Command::After(delay, msg) => {
                let reply = self.mailbox.reply();
                self.runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    reply.send(*msg);
                });
            }
            Command::SwitchView(view) => {
                if let Some(cmd) = self.switch(view) {
                    self.execute(cmd, terminal)?;
                }
            }
            Command::Quit => self.should_quit = true,
            Command::OpenExternal(file) => {
                self.runtime.spawn_blocking(move || open_external(&file));
            }
            Command::ExternalEdit(path) => {
                let store = &self.project.store;
                let result = external_edit(editor_command(), |program, args| {
                    suspend(terminal)?;
                    let outcome = launch_editor(store, &path, program, args);
                    resume(terminal)?;
                    Ok(outcome)
                })?;
                if let Err(e) = &result {
                    warn!(%path, error = %e, "external editor failed");
                }
                self.dispatch(Msg::ExternalEditFinished(result), terminal)?;
            }
            other => {
                debug!("spawning blocking command");
                let reply = self.mailbox.reply();
                let project = self.project.clone();
                self.runtime.spawn_blocking(move || {
                    if let Some(msg) = perform(other, &project) {
                        reply.send(msg);
                    }
                });
            }
        }
        Ok(())
    }

    /// Replace the active screen. Returns the new screen's first command.
    fn switch(&mut self, view: View) -> Option<Command> {
        match view {
            View::List => {
                self.screen = Screen::List(ListScreen::new());
                self.mailbox.advance();
                info!(screen = %self.screen.id(), "switched screen");
                Some(ListScreen::load())
            }
            View::Builder(path) => match open_builder(&self.project, path.as_deref(), self.size) {
                Ok(builder) => {
                    self.screen = Screen::Builder(Box::new(builder));
                    self.mailbox.advance();
                    info!(screen = %self.screen.id(), "switched screen");
                    None
                }
                Err(e) => {
                    warn!(error = %e, "could not open builder");
                    self.screen.update(Msg::Status(format!("✗ {e}")))
                }
            },
        }
    }
}

fn open_builder(
    project: &Project,
    path: Option<&str>,
    (width, height): (u16, u16),
) -> pluqqy_shared::Result<PipelineBuilder> {
    let pipeline = match path {
        Some(path) => project.store.read_pipeline(path)?,
        None => Pipeline::default(),
    };
    let pools = load_pools(&project.store, false)?;
    Ok(PipelineBuilder::new(project.clone(), pipeline, pools, width, height))
}

/// Resolve the editor before `session` releases the terminal, so a missing
/// or rejected `$EDITOR` never leaves the alternate screen.
fn external_edit(
    editor: pluqqy_shared::Result<(String, Vec<String>)>,
    session: impl FnOnce(&str, &[String]) -> Result<pluqqy_shared::Result<()>>,
) -> Result<std::result::Result<(), String>> {
    let (program, args) = match editor {
        Ok(cmd) => cmd,
        Err(e) => return Ok(Err(e.to_string())),
    };
    Ok(session(&program, &args)?.map_err(|e| e.to_string()))
}

/// Send log output to `.pluqqy/pluqqy.log`; the terminal belongs to the UI.
fn init_logging(store: &Store) {
    use tracing_subscriber::{EnvFilter, fmt};

    let path = store.data_dir().join("pluqqy.log");
    let file = match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(f) => f,
        Err(_) => return,
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pluqqy=info"));
    // A subscriber may already be installed by the caller.
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
}

/// Entry point: sets up terminal, runs event loop, restores terminal.
pub(crate) fn run(project: Project) -> Result<()> {
    init_logging(&project.store);
    info!(root = %project.store.project_root().display(), "starting tui");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, project);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(terminal: &mut Term, project: Project) -> Result<()> {
    let size = terminal.size()?;
    let mut app = App::new(project, (size.width, size.height))?;
    app.execute(ListScreen::load(), terminal)?;

    loop {
        terminal.draw(|f| app.screen.draw(f))?;

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    app.dispatch(Msg::Key(key), terminal)?;
                }
                Event::Paste(text) => app.dispatch(Msg::Paste(text), terminal)?,
                Event::Resize(w, h) => app.dispatch(Msg::Resize(w, h), terminal)?,
                _ => {}
            }
        }

        while let Some(msg) = app.mailbox.try_next() {
            app.dispatch(msg, terminal)?;
        }

        if app.should_quit {
            info!("quit requested");
            break;
        }
    }

    Ok(())
}

/// Hand the terminal back to the shell.
fn suspend(terminal: &mut Term) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn resume(terminal: &mut Term) -> Result<()> {
    enable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        EnterAlternateScreen,
        EnableBracketedPaste
    )?;
    terminal.clear()?;
    Ok(())
}
