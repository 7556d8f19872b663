mod app;
mod canvas;
mod controller;
mod error;
mod file_io;
mod remote;
mod shapes;
mod ui;

use std::io::stdout;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind,
        KeyModifiers, MouseButton, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tracing_subscriber::EnvFilter;

use app::{App, LoginField, Mode};
use controller::PersistenceController;
use remote::{start_remote_thread, RemoteCommand, RemoteConfig, RemoteEvent, RemoteHandle};

/// Shape painting client for the painting service
#[derive(Parser, Debug)]
#[command(name = "easel")]
#[command(version, about, long_about = None)]
struct Args {
    /// Painting service root URL
    #[arg(long, default_value = "http://localhost:5000", value_name = "URL")]
    server: String,

    /// Painting file to import on startup
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,
}

/// Log file under the XDG data directory, falling back to ~/.local/share.
fn default_log_path() -> PathBuf {
    let data_dir = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".local/share")
        });
    data_dir.join("easel").join("easel.log")
}

/// Logging goes to a file; stdout belongs to the terminal UI.
fn init_tracing() -> Result<()> {
    let path = default_log_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(&path)
        .with_context(|| format!("Failed to open log file {:?}", path))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("easel=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing()?;

    let remote_handle = start_remote_thread(RemoteConfig {
        base_url: args.server.clone(),
    })?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(PersistenceController::new(remote_handle.command_tx()));

    // Import a painting file if one was given
    if let Some(file_path) = args.file {
        match file_io::load_file(&file_path) {
            Ok(text) => match app.controller.import_document(&mut app.canvas, &text) {
                Ok(()) => app.set_status(format!("Imported \"{}\"", app.canvas.name)),
                Err(e) => app.set_status(e.to_string()),
            },
            Err(e) => app.set_status(format!("Import error: {e}")),
        }
    }

    let result = run_app(&mut terminal, &mut app, &remote_handle);

    let _ = remote_handle.send_command(RemoteCommand::Shutdown);

    // Cleanup terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {:?}", e);
    }

    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut App,
    remote_handle: &RemoteHandle,
) -> Result<()> {
    while app.running {
        terminal.draw(|frame| ui::render(frame, app))?;

        // Drain worker events (non-blocking)
        while let Some(event) = remote_handle.poll_event() {
            apply_remote_event(app, event);
        }

        // Use poll with timeout so worker events keep flowing
        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if !matches!(app.mode, Mode::Login { .. }) {
                        app.clear_status();
                    }
                    match &app.mode {
                        Mode::Login { .. } => handle_login_mode(app, key),
                        Mode::Normal => handle_normal_mode(app, key),
                        Mode::NameInput { .. } => handle_name_input_mode(app, key),
                        Mode::ImportPath { .. } => handle_import_mode(app, key),
                        Mode::ExportPath { .. } => handle_export_mode(app, key),
                        Mode::ConfirmDelete { .. } => handle_confirm_delete_mode(app, key),
                    }
                }
                Event::Mouse(mouse) => {
                    if matches!(app.mode, Mode::Normal)
                        && matches!(mouse.kind, MouseEventKind::Down(MouseButton::Left))
                    {
                        let size = terminal.size()?;
                        let regions =
                            ui::regions(Rect::new(0, 0, size.width, size.height));
                        if let Some((px, py)) =
                            ui::cell_to_canvas(regions.canvas, mouse.column, mouse.row)
                        {
                            app.click_canvas(px, py);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    Ok(())
}

/// Feed a worker event through the controller and surface the outcome.
fn apply_remote_event(app: &mut App, event: RemoteEvent) {
    let login_failed = matches!(event, RemoteEvent::LoginFailed { .. });
    let logged_in = matches!(event, RemoteEvent::LoggedIn { .. });

    let message = app.controller.apply_event(&mut app.canvas, event);

    if logged_in && app.controller.session().is_logged_in() {
        app.mode = Mode::Normal;
    }
    if let Some(message) = message {
        if login_failed && matches!(app.mode, Mode::Login { .. }) {
            app.login_error(message);
        } else {
            app.set_status(message);
        }
    }
}

fn handle_login_mode(app: &mut App, key: event::KeyEvent) {
    match key.code {
        KeyCode::Esc => app.running = false,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.running = false;
        }
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
            if let Mode::Login { field, .. } = &mut app.mode {
                *field = match field {
                    LoginField::Username => LoginField::Password,
                    LoginField::Password => LoginField::Username,
                };
            }
        }
        KeyCode::Enter => {
            let on_username =
                matches!(&app.mode, Mode::Login { field: LoginField::Username, .. });
            if on_username {
                if let Mode::Login { field, .. } = &mut app.mode {
                    *field = LoginField::Password;
                }
            } else {
                app.submit_login();
            }
        }
        KeyCode::Backspace => {
            if let Mode::Login {
                username,
                password,
                field,
                ..
            } = &mut app.mode
            {
                match field {
                    LoginField::Username => {
                        username.pop();
                    }
                    LoginField::Password => {
                        password.pop();
                    }
                }
            }
        }
        KeyCode::Char(c) => {
            if let Mode::Login {
                username,
                password,
                field,
                error,
            } = &mut app.mode
            {
                *error = None;
                match field {
                    LoginField::Username => username.push(c),
                    LoginField::Password => password.push(c),
                }
            }
        }
        _ => {}
    }
}

fn handle_normal_mode(app: &mut App, key: event::KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.running = false,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.running = false;
        }

        KeyCode::Tab => app.cycle_shape(),
        KeyCode::Char('c') => app.cycle_color(),

        KeyCode::Char('s') => app.save(),
        KeyCode::Char('n') => app.new_painting(),
        KeyCode::Char('r') => app.start_rename(),
        KeyCode::Char('i') => app.start_import(),
        KeyCode::Char('e') => app.start_export(),
        KeyCode::Char('L') => app.logout(),

        // Saved-paintings list
        KeyCode::Up | KeyCode::Char('k') => app.sidebar_up(),
        KeyCode::Down | KeyCode::Char('j') => app.sidebar_down(),
        KeyCode::Enter => app.load_selected(),
        KeyCode::Char('d') => app.request_delete_selected(),

        _ => {}
    }
}

fn handle_name_input_mode(app: &mut App, key: event::KeyEvent) {
    match key.code {
        KeyCode::Esc => app.mode = Mode::Normal,
        KeyCode::Enter => app.commit_rename(),
        KeyCode::Backspace => {
            if let Mode::NameInput { text } = &mut app.mode {
                text.pop();
            }
        }
        KeyCode::Char(c) => {
            if let Mode::NameInput { text } = &mut app.mode {
                text.push(c);
            }
        }
        _ => {}
    }
}

fn handle_import_mode(app: &mut App, key: event::KeyEvent) {
    match key.code {
        KeyCode::Esc => app.mode = Mode::Normal,
        KeyCode::Enter => app.commit_import(),
        KeyCode::Backspace => {
            if let Mode::ImportPath { path } = &mut app.mode {
                path.pop();
            }
        }
        KeyCode::Char(c) => {
            if let Mode::ImportPath { path } = &mut app.mode {
                path.push(c);
            }
        }
        _ => {}
    }
}

fn handle_export_mode(app: &mut App, key: event::KeyEvent) {
    match key.code {
        KeyCode::Esc => app.mode = Mode::Normal,
        KeyCode::Enter => app.commit_export(),
        KeyCode::Backspace => {
            if let Mode::ExportPath { path } = &mut app.mode {
                path.pop();
            }
        }
        KeyCode::Char(c) => {
            if let Mode::ExportPath { path } = &mut app.mode {
                path.push(c);
            }
        }
        _ => {}
    }
}

fn handle_confirm_delete_mode(app: &mut App, key: event::KeyEvent) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => app.answer_delete(true),
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.answer_delete(false),
        _ => {}
    }
}
