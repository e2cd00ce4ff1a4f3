//! benchterm - test fixture shell
//!
//! Keeps its checkout current with the upstream branch at startup, then
//! offers a terminal UI for viewing, running and reviewing test scripts.

use anyhow::Result;
use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use benchterm::app::App;
use benchterm::core::{self, Config, EventHandler};
use benchterm::ui;
use benchterm::update::{run_startup_phase, ConsolePrompter, UpdatePhase};

/// Test fixture shell with startup self-update
#[derive(Parser, Debug)]
#[command(name = "benchterm")]
#[command(version)]
#[command(about = "Run and review fixture test scripts from a self-updating git checkout")]
struct Cli {
    /// Repository root holding the scripts and reports
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging to file
    #[arg(short, long)]
    debug: bool,

    /// Skip the startup update check
    #[arg(long)]
    no_update: bool,
}

fn main() -> Result<()> {
    // Captured before parsing so a restart replays exactly what was typed
    let original_argv: Vec<OsString> = std::env::args_os().collect();
    let cli = Cli::parse();

    if cli.debug {
        init_logging()?;
    }

    let config = Config::load(cli.config.clone())?;
    let workspace = cli.workspace.canonicalize().unwrap_or(cli.workspace);

    // Blocking git work happens before any runtime or terminal setup, so a
    // restart replaces a process that owns neither.
    let update_phase = if cli.no_update || !config.update.enabled {
        UpdatePhase::Idle
    } else {
        let mut prompter = ConsolePrompter::stdin();
        run_startup_phase(&workspace, &config.update, &original_argv, &mut prompter)
    };
    info!(phase = ?update_phase, "startup update phase finished");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let result = runtime.block_on(run_ui(workspace, config, config_path, update_phase));
    // The input thread notices the closed channel within one tick
    runtime.shutdown_timeout(Duration::from_secs(1));

    if let Err(e) = result {
        eprintln!("Error: {e:?}");
        return Err(e);
    }
    Ok(())
}

fn init_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("benchterm")
        .join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("benchterm.log"))?;
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(log_filter())
        .init();
    Ok(())
}

/// `RUST_LOG` when set, otherwise debug output for this crate
fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("benchterm=debug"))
}

async fn run_ui(
    workspace: PathBuf,
    config: Config,
    config_path: PathBuf,
    update_phase: UpdatePhase,
) -> Result<()> {
    ui::init(&config);
    let update_summary = (update_phase != UpdatePhase::Idle).then(|| update_phase.summary());
    let mut app = App::new(workspace, config, update_summary).with_config_path(config_path);

    // Initialize terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let event_handler = EventHandler::new(100);
    let result = run_app(&mut terminal, &mut app, event_handler).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    mut event_handler: EventHandler,
) -> Result<()> {
    loop {
        terminal.draw(|frame| ui::draw(frame, app))?;

        match event_handler.next().await? {
            core::Event::Tick => app.on_tick(),
            core::Event::Key(key_event) => app.on_key(key_event)?,
            // Next draw picks up the new size
            core::Event::Resize(_, _) => {}
        }

        if app.should_quit {
            app.cleanup().await;
            break;
        }
    }

    Ok(())
}
