//! Application state and main logic

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::bench::{list_scripts, ReportIndex};
use crate::core::{Config, OutputSink, RunnerEvent};
use crate::process::{ProcessRunner, RunStatus, ScriptInvocation, ScriptRun};

/// The three operator views. Exactly one is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    TextEditor,
    TestLauncher,
    TestReports,
}

impl View {
    pub fn all() -> [View; 3] {
        [View::TextEditor, View::TestLauncher, View::TestReports]
    }

    pub fn label(&self) -> &'static str {
        match self {
            View::TextEditor => "Text Editor",
            View::TestLauncher => "Test Launcher",
            View::TestReports => "Test Reports",
        }
    }

    pub fn shortcut(&self) -> &'static str {
        match self {
            View::TextEditor => "F1",
            View::TestLauncher => "F2",
            View::TestReports => "F3",
        }
    }

    /// Next view in menu order, wrapping around
    pub fn next(self) -> Self {
        match self {
            View::TextEditor => View::TestLauncher,
            View::TestLauncher => View::TestReports,
            View::TestReports => View::TextEditor,
        }
    }

    /// View selected by a function key, if any
    pub fn from_key(code: KeyCode) -> Option<Self> {
        match code {
            KeyCode::F(1) => Some(View::TextEditor),
            KeyCode::F(2) => Some(View::TestLauncher),
            KeyCode::F(3) => Some(View::TestReports),
            _ => None,
        }
    }

    /// Menus shown in the header for this view
    pub fn menus(&self) -> Vec<Menu> {
        match self {
            View::TextEditor => vec![Menu::View, Menu::File],
            View::TestLauncher | View::TestReports => vec![Menu::View],
        }
    }
}

/// Header menus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Menu {
    View,
    File,
}

impl Menu {
    pub fn label(&self) -> &'static str {
        match self {
            Menu::View => "View",
            Menu::File => "File",
        }
    }

    /// (key, action) hints
    pub fn entries(&self) -> Vec<(&'static str, &'static str)> {
        match self {
            Menu::View => View::all()
                .iter()
                .map(|v| (v.shortcut(), v.label()))
                .collect(),
            Menu::File => vec![("Enter", "Open"), ("Ctrl+R", "Reload"), ("Esc", "Close")],
        }
    }
}

/// Read-only script viewer
#[derive(Debug, Default)]
pub struct EditorState {
    pub path: Option<PathBuf>,
    pub lines: Vec<String>,
    pub scroll: usize,
}

impl EditorState {
    pub fn open(&mut self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)?;
        self.lines = String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_string)
            .collect();
        self.path = Some(path.to_path_buf());
        self.scroll = 0;
        Ok(())
    }

    pub fn close(&mut self) {
        *self = Self::default();
    }

    pub fn scroll_by(&mut self, delta: isize) {
        let max = self.lines.len().saturating_sub(1);
        self.scroll = self.scroll.saturating_add_signed(delta).min(max);
    }
}

/// Report browser state
#[derive(Debug, Default)]
pub struct ReportsState {
    pub index: Option<ReportIndex>,
    pub barcode: String,
    pub selected: usize,
    pub content: String,
    /// First visible line of `content`
    pub scroll: u16,
    /// Shown in place of the list when there is nothing to pick
    pub placeholder: Option<String>,
}

impl ReportsState {
    pub fn matches(&self) -> Vec<&str> {
        self.index
            .as_ref()
            .map(|index| index.filter(&self.barcode))
            .unwrap_or_default()
    }

    fn refresh_placeholder(&mut self) {
        let placeholder = match &self.index {
            None => self.placeholder.clone(),
            Some(index) if index.is_empty() => Some("No reports available.".to_string()),
            Some(_) if self.matches().is_empty() => Some("No matching reports.".to_string()),
            Some(_) => None,
        };
        self.placeholder = placeholder;
        self.selected = self.selected.min(self.matches().len().saturating_sub(1));
    }
}

/// Main application state
pub struct App {
    pub should_quit: bool,
    pub view: View,
    pub config: Config,
    /// Where preference changes are saved
    pub config_path: PathBuf,
    pub workspace: PathBuf,
    pub scripts_dir: PathBuf,
    pub reports_dir: PathBuf,

    // Launcher state
    pub scripts: Vec<String>,
    pub selected_script: usize,
    pub output: OutputSink,
    /// Lines scrolled back from the bottom of the output pane
    pub output_scroll_back: usize,
    pub current_run: Option<ScriptRun>,

    pub editor: EditorState,
    pub reports: ReportsState,

    // Status
    pub status_message: Option<String>,
    pub status_timestamp: Instant,
    /// Outcome of the startup update phase
    pub update_summary: Option<String>,

    runner: ProcessRunner,
}

impl App {
    pub fn new(workspace: PathBuf, config: Config, update_summary: Option<String>) -> Self {
        let scripts_dir = workspace.join(&config.scripts.dir);
        let reports_dir = workspace.join(&config.reports.dir);

        let mut app = Self {
            should_quit: false,
            view: View::TextEditor,
            config,
            config_path: Config::default_path(),
            workspace,
            scripts_dir,
            reports_dir,

            scripts: Vec::new(),
            selected_script: 0,
            output: OutputSink::new(),
            output_scroll_back: 0,
            current_run: None,

            editor: EditorState::default(),
            reports: ReportsState::default(),

            status_message: None,
            status_timestamp: Instant::now(),
            update_summary,

            runner: ProcessRunner::new(),
        };
        app.load_scripts();
        app.load_reports();
        app
    }

    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = path;
        self
    }

    /// Handle tick events
    pub fn on_tick(&mut self) {
        while let Some(event) = self.runner.try_next_event() {
            self.handle_runner_event(event);
        }

        let expired = self.status_timestamp.elapsed() > Duration::from_secs(5);
        if self.status_message.is_some() && expired {
            self.status_message = None;
        }
    }

    /// Apply one runner event to the output pane and run status
    pub fn handle_runner_event(&mut self, event: RunnerEvent) {
        let Some(run) = self.current_run.as_mut().filter(|r| r.id == event.run_id()) else {
            warn!(run = %event.run_id(), "event for unknown run");
            return;
        };

        match event {
            RunnerEvent::Started { pid, .. } => {
                run.status = RunStatus::Running;
                run.pid = pid;
            }
            RunnerEvent::Output { event, .. } => {
                self.output.append(&event);
            }
            RunnerEvent::Exited { report, .. } => {
                self.output.flush();
                self.output.note("");
                self.output.note(&report.summary());
                let message = format!("{}: {}", run.script, report.summary());
                run.finish(report);
                self.set_status(message);
            }
        }
    }

    /// Handle key events
    pub fn on_key(&mut self, key: KeyEvent) -> Result<()> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            if let KeyCode::Char('c') | KeyCode::Char('q') = key.code {
                self.should_quit = true;
                return Ok(());
            }
        }

        if let Some(view) = View::from_key(key.code) {
            self.switch_view(view);
            return Ok(());
        }
        if key.code == KeyCode::Tab {
            self.switch_view(self.view.next());
            return Ok(());
        }

        match self.view {
            View::TextEditor => self.handle_editor_key(key),
            View::TestLauncher => self.handle_launcher_key(key)?,
            View::TestReports => self.handle_reports_key(key),
        }
        Ok(())
    }

    pub fn switch_view(&mut self, view: View) {
        // Runs write new reports during the session
        if view == View::TestReports && self.view != View::TestReports {
            self.load_reports();
        }
        self.view = view;
    }

    fn handle_editor_key(&mut self, key: KeyEvent) {
        if self.editor.path.is_some() {
            match key.code {
                KeyCode::Esc => self.editor.close(),
                KeyCode::Up => self.editor.scroll_by(-1),
                KeyCode::Down => self.editor.scroll_by(1),
                KeyCode::PageUp => self.editor.scroll_by(-20),
                KeyCode::PageDown => self.editor.scroll_by(20),
                KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    if let Some(path) = self.editor.path.clone() {
                        self.open_in_editor(&path);
                    }
                }
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Up => self.select_script(-1),
            KeyCode::Down => self.select_script(1),
            KeyCode::Enter => {
                if let Some(name) = self.scripts.get(self.selected_script) {
                    let path = self.scripts_dir.join(name);
                    self.open_in_editor(&path);
                }
            }
            _ => {}
        }
    }

    fn open_in_editor(&mut self, path: &Path) {
        if let Err(e) = self.editor.open(path) {
            self.set_status(format!("Cannot open {}: {}", path.display(), e));
        }
    }

    fn handle_launcher_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Up => self.select_script(-1),
            KeyCode::Down => self.select_script(1),
            KeyCode::Enter => self.run_selected_script(),
            KeyCode::Char('x') => self.cancel_run(),
            KeyCode::Char('c') => {
                self.output.clear();
                self.output_scroll_back = 0;
            }
            KeyCode::Char('r') => {
                self.load_scripts();
                self.set_status(format!("{} test script(s) found", self.scripts.len()));
            }
            KeyCode::Char('t') => self.toggle_timestamps(),
            KeyCode::Char('y') => {
                if let Err(e) = self.copy_output() {
                    self.set_status(e.to_string());
                }
            }
            KeyCode::PageUp => {
                self.output_scroll_back = (self.output_scroll_back + 10).min(self.output.len());
            }
            KeyCode::PageDown => {
                self.output_scroll_back = self.output_scroll_back.saturating_sub(10);
            }
            KeyCode::End => self.output_scroll_back = 0,
            _ => {}
        }
        Ok(())
    }

    fn handle_reports_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up => self.reports.selected = self.reports.selected.saturating_sub(1),
            KeyCode::Down => {
                let last = self.reports.matches().len().saturating_sub(1);
                self.reports.selected = (self.reports.selected + 1).min(last);
            }
            KeyCode::Enter => self.load_selected_report(),
            KeyCode::PageUp => self.reports.scroll = self.reports.scroll.saturating_sub(10),
            KeyCode::PageDown => self.reports.scroll = self.reports.scroll.saturating_add(10),
            KeyCode::Backspace => {
                self.reports.barcode.pop();
                self.load_reports();
            }
            KeyCode::Esc => {
                self.reports.barcode.clear();
                self.load_reports();
            }
            KeyCode::Char(c) => {
                self.reports.barcode.push(c);
                self.reports.selected = 0;
                self.load_reports();
            }
            _ => {}
        }
    }

    fn select_script(&mut self, delta: isize) {
        let last = self.scripts.len().saturating_sub(1);
        self.selected_script = self.selected_script.saturating_add_signed(delta).min(last);
    }

    // === Script execution ===

    /// Start the selected script; refused while another one is running
    pub fn run_selected_script(&mut self) {
        let Some(name) = self.scripts.get(self.selected_script).cloned() else {
            self.set_status("No test script selected".to_string());
            return;
        };
        if self.runner.is_busy() {
            self.set_status("A test is already running. Press x to cancel it first.".to_string());
            return;
        }

        let interpreter = &self.config.scripts.interpreter;
        let invocation = ScriptInvocation::for_script(interpreter, &self.scripts_dir, &name);
        let script_path = self.scripts_dir.join(&name);

        match self.runner.run(invocation.clone()) {
            Ok(id) => {
                info!(run = %id, script = %name, "running test");
                self.output.clear();
                self.output_scroll_back = 0;
                self.output.note(&format!("Running test: {}", script_path.display()));
                self.output.note("");
                self.current_run = Some(ScriptRun::new(id, name, invocation));
            }
            Err(e) => self.set_status(e.to_string()),
        }
    }

    pub fn cancel_run(&mut self) {
        match self.runner.cancel() {
            Ok(_) => self.set_status("Cancelling test...".to_string()),
            Err(e) => self.set_status(e.to_string()),
        }
    }

    /// Flip the output timestamp preference and persist it
    pub fn toggle_timestamps(&mut self) {
        let ui = &mut self.config.ui;
        ui.show_timestamps = !ui.show_timestamps;
        let state = if ui.show_timestamps { "shown" } else { "hidden" };
        match self.config.save(Some(self.config_path.clone())) {
            Ok(()) => self.set_status(format!("Timestamps {state}")),
            Err(e) => self.set_status(format!("Timestamps {state}, not saved: {e:#}")),
        }
    }

    pub fn is_running(&self) -> bool {
        self.runner.is_busy()
    }

    fn copy_output(&mut self) -> Result<()> {
        use arboard::Clipboard;

        let text = self.output.to_text(self.config.ui.show_timestamps);
        let mut clipboard = Clipboard::new()
            .map_err(|e| anyhow::anyhow!("Failed to access clipboard: {}", e))?;
        clipboard
            .set_text(text)
            .map_err(|e| anyhow::anyhow!("Failed to copy to clipboard: {}", e))?;

        self.set_status(format!("Copied {} lines to clipboard", self.output.len()));
        Ok(())
    }

    // === Collaborator data ===

    pub fn load_scripts(&mut self) {
        let scripts = &self.config.scripts;
        match list_scripts(&self.scripts_dir, &scripts.extension, &scripts.exclude) {
            Ok(found) => self.scripts = found,
            Err(e) => {
                self.scripts.clear();
                self.set_status(format!("Directory Not Found: {e}"));
            }
        }
        self.selected_script = self.selected_script.min(self.scripts.len().saturating_sub(1));
    }

    pub fn load_reports(&mut self) {
        match ReportIndex::scan(&self.reports_dir) {
            Ok(index) => {
                self.reports.index = Some(index);
                self.reports.placeholder = None;
            }
            Err(e) => {
                self.reports.index = None;
                self.reports.placeholder = Some(e.to_string());
            }
        }
        self.reports.refresh_placeholder();
    }

    fn load_selected_report(&mut self) {
        let Some(name) = self.reports.matches().get(self.reports.selected).map(|s| s.to_string())
        else {
            return;
        };
        let Some(index) = &self.reports.index else {
            return;
        };
        self.reports.scroll = 0;
        self.reports.content = match index.load(&name) {
            Ok(content) => content,
            Err(e) => format!("Error loading report: {e:#}"),
        };
    }

    pub fn set_status(&mut self, message: String) {
        self.status_message = Some(message);
        self.status_timestamp = Instant::now();
    }

    /// Stop a running test before quitting and wait briefly for its report
    pub async fn cleanup(&mut self) {
        if self.runner.cancel().is_err() {
            return;
        }
        let drained = tokio::time::timeout(Duration::from_secs(3), async {
            while let Some(event) = self.runner.next_event().await {
                let done = matches!(event, RunnerEvent::Exited { .. });
                self.handle_runner_event(event);
                if done {
                    break;
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!("test did not exit after cancel");
        }
    }

    /// Wait for the next runner event (used by tests and shutdown)
    pub async fn pump_runner_event(&mut self) -> bool {
        match self.runner.next_event().await {
            Some(event) => {
                let exited = matches!(event, RunnerEvent::Exited { .. });
                self.handle_runner_event(event);
                exited
            }
            None => false,
        }
    }
}
