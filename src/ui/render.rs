//! Terminal UI rendering with ratatui

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Modifier,
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs, Wrap},
    Frame,
};

use crate::app::{App, Menu, View};
use crate::process::RunStatus;

use super::icons;
use super::theme::{self, Theme};

/// Main draw function
pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(10),   // Main content
            Constraint::Length(1), // Status bar
        ])
        .split(f.area());

    draw_header(f, app, chunks[0]);

    match app.view {
        View::TextEditor => draw_editor(f, app, chunks[1]),
        View::TestLauncher => draw_launcher(f, app, chunks[1]),
        View::TestReports => draw_reports(f, app, chunks[1]),
    }

    draw_status_bar(f, app, chunks[2]);
}

/// Plain bordered block for header cells
fn cell(t: &Theme) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(t.border_type)
        .border_style(t.border())
}

fn block<'a>(t: &Theme, title: Line<'a>, focused: bool) -> Block<'a> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(if focused { t.border_type_focused } else { t.border_type })
        .border_style(if focused { t.border_focused() } else { t.border() })
}

/// Header with logo, view tabs and the current view's menus
fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let t = theme::current();

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(13), // Logo
            Constraint::Min(40),    // Views
            Constraint::Length(24), // Menus
            Constraint::Length(12), // Time
        ])
        .split(area);

    let logo = Paragraph::new(Span::styled("benchterm", t.title()))
        .block(cell(&t))
        .alignment(Alignment::Center);
    f.render_widget(logo, chunks[0]);

    // The View menu's entries double as the tab strip
    let titles: Vec<Line> = Menu::View
        .entries()
        .into_iter()
        .map(|(key, label)| {
            Line::from(vec![
                Span::styled(format!("{key} "), t.text_dim()),
                Span::raw(label),
            ])
        })
        .collect();
    let selected = View::all().iter().position(|v| *v == app.view).unwrap_or(0);
    let tabs = Tabs::new(titles)
        .select(selected)
        .style(t.text_muted())
        .highlight_style(t.tab_highlight())
        .block(cell(&t));
    f.render_widget(tabs, chunks[1]);

    let menus: Vec<Span> = app
        .view
        .menus()
        .iter()
        .flat_map(|m| [Span::styled(m.label(), t.primary()), Span::raw("  ")])
        .collect();
    let menu_bar = Paragraph::new(Line::from(menus))
        .block(cell(&t))
        .alignment(Alignment::Center);
    f.render_widget(menu_bar, chunks[2]);

    let time = chrono::Local::now().format("%H:%M:%S").to_string();
    let time_widget = Paragraph::new(time)
        .style(t.text())
        .block(cell(&t))
        .alignment(Alignment::Center);
    f.render_widget(time_widget, chunks[3]);
}

fn script_list<'a>(
    app: &'a App,
    t: &Theme,
    title: &'a str,
    focused: bool,
) -> (List<'a>, ListState) {
    let icons = icons::current();
    let items: Vec<ListItem> = if app.scripts.is_empty() {
        vec![ListItem::new(Span::styled(
            format!("No scripts in {}", app.scripts_dir.display()),
            t.text_dim(),
        ))]
    } else {
        app.scripts
            .iter()
            .map(|name| {
                ListItem::new(Line::from(vec![
                    Span::styled(format!("{} ", icons.script), t.text_dim()),
                    Span::styled(name.as_str(), t.text()),
                ]))
            })
            .collect()
    };

    let mut state = ListState::default();
    if !app.scripts.is_empty() {
        state.select(Some(app.selected_script));
    }

    let list = List::new(items)
        .block(block(
            t,
            Line::from(vec![
                Span::styled(format!(" {} ", title), t.title()),
                Span::styled(format!("({}) ", app.scripts.len()), t.text_muted()),
            ]),
            focused,
        ))
        .highlight_style(t.list_highlight())
        .highlight_symbol(icons.highlight);
    (list, state)
}

fn draw_editor(f: &mut Frame, app: &App, area: Rect) {
    let t = theme::current();

    let Some(path) = &app.editor.path else {
        let (list, mut state) = script_list(app, &t, "Open Script", true);
        f.render_stateful_widget(list, area, &mut state);
        return;
    };

    let width = app.editor.lines.len().to_string().len();
    let lines: Vec<Line> = app
        .editor
        .lines
        .iter()
        .enumerate()
        .skip(app.editor.scroll)
        .take(area.height.saturating_sub(2) as usize)
        .map(|(i, line)| {
            Line::from(vec![
                Span::styled(format!("{:>width$} ", i + 1), t.text_dim()),
                Span::styled(line.as_str(), t.text()),
            ])
        })
        .collect();

    let title = Line::from(vec![
        Span::styled(format!(" {} ", path.display()), t.title()),
        Span::styled("[read-only] ", t.text_muted()),
    ]);
    f.render_widget(Paragraph::new(lines).block(block(&t, title, true)), area);
}

fn draw_launcher(f: &mut Frame, app: &App, area: Rect) {
    let t = theme::current();
    let icons = icons::current();

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(area);

    let (list, mut state) = script_list(app, &t, "Test Scripts", true);
    f.render_stateful_widget(list, chunks[0], &mut state);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(5)])
        .split(chunks[1]);

    let info_lines = match &app.current_run {
        Some(run) => {
            let style = match &run.status {
                RunStatus::Starting => t.warning(),
                RunStatus::Running => t.primary(),
                RunStatus::Finished(report) if report.is_success() => t.success(),
                RunStatus::Finished(_) => t.error(),
            };
            let pid = run.pid.map(|p| format!(" (PID: {p})")).unwrap_or_default();
            vec![
                Line::from(vec![
                    Span::styled(" Command: ", t.text_muted()),
                    Span::styled(run.invocation.command_line(), t.text()),
                ]),
                Line::from(vec![
                    Span::styled(" Status: ", t.text_muted()),
                    Span::styled(
                        format!("{} {}{}", icons.status_icon(&run.status), run.status, pid),
                        style,
                    ),
                    Span::styled(format!("  {}", run.elapsed()), t.text_dim()),
                ]),
            ]
        }
        None => vec![Line::styled(
            " No test run yet. Press Enter to run the selected script.",
            t.text_dim(),
        )],
    };
    f.render_widget(
        Paragraph::new(info_lines).block(block(&t, Line::styled(" Run ", t.title()), false)),
        right[0],
    );

    draw_output(f, app, &t, right[1]);
}

/// Output pane pinned to the bottom unless scrolled back
fn draw_output(f: &mut Frame, app: &App, t: &Theme, area: Rect) {
    let height = area.height.saturating_sub(2) as usize;
    let total = app.output.len();
    let end = total.saturating_sub(app.output_scroll_back);
    let start = end.saturating_sub(height);

    let show_timestamps = app.config.ui.show_timestamps;
    let lines: Vec<Line> = app
        .output
        .lines_range(start, end - start)
        .into_iter()
        .map(|line| {
            let style = t.output_line(line.source);
            if show_timestamps {
                Line::from(vec![
                    Span::styled(line.timestamp.format("%H:%M:%S ").to_string(), t.text_dim()),
                    Span::styled(line.content.as_str(), style),
                ])
            } else {
                Line::styled(line.content.as_str(), style)
            }
        })
        .collect();

    let mut title = vec![
        Span::styled(" Output ", t.title()),
        Span::styled(format!("({} lines) ", total), t.text_muted()),
    ];
    if app.output_scroll_back > 0 {
        title.push(Span::styled(
            format!("[-{}] ", app.output_scroll_back),
            t.warning(),
        ));
    }

    f.render_widget(
        Paragraph::new(lines).block(block(t, Line::from(title), false)),
        area,
    );
}

fn draw_reports(f: &mut Frame, app: &App, area: Rect) {
    let t = theme::current();
    let icons = icons::current();

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(area);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(chunks[0]);

    let barcode = Paragraph::new(Line::from(vec![
        Span::styled(app.reports.barcode.as_str(), t.input_focused()),
        Span::styled("┃", t.primary()),
    ]))
    .block(block(&t, Line::styled(" Barcode ", t.title()), true));
    f.render_widget(barcode, left[0]);

    let matches = app.reports.matches();
    let list_title = Line::from(vec![
        Span::styled(format!(" {} Reports ", icons.report), t.title()),
        Span::styled(format!("({}) ", matches.len()), t.text_muted()),
    ]);
    match &app.reports.placeholder {
        Some(placeholder) => {
            let text = Paragraph::new(Span::styled(placeholder.as_str(), t.text_dim()))
                .block(block(&t, list_title, false));
            f.render_widget(text, left[1]);
        }
        None => {
            let items: Vec<ListItem> = matches
                .iter()
                .map(|name| ListItem::new(Span::styled(*name, t.text())))
                .collect();
            let mut state = ListState::default();
            state.select(Some(app.reports.selected));
            let list = List::new(items)
                .block(block(&t, list_title, false))
                .highlight_style(t.list_highlight())
                .highlight_symbol(icons.highlight);
            f.render_stateful_widget(list, left[1], &mut state);
        }
    }

    let content = if app.reports.content.is_empty() {
        Text::styled("Select a report and press Enter to view it.", t.text_dim())
    } else {
        Text::styled(app.reports.content.as_str(), t.text())
    };
    let viewer = Paragraph::new(content)
        .block(block(&t, Line::styled(" Report ", t.title()), false))
        .wrap(Wrap { trim: false })
        .scroll((app.reports.scroll, 0));
    f.render_widget(viewer, chunks[1]);
}

fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let t = theme::current();
    let icons = icons::current();

    let mut spans = vec![Span::styled(
        format!(" {} ", app.view.label()),
        t.primary().add_modifier(Modifier::BOLD),
    )];
    spans.push(Span::styled(format!("{} ", icons.separator), t.text_dim()));

    if let Some(message) = &app.status_message {
        spans.push(Span::styled(message.as_str(), t.text()));
    } else {
        match app.view {
            View::TextEditor => {
                for (key, action) in Menu::File.entries() {
                    spans.push(Span::styled(format!("{key} "), t.primary()));
                    spans.push(Span::styled(format!("{action}  "), t.text_muted()));
                }
                spans.push(Span::styled("PgUp/PgDn scroll", t.text_muted()));
            }
            View::TestLauncher => spans.push(Span::styled(
                "Enter run  x cancel  c clear  r rescan  t timestamps  y copy  Ctrl+Q quit",
                t.text_muted(),
            )),
            View::TestReports => spans.push(Span::styled(
                "type barcode  Enter load  PgUp/PgDn scroll  Esc clear filter",
                t.text_muted(),
            )),
        }
    }

    if let Some(summary) = &app.update_summary {
        spans.push(Span::styled(format!("  {} {}", icons.update, summary), t.text_dim()));
    }

    f.render_widget(
        Paragraph::new(Line::from(spans)).style(t.status_bar()),
        area,
    );
}
