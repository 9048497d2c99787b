//! Rendering of the single TUI screen.
//!
//! ```text
//! ┌ uv runner ─────────────────────────────────────┐
//! │ uv 0.8.19 | ready | theme: auto                │
//! ├ Scripts ───────┬ Output ───────────────────────┤
//! │ > oneshot.py   │ Starting script execution...  │
//! │   main.py      │ ...                           │
//! ├ Script URL/Path ───────────────────────────────┤
//! └────────────────────────────────────────────────┘
//!  status line
//! ```

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Position, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::app::{App, InitState, InputMode, StatusKind};
use crate::state::display_name;
use crate::theme::Theme;

/// Renders the whole screen.
pub fn render(app: &App, frame: &mut Frame) {
    let chunks = Layout::vertical([
        Constraint::Length(3), // Header
        Constraint::Min(5),    // Scripts and output
        Constraint::Length(3), // Input line
        Constraint::Length(1), // Status
    ])
    .split(frame.area());

    let body = Layout::horizontal([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(chunks[1]);

    render_header(frame, chunks[0], app);
    render_scripts(frame, body[0], app);
    render_output(frame, body[1], app);
    render_input(frame, chunks[2], app);
    render_status(frame, chunks[3], app);
}

fn bordered<'a>(title: &'a str, theme: &Theme) -> Block<'a> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border))
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let theme = app.theme();
    let (state, state_color) = match app.init_state() {
        InitState::NotStarted | InitState::InProgress => ("initializing", theme.warning),
        InitState::Ready(_) if app.is_running() => ("running", theme.highlight),
        InitState::Ready(_) => ("ready", theme.success),
        InitState::Failed => ("unavailable", theme.error),
    };

    let line = Line::from(vec![
        Span::styled(
            format!("uv {}", app.uv_version()),
            Style::default().fg(theme.text).add_modifier(Modifier::BOLD),
        ),
        Span::styled(" | ", Style::default().fg(theme.muted)),
        Span::styled(state, Style::default().fg(state_color)),
        Span::styled(" | ", Style::default().fg(theme.muted)),
        Span::styled(
            format!("theme: {}", app.theme_mode()),
            Style::default().fg(theme.muted),
        ),
    ]);

    frame.render_widget(
        Paragraph::new(line).block(bordered(" uv runner ", theme)),
        area,
    );
}

fn render_scripts(frame: &mut Frame, area: Rect, app: &App) {
    let theme = app.theme();
    let selected = app.scripts().selected();

    let lines: Vec<Line> = if app.scripts().is_empty() {
        vec![Line::from(Span::styled(
            "No scripts. Press 'a' to add one.",
            Style::default().fg(theme.muted),
        ))]
    } else {
        app.scripts()
            .scripts()
            .iter()
            .enumerate()
            .map(|(idx, script)| {
                if Some(idx) == selected {
                    Line::from(Span::styled(
                        format!("> {}", display_name(script)),
                        Style::default()
                            .fg(theme.selected)
                            .add_modifier(Modifier::BOLD),
                    ))
                } else {
                    Line::from(Span::styled(
                        format!("  {}", display_name(script)),
                        Style::default().fg(theme.text),
                    ))
                }
            })
            .collect()
    };

    frame.render_widget(
        Paragraph::new(lines).block(bordered(" Scripts ", theme)),
        area,
    );
}

fn render_output(frame: &mut Frame, area: Rect, app: &App) {
    let theme = app.theme();
    let text = app.output().snapshot();
    let lines: Vec<Line> = text.lines().map(Line::raw).collect();

    let height = usize::from(area.height.saturating_sub(2));
    let scroll = app.scroll();
    let top = scroll.top_line(lines.len(), height);
    let title = if scroll.is_following() {
        " Output "
    } else {
        " Output (scrolled, End to follow) "
    };

    #[allow(clippy::cast_possible_truncation)]
    let offset = top.min(usize::from(u16::MAX)) as u16;
    frame.render_widget(
        Paragraph::new(lines)
            .style(Style::default().fg(theme.text))
            .scroll((offset, 0))
            .block(bordered(title, theme)),
        area,
    );
}

fn render_input(frame: &mut Frame, area: Rect, app: &App) {
    let theme = app.theme();
    let editing = app.input_mode() == InputMode::AddScript;

    let paragraph = if editing {
        Paragraph::new(app.input().text()).style(Style::default().fg(theme.text))
    } else {
        Paragraph::new("Press 'a' to add a script").style(Style::default().fg(theme.muted))
    };
    frame.render_widget(paragraph.block(bordered(" Script URL/Path ", theme)), area);

    if editing {
        // Stays on the last inner column when the text is wider than the box.
        let cursor = u16::try_from(app.input().cursor_display_pos()).unwrap_or(u16::MAX);
        let last_column = area.right().saturating_sub(2).max(area.x);
        let x = area.x.saturating_add(1).saturating_add(cursor).min(last_column);
        frame.set_cursor_position(Position::new(x, area.y.saturating_add(1)));
    }
}

fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let theme = app.theme();
    let (message, kind) = app.status();
    let color = match kind {
        StatusKind::Info => theme.muted,
        StatusKind::Warning => theme.warning,
    };
    frame.render_widget(
        Paragraph::new(message).style(Style::default().fg(color)),
        area,
    );
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyCode, KeyModifiers};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use tokio::runtime::Runtime;
    use uv_runner_core::{OutputSink, RunnerConfig};

    use super::*;

    fn draw(app: &App, width: u16, height: u16) -> String {
        let mut terminal =
            Terminal::new(TestBackend::new(width, height)).expect("Should create terminal");
        terminal
            .draw(|frame| render(app, frame))
            .expect("Should render");
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(ratatui::buffer::Cell::symbol)
            .collect()
    }

    fn app(scripts: &[&str]) -> (App, Runtime) {
        let runtime = Runtime::new().expect("Should create runtime");
        let app = App::new(
            RunnerConfig::default(),
            runtime.handle().clone(),
            scripts.iter().map(ToString::to_string).collect(),
        );
        (app, runtime)
    }

    #[test]
    fn scripts_are_shown_by_last_segment() {
        let (app, _rt) = app(&[
            "https://raw.githubusercontent.com/x/y/main/servers/memory/oneshot.py",
            "./local/main.py",
        ]);
        let screen = draw(&app, 100, 20);
        assert!(screen.contains("> oneshot.py"));
        assert!(screen.contains("  main.py"));
        assert!(!screen.contains("raw.githubusercontent"));
        assert!(screen.contains("uv 0.8.19"));
    }

    #[test]
    fn output_follows_the_tail() {
        let (app, _rt) = app(&[]);
        for i in 0..50 {
            app.output().append(&format!("line-{i:02}\n"));
        }
        let screen = draw(&app, 80, 20);
        assert!(screen.contains("line-49"));
        assert!(!screen.contains("line-00"));
    }

    #[test]
    fn page_up_shows_earlier_output() {
        let (mut app, _rt) = app(&[]);
        for i in 0..50 {
            app.output().append(&format!("line-{i:02}\n"));
        }
        app.handle_key(KeyCode::PageUp, KeyModifiers::NONE);
        let screen = draw(&app, 80, 20);
        assert!(screen.contains("line-39"));
        assert!(!screen.contains("line-49"));
        assert!(screen.contains("scrolled"));
    }

    #[test]
    fn long_input_keeps_cursor_inside_the_box() {
        let (mut app, _rt) = app(&[]);
        app.handle_key(KeyCode::Char('a'), KeyModifiers::NONE);
        for _ in 0..=usize::from(u16::MAX) {
            app.handle_key(KeyCode::Char('x'), KeyModifiers::NONE);
        }

        let mut terminal =
            Terminal::new(TestBackend::new(40, 12)).expect("Should create terminal");
        terminal
            .draw(|frame| render(&app, frame))
            .expect("Should render");
        let cursor = terminal
            .get_cursor_position()
            .expect("Should read cursor position");
        assert_eq!(cursor.x, 38);
    }

    #[test]
    fn short_input_puts_cursor_after_text() {
        let (mut app, _rt) = app(&[]);
        app.handle_key(KeyCode::Char('a'), KeyModifiers::NONE);
        for c in "ab".chars() {
            app.handle_key(KeyCode::Char(c), KeyModifiers::NONE);
        }

        let mut terminal =
            Terminal::new(TestBackend::new(40, 12)).expect("Should create terminal");
        terminal
            .draw(|frame| render(&app, frame))
            .expect("Should render");
        let cursor = terminal
            .get_cursor_position()
            .expect("Should read cursor position");
        assert_eq!(cursor.x, 3);
    }

    #[test]
    fn renders_tiny_terminal_without_panicking() {
        let (mut app, _rt) = app(&["a.py"]);
        app.handle_key(KeyCode::Char('a'), KeyModifiers::NONE);
        app.handle_key(KeyCode::Char('x'), KeyModifiers::NONE);
        let _ = draw(&app, 10, 5);
    }
}
