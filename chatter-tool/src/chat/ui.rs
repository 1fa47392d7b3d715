use chatter_core::{Connectivity, ThemeColor, ViewState};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use super::app::ChatApp;
use crate::display;

fn background(theme: ThemeColor) -> Color {
    Color::Rgb(theme.r, theme.g, theme.b)
}

fn foreground(theme: ThemeColor) -> Color {
    if theme.is_light() {
        Color::Black
    } else {
        Color::White
    }
}

pub fn render(frame: &mut Frame, app: &ChatApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(1),    // Messages
            Constraint::Length(3), // Input
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);
    render_messages(frame, app, chunks[1]);
    render_input(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);
}

fn render_header(frame: &mut Frame, app: &ChatApp, area: Rect) {
    let theme = app.session.theme_color;
    let connectivity = match app.connectivity() {
        Connectivity::Online => "online",
        Connectivity::Offline => "offline",
        Connectivity::Unknown => "checking connection",
    };

    let title = format!(
        "chatter - {}  [{}, {}]",
        app.session.author.name,
        connectivity,
        app.view.state()
    );

    let header = Paragraph::new(title).style(
        Style::default()
            .bg(background(theme))
            .fg(foreground(theme))
            .add_modifier(Modifier::BOLD),
    );

    frame.render_widget(header, area);
}

fn render_messages(frame: &mut Frame, app: &ChatApp, area: Rect) {
    let theme = app.session.theme_color;
    let base = Style::default().bg(background(theme)).fg(foreground(theme));
    let messages = app.view.messages();
    let mut lines: Vec<Line> = Vec::new();

    // Newest first in the view, oldest at the top on screen.
    for msg in messages.iter().rev() {
        if msg.system {
            lines.push(Line::from(Span::styled(
                format!("  {}", display::describe(msg)),
                base.add_modifier(Modifier::ITALIC),
            )));
            lines.push(Line::from(""));
            continue;
        }

        let own = msg.author.id == app.session.author.id;
        let name_style = if own {
            base.fg(Color::Green)
        } else {
            base.fg(Color::Blue)
        };

        lines.push(Line::from(vec![
            Span::styled(format!("{} ", msg.author.name), name_style.add_modifier(Modifier::BOLD)),
            Span::styled(display::timestamp(msg), base.fg(Color::DarkGray)),
        ]));
        for line in display::describe(msg).lines() {
            lines.push(Line::from(format!("  {}", line)));
        }

        lines.push(Line::from("")); // Empty line between messages
    }

    if app.view.state() == ViewState::Uninitialized {
        lines.push(Line::from(Span::styled(
            "Waiting for connection status...",
            base.fg(Color::Yellow).add_modifier(Modifier::ITALIC),
        )));
    }

    if let Some(ref notice) = app.last_notice {
        lines.push(Line::from(Span::styled(notice.clone(), base.fg(Color::Red))));
    }

    let messages_block = Block::default().borders(Borders::ALL).title("Messages");

    // Calculate scroll offset to show the newest messages
    let visible_height = area.height.saturating_sub(2) as usize; // Account for borders
    let total_lines = lines.len();
    let scroll = if total_lines > visible_height {
        (total_lines - visible_height).saturating_sub(app.messages_scroll as usize)
    } else {
        0
    };

    let paragraph = Paragraph::new(Text::from(lines))
        .style(base)
        .block(messages_block)
        .wrap(Wrap { trim: false })
        .scroll((scroll as u16, 0));

    frame.render_widget(paragraph, area);
}

fn render_input(frame: &mut Frame, app: &ChatApp, area: Rect) {
    let input_block = Block::default().borders(Borders::ALL).title("Input");

    let display_text = if app.input.is_empty() {
        "Type a message, /image PATH or /location".to_string()
    } else {
        app.input.clone()
    };

    let style = if app.input.is_empty() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };

    let input_paragraph = Paragraph::new(display_text).style(style).block(input_block);

    frame.render_widget(input_paragraph, area);

    let cursor_x = area.x + 1 + app.input[..app.cursor_pos].chars().count() as u16;
    frame.set_cursor_position((cursor_x, area.y + 1));
}

fn render_status_bar(frame: &mut Frame, app: &ChatApp, area: Rect) {
    let toggle = match app.connectivity() {
        Connectivity::Online => "F2: Go offline",
        Connectivity::Offline | Connectivity::Unknown => "F2: Go online",
    };
    let status = format!("Enter: Send  {}  Ctrl+↑/↓: Scroll  Esc: Quit", toggle);

    let status_bar = Paragraph::new(status).style(Style::default().fg(Color::DarkGray));

    frame.render_widget(status_bar, area);
}
