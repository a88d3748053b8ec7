// Status and help bars.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::protocol::ConnectionStatus;
use crate::tui::ViewState;

pub fn render(frame: &mut Frame, area: Rect, view: &ViewState) {
    let (conn_text, conn_color) = match view.connection {
        ConnectionStatus::Connected => ("connected", Color::Green),
        ConnectionStatus::Connecting => ("connecting...", Color::Yellow),
        ConnectionStatus::Disconnected => ("disconnected", Color::DarkGray),
        ConnectionStatus::Lost => ("connection lost (press c)", Color::Red),
    };

    let mut spans = vec![
        Span::styled(
            format!(" {conn_text} "),
            Style::default().fg(conn_color).add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("| {} ", view.game.status.label())),
        Span::raw(format!("| difficulty {} ", view.difficulty)),
    ];

    if let Some(kind) = view.busy {
        spans.push(Span::styled(
            format!("| {}... ", kind.label()),
            Style::default().fg(Color::Yellow),
        ));
    }

    if let Some(notice) = &view.notice {
        spans.push(Span::styled(
            format!("| {notice} "),
            Style::default().fg(Color::Red),
        ));
    }

    let paragraph =
        Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}

pub fn render_help(frame: &mut Frame, area: Rect) {
    let help = " arrows move | enter select | n new game | u undo | e engine | s sync | +/- difficulty | c/d connect | q quit";
    let paragraph = Paragraph::new(Line::from(Span::styled(
        help,
        Style::default().fg(Color::White).add_modifier(Modifier::DIM),
    )))
    .style(Style::default().bg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}
