// Move history panel: numbered move pairs, pinned to the latest move.

use ratatui::layout::Rect;
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::tui::ViewState;

pub fn render(frame: &mut Frame, area: Rect, view: &ViewState) {
    let block = Block::default().borders(Borders::ALL).title("Moves");

    let lines = pair_lines(&view.game.move_history);

    // Keep the tail visible when the list outgrows the panel.
    let visible = area.height.saturating_sub(2) as usize;
    let skip = lines.len().saturating_sub(visible);
    let text = lines[skip..].join("\n");

    frame.render_widget(Paragraph::new(text).block(block), area);
}

/// Group the flat move list into `1. e4 e5` pairs.
fn pair_lines(history: &[String]) -> Vec<String> {
    history
        .chunks(2)
        .enumerate()
        .map(|(index, pair)| match pair {
            [white, black] => format!("{}. {} {}", index + 1, white, black),
            [white] => format!("{}. {}", index + 1, white),
            _ => String::new(),
        })
        .collect()
}
