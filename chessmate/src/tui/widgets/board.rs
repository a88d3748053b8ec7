// Board panel: the 8x8 grid with cursor, selection, and last-move marks.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::board::Square;
use crate::tui::ViewState;

const LIGHT_SQUARE: Color = Color::Rgb(181, 136, 99);
const DARK_SQUARE: Color = Color::Rgb(101, 67, 33);
const SELECTED_SQUARE: Color = Color::Cyan;
const LAST_MOVE_SQUARE: Color = Color::Yellow;

pub fn render(frame: &mut Frame, area: Rect, view: &ViewState) {
    let block = Block::default().borders(Borders::ALL).title("Board");

    if let Some(message) = &view.decode_error {
        let paragraph = Paragraph::new(format!("bad position from server:\n{message}"))
            .style(Style::default().fg(Color::Red))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let Some(grid) = &view.grid else {
        frame.render_widget(Paragraph::new("no position").block(block), area);
        return;
    };

    let last_move = last_move_squares(view.game.last_move.as_deref());

    let mut lines = Vec::with_capacity(9);
    for (row, rank_squares) in grid.rows().iter().enumerate() {
        let rank = 7 - row as u8;
        let mut spans = vec![Span::raw(format!("{} ", rank + 1))];
        for (col, piece) in rank_squares.iter().enumerate() {
            let sq = Square {
                file: col as u8,
                rank,
            };
            let cell = match piece {
                Some(piece) => format!(" {} ", piece.glyph()),
                None => "   ".to_string(),
            };

            let bg = if view.selected == Some(sq) {
                SELECTED_SQUARE
            } else if last_move.contains(&Some(sq)) {
                LAST_MOVE_SQUARE
            } else if (row + col) % 2 == 1 {
                DARK_SQUARE
            } else {
                LIGHT_SQUARE
            };
            let mut style = Style::default().bg(bg).fg(Color::Black);
            if view.cursor == sq {
                style = style.add_modifier(Modifier::REVERSED);
            }
            spans.push(Span::styled(cell, style));
        }
        lines.push(Line::from(spans));
    }
    lines.push(Line::from("   a  b  c  d  e  f  g  h"));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// The from/to squares of the last move, when it is a from/to token like
/// `e2e4`. Plain SAN (`Nf3`) yields no marks, which is fine: the next
/// snapshot redraws everything anyway.
fn last_move_squares(last_move: Option<&str>) -> [Option<Square>; 2] {
    let Some(token) = last_move else {
        return [None, None];
    };
    if token.len() < 4 || !token.is_char_boundary(2) || !token.is_char_boundary(4) {
        return [None, None];
    }
    [
        Square::from_algebraic(&token[0..2]),
        Square::from_algebraic(&token[2..4]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_to_tokens_mark_both_squares() {
        let marks = last_move_squares(Some("e2e4"));
        assert_eq!(marks[0], Square::from_algebraic("e2"));
        assert_eq!(marks[1], Square::from_algebraic("e4"));
    }

    #[test]
    fn promotion_tokens_mark_both_squares() {
        let marks = last_move_squares(Some("e7e8q"));
        assert_eq!(marks[0], Square::from_algebraic("e7"));
        assert_eq!(marks[1], Square::from_algebraic("e8"));
    }

    #[test]
    fn san_and_short_tokens_mark_nothing() {
        assert_eq!(last_move_squares(Some("Nf3")), [None, None]);
        assert_eq!(last_move_squares(Some("e4")), [None, None]);
        assert_eq!(last_move_squares(None), [None, None]);
    }
}
