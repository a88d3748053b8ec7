// Keyboard input handling.
//
// Translates crossterm key events into UserCommand messages for the app
// event loop, or into local ViewState mutations (cursor movement, square
// selection). Selection is a view concern: the app layer only ever sees
// complete from/to move commands.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::board::Square;
use crate::protocol::UserCommand;

use super::ViewState;

/// Handle a keyboard event.
///
/// Returns `Some(UserCommand)` when the key press should be forwarded to
/// the app event loop. Returns `None` when the key was handled locally by
/// mutating `ViewState` or meant nothing.
pub fn handle_key(key_event: KeyEvent, view: &mut ViewState) -> Option<UserCommand> {
    // On Windows, crossterm emits both Press and Release events for each
    // physical keypress; ignoring non-Press events prevents double-processing.
    if key_event.kind != KeyEventKind::Press {
        return None;
    }

    // Ctrl+C always quits.
    if key_event.modifiers.contains(KeyModifiers::CONTROL)
        && key_event.code == KeyCode::Char('c')
    {
        return Some(UserCommand::Quit);
    }

    match key_event.code {
        KeyCode::Char('q') => Some(UserCommand::Quit),

        // Cursor movement.
        KeyCode::Left | KeyCode::Char('h') => {
            move_cursor(view, -1, 0);
            None
        }
        KeyCode::Right | KeyCode::Char('l') => {
            move_cursor(view, 1, 0);
            None
        }
        KeyCode::Up | KeyCode::Char('k') => {
            move_cursor(view, 0, 1);
            None
        }
        KeyCode::Down | KeyCode::Char('j') => {
            move_cursor(view, 0, -1);
            None
        }

        // Select a piece / issue a move.
        KeyCode::Enter | KeyCode::Char(' ') => select_or_move(view),
        KeyCode::Esc => {
            view.selected = None;
            None
        }

        // Game actions.
        KeyCode::Char('n') => Some(UserCommand::NewGame),
        KeyCode::Char('u') => Some(UserCommand::Undo),
        KeyCode::Char('e') => Some(UserCommand::EngineMove),
        KeyCode::Char('s') => Some(UserCommand::Sync),

        // Connection control.
        KeyCode::Char('c') => Some(UserCommand::Connect),
        KeyCode::Char('d') => Some(UserCommand::Disconnect),

        // Engine difficulty dial. The app layer clamps and echoes back.
        KeyCode::Char('+') | KeyCode::Char('=') => {
            Some(UserCommand::SetDifficulty(view.difficulty.saturating_add(1)))
        }
        KeyCode::Char('-') => Some(UserCommand::SetDifficulty(view.difficulty.saturating_sub(1))),

        _ => None,
    }
}

fn move_cursor(view: &mut ViewState, dfile: i8, drank: i8) {
    let file = (view.cursor.file as i8 + dfile).clamp(0, 7) as u8;
    let rank = (view.cursor.rank as i8 + drank).clamp(0, 7) as u8;
    if let Some(sq) = Square::new(file, rank) {
        view.cursor = sq;
    }
}

fn select_or_move(view: &mut ViewState) -> Option<UserCommand> {
    match view.selected {
        Some(from) if from == view.cursor => {
            // Tapping the selected square again deselects it.
            view.selected = None;
            None
        }
        Some(from) => {
            view.selected = None;
            Some(UserCommand::Move {
                from,
                to: view.cursor,
            })
        }
        None => {
            // Only occupied squares can start a move. Legality is the
            // authority's problem; occupancy just avoids pointless requests.
            let occupied = view
                .grid
                .as_ref()
                .is_some_and(|grid| grid.piece_at(view.cursor).is_some());
            if occupied {
                view.selected = Some(view.cursor);
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEvent;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn view() -> ViewState {
        ViewState::default()
    }

    #[test]
    fn q_and_ctrl_c_quit() {
        let mut v = view();
        assert_eq!(
            handle_key(press(KeyCode::Char('q')), &mut v),
            Some(UserCommand::Quit)
        );
        assert_eq!(
            handle_key(
                KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
                &mut v
            ),
            Some(UserCommand::Quit)
        );
    }

    #[test]
    fn plain_c_connects_rather_than_quits() {
        let mut v = view();
        assert_eq!(
            handle_key(press(KeyCode::Char('c')), &mut v),
            Some(UserCommand::Connect)
        );
    }

    #[test]
    fn arrows_move_the_cursor_within_the_board() {
        let mut v = view();
        v.cursor = Square::from_algebraic("a1").unwrap();

        handle_key(press(KeyCode::Left), &mut v);
        assert_eq!(v.cursor.to_string(), "a1");

        handle_key(press(KeyCode::Right), &mut v);
        assert_eq!(v.cursor.to_string(), "b1");

        handle_key(press(KeyCode::Up), &mut v);
        assert_eq!(v.cursor.to_string(), "b2");

        handle_key(press(KeyCode::Down), &mut v);
        assert_eq!(v.cursor.to_string(), "b1");
    }

    #[test]
    fn selecting_an_occupied_square_then_a_target_issues_a_move() {
        let mut v = view();
        // The default view decodes the initial position.
        v.cursor = Square::from_algebraic("e2").unwrap();

        assert_eq!(handle_key(press(KeyCode::Enter), &mut v), None);
        assert_eq!(v.selected, Square::from_algebraic("e2"));

        v.cursor = Square::from_algebraic("e4").unwrap();
        let cmd = handle_key(press(KeyCode::Enter), &mut v);
        assert_eq!(
            cmd,
            Some(UserCommand::Move {
                from: Square::from_algebraic("e2").unwrap(),
                to: Square::from_algebraic("e4").unwrap(),
            })
        );
        assert_eq!(v.selected, None);
    }

    #[test]
    fn empty_squares_cannot_start_a_move() {
        let mut v = view();
        v.cursor = Square::from_algebraic("e4").unwrap();
        assert_eq!(handle_key(press(KeyCode::Enter), &mut v), None);
        assert_eq!(v.selected, None);
    }

    #[test]
    fn reselecting_the_same_square_deselects() {
        let mut v = view();
        v.cursor = Square::from_algebraic("e2").unwrap();
        handle_key(press(KeyCode::Enter), &mut v);
        assert_eq!(v.selected, Square::from_algebraic("e2"));

        handle_key(press(KeyCode::Enter), &mut v);
        assert_eq!(v.selected, None);
    }

    #[test]
    fn escape_clears_the_selection() {
        let mut v = view();
        v.cursor = Square::from_algebraic("d2").unwrap();
        handle_key(press(KeyCode::Enter), &mut v);
        assert!(v.selected.is_some());

        handle_key(press(KeyCode::Esc), &mut v);
        assert_eq!(v.selected, None);
    }

    #[test]
    fn action_keys_map_to_commands() {
        let mut v = view();
        assert_eq!(
            handle_key(press(KeyCode::Char('n')), &mut v),
            Some(UserCommand::NewGame)
        );
        assert_eq!(
            handle_key(press(KeyCode::Char('u')), &mut v),
            Some(UserCommand::Undo)
        );
        assert_eq!(
            handle_key(press(KeyCode::Char('e')), &mut v),
            Some(UserCommand::EngineMove)
        );
        assert_eq!(
            handle_key(press(KeyCode::Char('s')), &mut v),
            Some(UserCommand::Sync)
        );
        assert_eq!(
            handle_key(press(KeyCode::Char('d')), &mut v),
            Some(UserCommand::Disconnect)
        );
    }

    #[test]
    fn difficulty_keys_adjust_around_current_value() {
        let mut v = view();
        v.difficulty = 5;
        assert_eq!(
            handle_key(press(KeyCode::Char('+')), &mut v),
            Some(UserCommand::SetDifficulty(6))
        );
        assert_eq!(
            handle_key(press(KeyCode::Char('-')), &mut v),
            Some(UserCommand::SetDifficulty(4))
        );
    }
}
