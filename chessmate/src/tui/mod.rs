// TUI: view state, layout, input handling, and widget rendering.
//
// The TUI owns a `ViewState` that mirrors the synchronized game state. The
// app event loop pushes `UiUpdate` messages over an mpsc channel; the TUI
// applies them to `ViewState` and re-renders at ~30 fps. Commands flow back
// through the `UserCommand` channel; the TUI never touches shared state
// directly.

pub mod input;
pub mod widgets;

use std::time::Duration;

use crossterm::event::{Event, EventStream};
use futures_util::StreamExt;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::Frame;
use tokio::sync::mpsc;

use crate::board::{BoardGrid, Square, INITIAL_FEN};
use crate::protocol::{ActionKind, ConnectionStatus, UiUpdate, UserCommand};
use crate::state::GameState;

// ---------------------------------------------------------------------------
// ViewState
// ---------------------------------------------------------------------------

/// TUI-local state that mirrors the synchronized game state for rendering.
pub struct ViewState {
    /// Latest game snapshot from the app event loop.
    pub game: GameState,
    /// Decoded grid for the current position; `None` after a decode failure.
    pub grid: Option<BoardGrid>,
    /// Set when the current position failed to decode. Fatal for rendering:
    /// the board stays blank until a fresh valid snapshot arrives.
    pub decode_error: Option<String>,
    pub connection: ConnectionStatus,
    /// Which request kind is in flight, if any.
    pub busy: Option<ActionKind>,
    /// Transient message line (rejected action, failed request).
    pub notice: Option<String>,
    pub difficulty: u8,
    /// Board cursor.
    pub cursor: Square,
    /// Selected origin square for the next move.
    pub selected: Option<Square>,
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState {
            game: GameState::default(),
            grid: BoardGrid::decode(INITIAL_FEN).ok(),
            decode_error: None,
            connection: ConnectionStatus::Disconnected,
            busy: None,
            notice: None,
            difficulty: 5,
            cursor: Square { file: 4, rank: 1 },
            selected: None,
        }
    }
}

// ---------------------------------------------------------------------------
// UiUpdate processing
// ---------------------------------------------------------------------------

/// Apply a single UiUpdate to the ViewState.
fn apply_ui_update(view: &mut ViewState, update: UiUpdate) {
    match update {
        UiUpdate::Game(game) => {
            match BoardGrid::decode(&game.position) {
                Ok(grid) => {
                    view.grid = Some(grid);
                    view.decode_error = None;
                    // A fresh snapshot supersedes any stale error line.
                    view.notice = None;
                }
                Err(err) => {
                    view.grid = None;
                    view.decode_error = Some(err.to_string());
                }
            }
            view.game = game;
            view.selected = None;
        }
        UiUpdate::Connection(status) => {
            view.connection = status;
        }
        UiUpdate::Busy(busy) => {
            view.busy = busy;
        }
        UiUpdate::Notice(message) => {
            view.notice = Some(message);
        }
        UiUpdate::Difficulty(value) => {
            view.difficulty = value;
        }
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

pub struct AppLayout {
    pub status_bar: Rect,
    pub board: Rect,
    pub history: Rect,
    pub help_bar: Rect,
}

pub fn build_layout(area: Rect) -> AppLayout {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(12),
            Constraint::Length(1),
        ])
        .split(area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(30), Constraint::Min(20)])
        .split(rows[1]);

    AppLayout {
        status_bar: rows[0],
        board: columns[0],
        history: columns[1],
        help_bar: rows[2],
    }
}

// ---------------------------------------------------------------------------
// Render frame
// ---------------------------------------------------------------------------

fn render_frame(frame: &mut Frame, view: &ViewState) {
    let layout = build_layout(frame.area());

    widgets::status_bar::render(frame, layout.status_bar, view);
    widgets::board::render(frame, layout.board, view);
    widgets::history::render(frame, layout.history, view);
    widgets::status_bar::render_help(frame, layout.help_bar);
}

// ---------------------------------------------------------------------------
// Main TUI loop
// ---------------------------------------------------------------------------

/// Run the TUI event loop.
///
/// 1. Initializes the terminal (raw mode, alternate screen).
/// 2. Installs a panic hook that restores the terminal on crash.
/// 3. Runs an async select loop over UI updates, keyboard input, and render
///    ticks.
/// 4. Restores the terminal on clean exit.
pub async fn run(
    mut ui_rx: mpsc::Receiver<UiUpdate>,
    cmd_tx: mpsc::Sender<UserCommand>,
) -> anyhow::Result<()> {
    let mut terminal = ratatui::init();

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        ratatui::restore();
        original_hook(panic_info);
    }));

    let mut view = ViewState::default();
    let mut event_stream = EventStream::new();

    let mut render_tick = tokio::time::interval(Duration::from_millis(33));
    render_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            update = ui_rx.recv() => {
                match update {
                    Some(update) => apply_ui_update(&mut view, update),
                    None => break,
                }
            }

            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key_event))) => {
                        if let Some(cmd) = input::handle_key(key_event, &mut view) {
                            let quitting = cmd == UserCommand::Quit;
                            let _ = cmd_tx.send(cmd).await;
                            if quitting {
                                break;
                            }
                        }
                    }
                    Some(Ok(_)) => {
                        // Mouse and resize events need no handling; the next
                        // render tick picks up the new size.
                    }
                    Some(Err(_)) | None => break,
                }
            }

            _ = render_tick.tick() => {
                terminal.draw(|frame| render_frame(frame, &view))?;
            }
        }
    }

    ratatui::restore();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::GameStatus;

    #[test]
    fn view_state_default_is_sensible() {
        let view = ViewState::default();
        assert_eq!(view.game, GameState::default());
        assert!(view.grid.is_some());
        assert!(view.decode_error.is_none());
        assert_eq!(view.connection, ConnectionStatus::Disconnected);
        assert!(view.busy.is_none());
        assert!(view.notice.is_none());
        assert_eq!(view.cursor.to_string(), "e2");
        assert!(view.selected.is_none());
    }

    #[test]
    fn game_update_decodes_the_new_position() {
        let mut view = ViewState::default();
        let game = GameState {
            position: "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1".to_string(),
            status: GameStatus::Ongoing,
            move_history: vec!["e4".to_string()],
            last_move: Some("e2e4".to_string()),
        };
        apply_ui_update(&mut view, UiUpdate::Game(game.clone()));

        assert_eq!(view.game, game);
        let grid = view.grid.as_ref().unwrap();
        let e4 = Square::from_algebraic("e4").unwrap();
        assert!(grid.piece_at(e4).is_some());
    }

    #[test]
    fn malformed_position_is_a_fatal_render_error() {
        let mut view = ViewState::default();
        let game = GameState {
            position: "definitely/not/a/position".to_string(),
            ..GameState::default()
        };
        apply_ui_update(&mut view, UiUpdate::Game(game));

        assert!(view.grid.is_none());
        assert!(view.decode_error.is_some());
    }

    #[test]
    fn game_update_clears_a_stale_notice() {
        let mut view = ViewState::default();
        apply_ui_update(&mut view, UiUpdate::Notice("Illegal move".to_string()));
        assert!(view.notice.is_some());

        apply_ui_update(&mut view, UiUpdate::Game(GameState::default()));
        assert!(view.notice.is_none());
    }

    #[test]
    fn connection_and_busy_updates_apply() {
        let mut view = ViewState::default();
        apply_ui_update(&mut view, UiUpdate::Connection(ConnectionStatus::Connected));
        assert_eq!(view.connection, ConnectionStatus::Connected);

        apply_ui_update(&mut view, UiUpdate::Busy(Some(ActionKind::EngineMove)));
        assert_eq!(view.busy, Some(ActionKind::EngineMove));

        apply_ui_update(&mut view, UiUpdate::Busy(None));
        assert!(view.busy.is_none());
    }
}
