// Application state and orchestration logic.
//
// The central event loop coordinates three sources: lifecycle events and
// server pushes from the channel task, completion events from dispatched
// action requests, and user commands from the TUI. It owns the shared game
// state; every fold goes through here, so the single-threaded loop
// serializes the two writers (channel pushes and action responses) and the
// store's sequence guard orders them.
//
// Action dispatch keeps at most one request in flight. Issuing a new action
// aborts the previous task and bumps the generation counter; the abort is
// best-effort at the transport level, but the generation check in
// `handle_action_event` is what guarantees a superseded response can never
// mutate the store.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{ActionClient, ActionEvent, ActionOutcome, ApiError};
use crate::board::Square;
use crate::config::Config;
use crate::protocol::{
    ActionKind, ActionRequest, ChannelCommand, ChannelEvent, ConnectionStatus, DisconnectReason,
    ServerEvent, UiUpdate, UserCommand,
};
use crate::state::{GameState, GameStore, HistoryPatch, StatePatch};

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// The complete application state.
pub struct AppState {
    pub config: Config,
    /// Single source of truth for the synchronized game view.
    pub store: GameStore,
    pub connection_status: ConnectionStatus,
    /// Engine difficulty dial, forwarded opaquely to the authority.
    pub difficulty: u8,
    /// Which request kind is in flight, if any. Exposed to the view layer.
    pub busy: Option<ActionKind>,
    /// Monotonically increasing counter identifying the current action.
    /// Bumped each time a request is dispatched; completion events from
    /// older generations are discarded.
    pub action_generation: u64,
    /// The single pending-action slot.
    pub pending_action: Option<JoinHandle<()>>,
    pub api: Arc<ActionClient>,
    /// Sender for action completion events; dispatched tasks use a clone to
    /// report back into the main loop.
    pub action_tx: mpsc::Sender<ActionEvent>,
    pub channel_cmd_tx: mpsc::Sender<ChannelCommand>,
}

impl AppState {
    pub fn new(
        config: Config,
        api: ActionClient,
        action_tx: mpsc::Sender<ActionEvent>,
        channel_cmd_tx: mpsc::Sender<ChannelCommand>,
    ) -> AppState {
        let difficulty = config.engine.difficulty;
        AppState {
            config,
            store: GameStore::new(),
            connection_status: ConnectionStatus::Disconnected,
            difficulty,
            busy: None,
            action_generation: 0,
            pending_action: None,
            api: Arc::new(api),
            action_tx,
            channel_cmd_tx,
        }
    }

    /// Abort the in-flight action task, if any. The response it may already
    /// have produced is neutralized by the generation counter, not by this
    /// abort.
    pub fn cancel_pending_action(&mut self) {
        if let Some(handle) = self.pending_action.take() {
            handle.abort();
            info!("cancelled in-flight action (gen {})", self.action_generation);
        }
    }
}

// ---------------------------------------------------------------------------
// Action dispatch
// ---------------------------------------------------------------------------

/// Issue a game-action request, superseding any pending one.
pub async fn dispatch(
    state: &mut AppState,
    request: ActionRequest,
    ui_tx: &mpsc::Sender<UiUpdate>,
) {
    if state.connection_status != ConnectionStatus::Connected {
        warn!(
            "ignoring {} request while not connected",
            request.kind().label()
        );
        let _ = ui_tx
            .send(UiUpdate::Notice("not connected to the server".to_string()))
            .await;
        return;
    }

    state.cancel_pending_action();
    state.action_generation += 1;
    let generation = state.action_generation;
    let kind = request.kind();

    state.busy = Some(kind);
    let _ = ui_tx.send(UiUpdate::Busy(Some(kind))).await;

    let api = Arc::clone(&state.api);
    let tx = state.action_tx.clone();
    let handle = tokio::spawn(async move {
        let outcome = perform(&api, request).await;
        let _ = tx
            .send(ActionEvent {
                generation,
                kind,
                outcome,
            })
            .await;
    });
    state.pending_action = Some(handle);
    info!("dispatched {} (gen {})", kind.label(), generation);
}

async fn perform(api: &ActionClient, request: ActionRequest) -> Result<ActionOutcome, ApiError> {
    match request {
        ActionRequest::Move {
            from,
            to,
            promotion,
        } => api
            .submit_move(&move_token(from, to, promotion))
            .await
            .map(ActionOutcome::Snapshot),
        ActionRequest::EngineMove { difficulty } => api
            .engine_move(difficulty)
            .await
            .map(ActionOutcome::Snapshot),
        ActionRequest::NewGame => api.new_game().await.map(ActionOutcome::Snapshot),
        ActionRequest::Undo => api.undo().await.map(ActionOutcome::Snapshot),
        ActionRequest::Sync => {
            let board = api.fetch_board().await?;
            let status = api.fetch_status().await?;
            Ok(ActionOutcome::Synced { board, status })
        }
    }
}

/// The four-or-five-character wire token for a move.
fn move_token(from: Square, to: Square, promotion: Option<char>) -> String {
    match promotion {
        Some(piece) => format!("{from}{to}{piece}"),
        None => format!("{from}{to}"),
    }
}

/// Handle a completion event from a dispatched request.
pub async fn handle_action_event(
    state: &mut AppState,
    event: ActionEvent,
    ui_tx: &mpsc::Sender<UiUpdate>,
) {
    if event.generation != state.action_generation {
        // A superseded action finished after its cancellation. Neither a
        // success nor a failure: no state mutation, no user-visible error.
        debug!(
            "discarding response from superseded {} (gen {} != {})",
            event.kind.label(),
            event.generation,
            state.action_generation
        );
        return;
    }

    state.pending_action = None;
    state.busy = None;
    let _ = ui_tx.send(UiUpdate::Busy(None)).await;

    match event.outcome {
        Ok(outcome) => {
            if fold_outcome(state, event.kind, outcome) {
                let _ = ui_tx
                    .send(UiUpdate::Game(state.store.current().clone()))
                    .await;
            }
        }
        Err(ApiError::Rejected { message }) => {
            warn!("{} rejected: {}", event.kind.label(), message);
            let _ = ui_tx.send(UiUpdate::Notice(message)).await;
        }
        Err(err) => {
            warn!("{} failed: {}", event.kind.label(), err);
            let _ = ui_tx
                .send(UiUpdate::Notice(format!(
                    "{} failed: {err}",
                    event.kind.label()
                )))
                .await;
        }
    }
}

/// Fold a successful outcome into the store. Returns whether anything was
/// applied (a stale snapshot folds to nothing).
fn fold_outcome(state: &mut AppState, kind: ActionKind, outcome: ActionOutcome) -> bool {
    match (kind, outcome) {
        (ActionKind::NewGame, ActionOutcome::Snapshot(snap)) => {
            // Full replace: history resets on a new game.
            state.store.reset(
                snap.seq,
                GameState {
                    position: snap.board.fen,
                    status: snap.game_status,
                    move_history: snap.move_history.unwrap_or_default(),
                    last_move: None,
                },
            )
        }
        (ActionKind::Undo, ActionOutcome::Snapshot(snap)) => {
            // Undo responses carry the authoritative (shrunk) history; the
            // last move is whatever remains on top of it.
            let history = snap.move_history.unwrap_or_default();
            let last_move = history.last().cloned();
            state.store.fold(StatePatch {
                seq: snap.seq,
                position: Some(snap.board.fen),
                status: Some(snap.game_status),
                last_move: Some(last_move),
                history: Some(HistoryPatch::Replace(history)),
            })
        }
        (_, ActionOutcome::Snapshot(snap)) => {
            // Move / engine move: partial fold of {position, status,
            // last_move}, appending the applied move to the history.
            let history = match snap.move_history {
                Some(history) => Some(HistoryPatch::Replace(history)),
                None => snap.applied_move.clone().map(HistoryPatch::Append),
            };
            state.store.fold(StatePatch {
                seq: snap.seq,
                position: Some(snap.board.fen),
                status: Some(snap.game_status),
                last_move: snap.applied_move.map(Some),
                history,
            })
        }
        (_, ActionOutcome::Synced { board, status }) => {
            // The two read-only fetches are combined into one patch guarded
            // by the newer of their sequence numbers.
            let seq = board.seq.max(status.seq);
            state.store.fold(StatePatch {
                seq,
                position: Some(board.fen),
                status: Some(status.status),
                last_move: Some(status.last_move),
                history: Some(HistoryPatch::Replace(status.move_history)),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Channel events
// ---------------------------------------------------------------------------

/// Handle a lifecycle event or server push from the channel task.
pub async fn handle_channel_event(
    state: &mut AppState,
    event: ChannelEvent,
    ui_tx: &mpsc::Sender<UiUpdate>,
) {
    match event {
        ChannelEvent::Connecting { attempt } => {
            debug!("channel connecting (attempt {attempt})");
            state.connection_status = ConnectionStatus::Connecting;
            let _ = ui_tx
                .send(UiUpdate::Connection(ConnectionStatus::Connecting))
                .await;
        }
        ChannelEvent::Connected => {
            info!("channel connected");
            state.connection_status = ConnectionStatus::Connected;
            let _ = ui_tx
                .send(UiUpdate::Connection(ConnectionStatus::Connected))
                .await;
        }
        ChannelEvent::Push(server_event) => {
            apply_push(state, server_event, ui_tx).await;
        }
        ChannelEvent::Disconnected { reason } => {
            match &reason {
                DisconnectReason::Manual => info!("channel disconnected on request"),
                other => warn!("channel disconnected: {other:?}"),
            }
            state.connection_status = ConnectionStatus::Disconnected;
            let _ = ui_tx
                .send(UiUpdate::Connection(ConnectionStatus::Disconnected))
                .await;
        }
        ChannelEvent::RetriesExhausted => {
            warn!("channel retries exhausted; manual reconnect required");
            state.connection_status = ConnectionStatus::Lost;
            let _ = ui_tx
                .send(UiUpdate::Connection(ConnectionStatus::Lost))
                .await;
            let _ = ui_tx
                .send(UiUpdate::Notice(
                    "connection lost; press c to reconnect".to_string(),
                ))
                .await;
        }
    }
}

async fn apply_push(state: &mut AppState, event: ServerEvent, ui_tx: &mpsc::Sender<UiUpdate>) {
    let applied = match event {
        ServerEvent::Connected {
            seq,
            board,
            game_status,
            move_history,
            last_move,
        } => {
            // Initial full state after the handshake.
            state.store.fold(StatePatch {
                seq,
                position: Some(board.fen),
                status: Some(game_status),
                last_move: Some(last_move),
                history: Some(HistoryPatch::Replace(move_history)),
            })
        }
        ServerEvent::MoveMade {
            seq,
            board,
            game_status,
            san,
            move_history,
        }
        | ServerEvent::EngineMove {
            seq,
            board,
            game_status,
            san,
            move_history,
        } => {
            let history = match move_history {
                Some(history) => HistoryPatch::Replace(history),
                None => HistoryPatch::Append(san.clone()),
            };
            state.store.fold(StatePatch {
                seq,
                position: Some(board.fen),
                status: Some(game_status),
                last_move: Some(Some(san)),
                history: Some(history),
            })
        }
        ServerEvent::MoveUndone {
            seq,
            board,
            game_status,
            move_history,
        } => {
            let last_move = move_history.last().cloned();
            state.store.fold(StatePatch {
                seq,
                position: Some(board.fen),
                status: Some(game_status),
                last_move: Some(last_move),
                history: Some(HistoryPatch::Replace(move_history)),
            })
        }
    };

    if applied {
        let _ = ui_tx
            .send(UiUpdate::Game(state.store.current().clone()))
            .await;
    }
}

// ---------------------------------------------------------------------------
// User commands
// ---------------------------------------------------------------------------

pub async fn handle_user_command(
    state: &mut AppState,
    cmd: UserCommand,
    ui_tx: &mpsc::Sender<UiUpdate>,
) {
    match cmd {
        UserCommand::Move { from, to } => {
            dispatch(
                state,
                ActionRequest::Move {
                    from,
                    to,
                    promotion: None,
                },
                ui_tx,
            )
            .await;
        }
        UserCommand::EngineMove => {
            let difficulty = state.difficulty;
            dispatch(state, ActionRequest::EngineMove { difficulty }, ui_tx).await;
        }
        UserCommand::NewGame => dispatch(state, ActionRequest::NewGame, ui_tx).await,
        UserCommand::Undo => dispatch(state, ActionRequest::Undo, ui_tx).await,
        UserCommand::Sync => dispatch(state, ActionRequest::Sync, ui_tx).await,
        UserCommand::SetDifficulty(value) => {
            state.difficulty = value.clamp(1, 10);
            let _ = ui_tx.send(UiUpdate::Difficulty(state.difficulty)).await;
        }
        UserCommand::Connect => {
            let _ = state.channel_cmd_tx.send(ChannelCommand::Connect).await;
        }
        UserCommand::Disconnect => {
            let _ = state.channel_cmd_tx.send(ChannelCommand::Disconnect).await;
        }
        UserCommand::Quit => {
            // Handled by the run loop before it gets here.
        }
    }
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

/// Run the main application event loop.
///
/// Listens on three channels with `tokio::select!`:
/// 1. Channel lifecycle events and server pushes
/// 2. Action completion events
/// 3. User commands from the TUI
///
/// Pushes UI updates through `ui_tx` for the TUI render loop.
pub async fn run(
    mut channel_rx: mpsc::Receiver<ChannelEvent>,
    mut action_rx: mpsc::Receiver<ActionEvent>,
    mut cmd_rx: mpsc::Receiver<UserCommand>,
    ui_tx: mpsc::Sender<UiUpdate>,
    mut state: AppState,
) -> anyhow::Result<()> {
    info!("application event loop started");

    // Prime the view so it reflects configured settings before any event.
    let _ = ui_tx
        .send(UiUpdate::Game(state.store.current().clone()))
        .await;
    let _ = ui_tx.send(UiUpdate::Difficulty(state.difficulty)).await;

    loop {
        tokio::select! {
            event = channel_rx.recv() => match event {
                Some(event) => handle_channel_event(&mut state, event, &ui_tx).await,
                None => {
                    info!("channel event stream closed, shutting down");
                    break;
                }
            },

            event = action_rx.recv() => match event {
                Some(event) => handle_action_event(&mut state, event, &ui_tx).await,
                None => {
                    info!("action event stream closed, shutting down");
                    break;
                }
            },

            cmd = cmd_rx.recv() => match cmd {
                Some(UserCommand::Quit) => {
                    info!("quit command received, shutting down");
                    state.cancel_pending_action();
                    let _ = state.channel_cmd_tx.send(ChannelCommand::Shutdown).await;
                    break;
                }
                Some(cmd) => handle_user_command(&mut state, cmd, &ui_tx).await,
                None => {
                    info!("command stream closed, shutting down");
                    state.cancel_pending_action();
                    let _ = state.channel_cmd_tx.send(ChannelCommand::Shutdown).await;
                    break;
                }
            },
        }
    }

    Ok(())
}
