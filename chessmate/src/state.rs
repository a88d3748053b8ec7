// Shared game state: the single source of truth for the synchronized view.
//
// Two producers write here (channel pushes and action responses), and both
// go through `GameStore::fold` or `GameStore::reset`. Each accepted write
// publishes a full cloned snapshot through a watch channel before the call
// returns, so subscribers always observe the latest state synchronously.
//
// Writes are guarded by the authority-assigned sequence number: a snapshot
// whose `seq` is not strictly newer than the last applied one is rejected
// wholesale. Without this, a slow action response could overwrite the state
// installed by a faster channel push (or vice versa).

use tokio::sync::watch;
use tracing::debug;

use crate::board::INITIAL_FEN;
use crate::protocol::GameStatus;

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// The synchronized view of the game.
#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    /// Current position as a FEN string, replaced wholesale on every update.
    pub position: String,
    pub status: GameStatus,
    /// Move notations in order, append-only within a game.
    pub move_history: Vec<String>,
    /// The most recently applied move, if any.
    pub last_move: Option<String>,
}

impl Default for GameState {
    fn default() -> Self {
        GameState {
            position: INITIAL_FEN.to_string(),
            status: GameStatus::Ongoing,
            move_history: Vec::new(),
            last_move: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Patches
// ---------------------------------------------------------------------------

/// How a patch updates the move history.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryPatch {
    /// Append one move (move made, engine move).
    Append(String),
    /// Replace the whole list (initial sync, undo).
    Replace(Vec<String>),
}

/// A partial state update derived from one authoritative snapshot.
///
/// `None` fields are left untouched by the fold; `last_move` uses a nested
/// option so a patch can explicitly clear it (undo back to an empty game).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    pub seq: u64,
    pub position: Option<String>,
    pub status: Option<GameStatus>,
    pub last_move: Option<Option<String>>,
    pub history: Option<HistoryPatch>,
}

impl StatePatch {
    pub fn new(seq: u64) -> StatePatch {
        StatePatch {
            seq,
            ..StatePatch::default()
        }
    }
}

// ---------------------------------------------------------------------------
// GameStore
// ---------------------------------------------------------------------------

/// Owner of the shared [`GameState`]. Only the app event loop holds one;
/// everything else sees read-only snapshots through [`GameStore::subscribe`].
pub struct GameStore {
    state: GameState,
    last_seq: u64,
    tx: watch::Sender<GameState>,
}

impl GameStore {
    pub fn new() -> GameStore {
        let state = GameState::default();
        let (tx, _rx) = watch::channel(state.clone());
        GameStore {
            state,
            last_seq: 0,
            tx,
        }
    }

    /// A receiver that always holds the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<GameState> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> &GameState {
        &self.state
    }

    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Fold a partial snapshot into the state.
    ///
    /// Returns `false` without touching anything when the patch is stale
    /// (its `seq` is not newer than the last applied snapshot).
    pub fn fold(&mut self, patch: StatePatch) -> bool {
        if patch.seq <= self.last_seq {
            debug!(
                patch_seq = patch.seq,
                applied_seq = self.last_seq,
                "discarding stale snapshot"
            );
            return false;
        }
        self.last_seq = patch.seq;

        if let Some(position) = patch.position {
            self.state.position = position;
        }
        if let Some(status) = patch.status {
            self.state.status = status;
        }
        if let Some(last_move) = patch.last_move {
            self.state.last_move = last_move;
        }
        match patch.history {
            Some(HistoryPatch::Append(san)) => self.state.move_history.push(san),
            Some(HistoryPatch::Replace(history)) => self.state.move_history = history,
            None => {}
        }

        self.publish();
        true
    }

    /// Replace the state wholesale (new game). Subject to the same staleness
    /// guard as `fold`: the authority's sequence numbers keep increasing
    /// across games.
    pub fn reset(&mut self, seq: u64, state: GameState) -> bool {
        if seq <= self.last_seq {
            debug!(
                patch_seq = seq,
                applied_seq = self.last_seq,
                "discarding stale reset"
            );
            return false;
        }
        self.last_seq = seq;
        self.state = state;
        self.publish();
        true
    }

    fn publish(&self) {
        // send_replace delivers even when no subscriber is currently attached.
        self.tx.send_replace(self.state.clone());
    }
}

impl Default for GameStore {
    fn default() -> Self {
        GameStore::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch(seq: u64) -> StatePatch {
        StatePatch::new(seq)
    }

    #[test]
    fn starts_with_the_standard_position() {
        let store = GameStore::new();
        let state = store.current();
        assert_eq!(state.position, INITIAL_FEN);
        assert_eq!(state.status, GameStatus::Ongoing);
        assert!(state.move_history.is_empty());
        assert!(state.last_move.is_none());
    }

    #[test]
    fn fold_applies_only_present_fields() {
        let mut store = GameStore::new();
        let applied = store.fold(StatePatch {
            status: Some(GameStatus::Check),
            ..patch(1)
        });
        assert!(applied);
        // Position and history were untouched.
        assert_eq!(store.current().position, INITIAL_FEN);
        assert!(store.current().move_history.is_empty());
        assert_eq!(store.current().status, GameStatus::Check);
    }

    #[test]
    fn fold_appends_and_replaces_history() {
        let mut store = GameStore::new();
        store.fold(StatePatch {
            history: Some(HistoryPatch::Append("e4".into())),
            last_move: Some(Some("e4".into())),
            ..patch(1)
        });
        store.fold(StatePatch {
            history: Some(HistoryPatch::Append("e5".into())),
            last_move: Some(Some("e5".into())),
            ..patch(2)
        });
        assert_eq!(store.current().move_history, vec!["e4", "e5"]);

        // Undo replaces the list and clears last_move via the nested option.
        store.fold(StatePatch {
            history: Some(HistoryPatch::Replace(vec!["e4".into()])),
            last_move: Some(Some("e4".into())),
            ..patch(3)
        });
        assert_eq!(store.current().move_history, vec!["e4"]);
        assert_eq!(store.current().last_move.as_deref(), Some("e4"));

        store.fold(StatePatch {
            history: Some(HistoryPatch::Replace(Vec::new())),
            last_move: Some(None),
            ..patch(4)
        });
        assert!(store.current().move_history.is_empty());
        assert!(store.current().last_move.is_none());
    }

    #[test]
    fn stale_patches_are_rejected_wholesale() {
        let mut store = GameStore::new();
        assert!(store.fold(StatePatch {
            status: Some(GameStatus::Check),
            ..patch(5)
        }));

        // Older snapshot arrives late: nothing changes.
        let applied = store.fold(StatePatch {
            status: Some(GameStatus::Checkmate),
            position: Some("8/8/8/8/8/8/8/8 w - - 0 1".into()),
            ..patch(4)
        });
        assert!(!applied);
        assert_eq!(store.current().status, GameStatus::Check);
        assert_eq!(store.current().position, INITIAL_FEN);

        // Same seq is a duplicate, also rejected.
        assert!(!store.fold(StatePatch {
            status: Some(GameStatus::Checkmate),
            ..patch(5)
        }));
        assert_eq!(store.last_seq(), 5);
    }

    #[test]
    fn reset_replaces_everything() {
        let mut store = GameStore::new();
        store.fold(StatePatch {
            status: Some(GameStatus::Checkmate),
            history: Some(HistoryPatch::Replace(vec!["e4".into(), "f5".into()])),
            last_move: Some(Some("Qh5".into())),
            ..patch(9)
        });

        assert!(store.reset(10, GameState::default()));
        assert_eq!(store.current(), &GameState::default());
        assert_eq!(store.last_seq(), 10);

        // A stale reset is ignored.
        assert!(!store.reset(10, GameState {
            status: GameStatus::Draw,
            ..GameState::default()
        }));
        assert_eq!(store.current().status, GameStatus::Ongoing);
    }

    #[test]
    fn subscribers_observe_writes_synchronously() {
        let mut store = GameStore::new();
        let rx = store.subscribe();

        store.fold(StatePatch {
            history: Some(HistoryPatch::Append("d4".into())),
            ..patch(1)
        });

        // The watch value is already updated when fold returns.
        assert_eq!(rx.borrow().move_history, vec!["d4"]);
    }
}
