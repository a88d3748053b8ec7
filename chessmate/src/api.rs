// HTTP client for the authority's game-action endpoints.
//
// One method per action plus the two read-only fetches. The client never
// retries: a transport failure or rejection is reported once and the retry
// decision belongs to the user. Response decoding is a pure function so the
// error mapping is testable without a server.

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::protocol::{
    ActionKind, ActionSnapshot, BoardSnapshot, ErrorBody, StatusSnapshot,
};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ApiError {
    /// The authority rejected the action (illegal move, empty history, ...).
    #[error("{message}")]
    Rejected { message: String },

    /// The request never produced an authoritative answer.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A 2xx response whose body does not decode.
    #[error("unexpected response payload: {0}")]
    BadPayload(String),
}

// ---------------------------------------------------------------------------
// Events back to the dispatcher
// ---------------------------------------------------------------------------

/// What a completed request produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// An action response snapshot (move, engine move, new game, undo).
    Snapshot(ActionSnapshot),
    /// The combined result of the two read-only fetches.
    Synced {
        board: BoardSnapshot,
        status: StatusSnapshot,
    },
}

/// Completion event for one dispatched request.
///
/// `generation` is the dispatcher counter captured when the request was
/// spawned. The receiving side discards events from superseded generations:
/// an aborted task may still have sent its event before the abort landed.
#[derive(Debug)]
pub struct ActionEvent {
    pub generation: u64,
    pub kind: ActionKind,
    pub outcome: Result<ActionOutcome, ApiError>,
}

// ---------------------------------------------------------------------------
// ActionClient
// ---------------------------------------------------------------------------

/// Thin reqwest wrapper over the authority's REST surface.
pub struct ActionClient {
    http: reqwest::Client,
    base_url: String,
}

impl ActionClient {
    /// Build a client with bounded connect and request timeouts.
    pub fn new(
        base_url: String,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<ActionClient, ApiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(ActionClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `POST /api/move` with a from/to(/promotion) token like `e2e4`.
    pub async fn submit_move(&self, token: &str) -> Result<ActionSnapshot, ApiError> {
        let body = serde_json::json!({ "move": token });
        let response = self
            .http
            .post(self.url("/api/move"))
            .json(&body)
            .send()
            .await?;
        read_response(response).await
    }

    /// `POST /api/engine-move` with the difficulty dial.
    pub async fn engine_move(&self, difficulty: u8) -> Result<ActionSnapshot, ApiError> {
        let body = serde_json::json!({ "difficulty": difficulty });
        let response = self
            .http
            .post(self.url("/api/engine-move"))
            .json(&body)
            .send()
            .await?;
        read_response(response).await
    }

    /// `GET /api/new-game`.
    pub async fn new_game(&self) -> Result<ActionSnapshot, ApiError> {
        let response = self.http.get(self.url("/api/new-game")).send().await?;
        read_response(response).await
    }

    /// `POST /api/undo`.
    pub async fn undo(&self) -> Result<ActionSnapshot, ApiError> {
        let response = self.http.post(self.url("/api/undo")).send().await?;
        read_response(response).await
    }

    /// `GET /api/board` (read-only).
    pub async fn fetch_board(&self) -> Result<BoardSnapshot, ApiError> {
        let response = self.http.get(self.url("/api/board")).send().await?;
        read_response(response).await
    }

    /// `GET /api/game-status` (read-only).
    pub async fn fetch_status(&self) -> Result<StatusSnapshot, ApiError> {
        let response = self.http.get(self.url("/api/game-status")).send().await?;
        read_response(response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn read_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await?;
    decode_response(status, &body)
}

/// Map an HTTP status and body to a typed result.
///
/// Non-2xx responses carry `{"error": "..."}`; when even that does not
/// parse, the status line itself becomes the rejection message.
pub(crate) fn decode_response<T: DeserializeOwned>(
    status: StatusCode,
    body: &str,
) -> Result<T, ApiError> {
    if status.is_success() {
        serde_json::from_str(body).map_err(|err| ApiError::BadPayload(err.to_string()))
    } else {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(error_body) => Err(ApiError::Rejected {
                message: error_body.error,
            }),
            Err(_) => Err(ApiError::Rejected {
                message: format!("authority returned {status}"),
            }),
        }
    }
}
