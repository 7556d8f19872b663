//! REST synchronization with the painting service.
//!
//! The backend is the system of record; this module runs the HTTP calls on
//! a dedicated worker thread so the UI stays responsive. Commands go in and
//! events come out over channels. Every event carries the session epoch it
//! was issued under, so a response that completes after a logout can be
//! discarded instead of mutating the next session's state.

use std::sync::mpsc as std_mpsc;
use std::thread::{self, JoinHandle};

use anyhow::Result;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::EaselError;
use crate::shapes::Shape;

/// Backend identifier of a saved painting.
pub type PaintingId = u64;

/// A user record returned by the login endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
}

/// Sidebar summary of a saved painting.
#[derive(Debug, Clone, Deserialize)]
pub struct PaintingSummary {
    pub id: PaintingId,
    pub name: String,
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<String>,
}

/// Full painting as returned by the load endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PaintingDetail {
    pub id: PaintingId,
    pub name: String,
    pub shapes: Vec<Shape>,
}

/// Request body for create and update.
#[derive(Debug, Clone, Serialize)]
pub struct PaintingPayload {
    pub name: String,
    pub shapes: Vec<Shape>,
}

#[derive(Debug, Serialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    success: bool,
    #[serde(default)]
    user: Option<User>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SaveResponse {
    #[serde(default)]
    id: Option<PaintingId>,
    #[serde(default)]
    message: Option<String>,
}

/// Configuration for the remote worker.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Service root, e.g. `http://localhost:5000`.
    pub base_url: String,
}

/// Commands from the main thread to the worker.
#[derive(Debug)]
pub enum RemoteCommand {
    Login {
        epoch: u64,
        username: String,
        password: String,
    },
    ListPaintings {
        epoch: u64,
        user_id: u64,
    },
    CreatePainting {
        epoch: u64,
        user_id: u64,
        payload: PaintingPayload,
    },
    UpdatePainting {
        epoch: u64,
        user_id: u64,
        painting_id: PaintingId,
        payload: PaintingPayload,
    },
    FetchPainting {
        epoch: u64,
        user_id: u64,
        painting_id: PaintingId,
    },
    DeletePainting {
        epoch: u64,
        user_id: u64,
        painting_id: PaintingId,
    },
    Shutdown,
}

/// Events from the worker back to the main thread.
#[derive(Debug)]
pub enum RemoteEvent {
    LoggedIn { epoch: u64, user: User },
    LoginFailed { epoch: u64, error: EaselError },
    Paintings { epoch: u64, paintings: Vec<PaintingSummary> },
    Saved { epoch: u64, id: PaintingId, message: String },
    Loaded { epoch: u64, painting: PaintingDetail },
    Deleted { epoch: u64, id: PaintingId },
    /// A guarded save/load/delete failed.
    Failed { epoch: u64, error: EaselError },
    /// A list refresh failed. Kept apart from `Failed` because list calls
    /// are not single-flighted and must not release the guard.
    ListFailed { epoch: u64, error: EaselError },
}

impl RemoteEvent {
    /// The session epoch this event was issued under.
    pub fn epoch(&self) -> u64 {
        match self {
            RemoteEvent::LoggedIn { epoch, .. }
            | RemoteEvent::LoginFailed { epoch, .. }
            | RemoteEvent::Paintings { epoch, .. }
            | RemoteEvent::Saved { epoch, .. }
            | RemoteEvent::Loaded { epoch, .. }
            | RemoteEvent::Deleted { epoch, .. }
            | RemoteEvent::Failed { epoch, .. }
            | RemoteEvent::ListFailed { epoch, .. } => *epoch,
        }
    }
}

/// Handle for communicating with the worker thread from the main thread.
pub struct RemoteHandle {
    command_tx: std_mpsc::Sender<RemoteCommand>,
    event_rx: std_mpsc::Receiver<RemoteEvent>,
    _thread: JoinHandle<()>,
}

impl RemoteHandle {
    /// Non-blocking check for worker events.
    pub fn poll_event(&self) -> Option<RemoteEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Clone of the command sender, for the controller.
    pub fn command_tx(&self) -> std_mpsc::Sender<RemoteCommand> {
        self.command_tx.clone()
    }

    /// Send a command to the worker thread.
    pub fn send_command(&self, cmd: RemoteCommand) -> Result<()> {
        self.command_tx.send(cmd)?;
        Ok(())
    }
}

/// Start the remote worker thread.
pub fn start_remote_thread(config: RemoteConfig) -> Result<RemoteHandle> {
    let (event_tx, event_rx) = std_mpsc::channel();
    let (command_tx, command_rx) = std_mpsc::channel::<RemoteCommand>();

    let thread = thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                warn!("failed to build remote runtime: {e}");
                let _ = event_tx.send(RemoteEvent::Failed {
                    epoch: 0,
                    error: EaselError::Connection(e.to_string()),
                });
                return;
            }
        };

        let client = reqwest::Client::new();

        while let Ok(cmd) = command_rx.recv() {
            match cmd {
                RemoteCommand::Shutdown => break,
                cmd => {
                    debug!(?cmd, "dispatching remote command");
                    let event = rt.block_on(handle_command(&client, &config.base_url, cmd));
                    if event_tx.send(event).is_err() {
                        break;
                    }
                }
            }
        }
    });

    Ok(RemoteHandle {
        command_tx,
        event_rx,
        _thread: thread,
    })
}

fn connection(e: reqwest::Error) -> EaselError {
    EaselError::Connection(e.to_string())
}

fn status_error(status: StatusCode) -> EaselError {
    if status == StatusCode::NOT_FOUND {
        EaselError::NotFound("painting not found".to_string())
    } else {
        EaselError::Connection(format!("server returned {status}"))
    }
}

/// Run a single command against the service and translate the outcome.
async fn handle_command(client: &reqwest::Client, base: &str, cmd: RemoteCommand) -> RemoteEvent {
    match cmd {
        RemoteCommand::Login {
            epoch,
            username,
            password,
        } => {
            let url = format!("{base}/api/login");
            let req = LoginRequest { username, password };
            let resp = match client.post(&url).json(&req).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    return RemoteEvent::LoginFailed {
                        epoch,
                        error: connection(e),
                    };
                }
            };
            // The service answers 401 with a LoginResponse body too, so
            // parse the body regardless of status.
            match resp.json::<LoginResponse>().await {
                Ok(LoginResponse {
                    success: true,
                    user: Some(user),
                    ..
                }) => RemoteEvent::LoggedIn { epoch, user },
                Ok(body) => RemoteEvent::LoginFailed {
                    epoch,
                    error: EaselError::Auth(
                        body.error.unwrap_or_else(|| "invalid credentials".to_string()),
                    ),
                },
                Err(e) => RemoteEvent::LoginFailed {
                    epoch,
                    error: connection(e),
                },
            }
        }

        RemoteCommand::ListPaintings { epoch, user_id } => {
            let url = format!("{base}/api/paintings/{user_id}");
            match fetch_json::<Vec<PaintingSummary>>(client, &url).await {
                Ok(paintings) => RemoteEvent::Paintings { epoch, paintings },
                Err(error) => RemoteEvent::ListFailed { epoch, error },
            }
        }

        RemoteCommand::CreatePainting {
            epoch,
            user_id,
            payload,
        } => {
            let url = format!("{base}/api/paintings/{user_id}");
            match send_json::<SaveResponse>(client.post(&url).json(&payload)).await {
                Ok(SaveResponse { id: Some(id), message }) => RemoteEvent::Saved {
                    epoch,
                    id,
                    message: message.unwrap_or_else(|| "Painting saved successfully".to_string()),
                },
                Ok(_) => RemoteEvent::Failed {
                    epoch,
                    error: EaselError::Connection("create response carried no id".to_string()),
                },
                Err(error) => RemoteEvent::Failed { epoch, error },
            }
        }

        RemoteCommand::UpdatePainting {
            epoch,
            user_id,
            painting_id,
            payload,
        } => {
            let url = format!("{base}/api/paintings/{user_id}/{painting_id}");
            match send_json::<SaveResponse>(client.put(&url).json(&payload)).await {
                Ok(body) => RemoteEvent::Saved {
                    epoch,
                    id: body.id.unwrap_or(painting_id),
                    message: body
                        .message
                        .unwrap_or_else(|| "Painting updated successfully".to_string()),
                },
                Err(error) => RemoteEvent::Failed { epoch, error },
            }
        }

        RemoteCommand::FetchPainting {
            epoch,
            user_id,
            painting_id,
        } => {
            let url = format!("{base}/api/paintings/{user_id}/{painting_id}");
            match fetch_json::<PaintingDetail>(client, &url).await {
                Ok(painting) => RemoteEvent::Loaded { epoch, painting },
                Err(error) => RemoteEvent::Failed { epoch, error },
            }
        }

        RemoteCommand::DeletePainting {
            epoch,
            user_id,
            painting_id,
        } => {
            let url = format!("{base}/api/paintings/{user_id}/{painting_id}");
            let resp = match client.delete(&url).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    return RemoteEvent::Failed {
                        epoch,
                        error: connection(e),
                    };
                }
            };
            if resp.status().is_success() {
                RemoteEvent::Deleted {
                    epoch,
                    id: painting_id,
                }
            } else {
                RemoteEvent::Failed {
                    epoch,
                    error: status_error(resp.status()),
                }
            }
        }

        RemoteCommand::Shutdown => unreachable!("shutdown is handled by the worker loop"),
    }
}

async fn fetch_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T, EaselError> {
    let resp = client.get(url).send().await.map_err(connection)?;
    if !resp.status().is_success() {
        return Err(status_error(resp.status()));
    }
    resp.json::<T>().await.map_err(connection)
}

async fn send_json<T: serde::de::DeserializeOwned>(
    req: reqwest::RequestBuilder,
) -> Result<T, EaselError> {
    let resp = req.send().await.map_err(connection)?;
    if !resp.status().is_success() {
        return Err(status_error(resp.status()));
    }
    resp.json::<T>().await.map_err(connection)
}
