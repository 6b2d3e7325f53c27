// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Card terminal pairing.
//!
//! A pairing session moves through
//! `idle → initializing → waiting_for_code → successful | failed`.
//! While waiting, a background task listens on the provider's WebSocket for
//! the completion event. The socket is closed when pairing succeeds, when the
//! operator cancels, and when the session is dropped.

use crate::error::AppError;
use crate::services::payment::PaymentService;
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;

/// How long a code may sit on the operator's screen before we give up.
pub const PAIRING_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Finished sessions older than this are dropped when a new one starts.
const SESSION_RETENTION_MINUTES: i64 = 30;

/// Unfinished sessions older than this are dropped too. Covers sessions whose
/// start request was abandoned before a listener was attached.
fn stuck_session_age() -> chrono::Duration {
    chrono::Duration::seconds(PAIRING_TIMEOUT.as_secs() as i64)
}

/// Pairing session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PairingState {
    Idle,
    Initializing,
    WaitingForCode { code: String },
    Successful { link_id: String },
    Failed { reason: String },
}

/// Inputs to the pairing state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingEvent {
    /// Operator opened the pairing dialog
    Start,
    /// Provider issued a code and the socket is open
    CodeIssued { code: String },
    /// Provider could not issue a code
    InitFailed(String),
    /// Completion event received on the socket
    Completed { link_id: String },
    /// Provider reported a failed pairing on the socket
    Rejected(String),
    SocketError(String),
    /// Socket closed by the other side
    SocketClosed,
    TimedOut,
}

impl PairingState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PairingState::Successful { .. } | PairingState::Failed { .. }
        )
    }

    /// Apply one event.
    ///
    /// Terminal states absorb every event. A socket error or close before
    /// success always fails the session, whatever state it is in.
    pub fn apply(self, event: PairingEvent) -> PairingState {
        use PairingEvent as E;
        use PairingState as S;

        if self.is_terminal() {
            return self;
        }

        match (self, event) {
            (S::Idle, E::Start) => S::Initializing,
            (S::Initializing, E::CodeIssued { code }) => S::WaitingForCode { code },
            (S::Initializing, E::InitFailed(reason)) => S::Failed { reason },
            (S::WaitingForCode { .. }, E::Completed { link_id }) => S::Successful { link_id },
            (S::WaitingForCode { .. }, E::Rejected(reason)) => S::Failed { reason },
            (_, E::SocketError(reason)) => S::Failed {
                reason: format!("socket error: {}", reason),
            },
            (_, E::SocketClosed) => S::Failed {
                reason: "socket closed before pairing completed".to_string(),
            },
            (_, E::TimedOut) => S::Failed {
                reason: "pairing timed out".to_string(),
            },
            (state, event) => {
                tracing::warn!(?state, ?event, "Ignoring out-of-order pairing event");
                state
            }
        }
    }
}

/// Messages the provider sends on the pairing socket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SocketMessage {
    PairingCompleted {
        #[serde(rename = "linkId")]
        link_id: String,
    },
    PairingFailed {
        #[serde(default)]
        reason: Option<String>,
    },
    #[serde(other)]
    Other,
}

impl SocketMessage {
    /// Map a text frame to a state machine event, if it carries one.
    pub fn parse_event(text: &str) -> Option<PairingEvent> {
        match serde_json::from_str::<SocketMessage>(text) {
            Ok(SocketMessage::PairingCompleted { link_id }) => {
                Some(PairingEvent::Completed { link_id })
            }
            Ok(SocketMessage::PairingFailed { reason }) => Some(PairingEvent::Rejected(
                reason.unwrap_or_else(|| "rejected by terminal".to_string()),
            )),
            Ok(SocketMessage::Other) => None,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring unparseable pairing message");
                None
            }
        }
    }
}

/// Pairing session snapshot returned to the operator.
#[derive(Debug, Clone, Serialize)]
pub struct PairingView {
    pub id: String,
    #[serde(flatten)]
    pub state: PairingState,
    pub created_at: String,
}

struct PairingSession {
    state: PairingState,
    created_at: DateTime<Utc>,
    /// Dropping this closes the socket listener.
    cancel: Option<oneshot::Sender<()>>,
}

/// In-memory registry of pairing sessions, shared by all requests.
#[derive(Clone, Default)]
pub struct PairingRegistry {
    sessions: Arc<DashMap<String, PairingSession>>,
}

impl PairingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session in `idle` and move it to `initializing`.
    pub fn start(&self) -> String {
        self.prune_stale(Utc::now());

        let id = uuid::Uuid::new_v4().to_string();
        self.sessions.insert(
            id.clone(),
            PairingSession {
                state: PairingState::Idle.apply(PairingEvent::Start),
                created_at: Utc::now(),
                cancel: None,
            },
        );
        id
    }

    /// Apply an event. Returns the new state, or `None` if the session is gone.
    pub fn apply(&self, id: &str, event: PairingEvent) -> Option<PairingState> {
        let mut session = self.sessions.get_mut(id)?;
        let next = session.state.clone().apply(event);
        if next != session.state {
            tracing::info!(session = id, state = ?next, "Pairing state changed");
        }
        session.state = next.clone();
        if next.is_terminal() {
            // Listener is done or about to be; nothing left to cancel.
            session.cancel = None;
        }
        Some(next)
    }

    fn attach_cancel(&self, id: &str, cancel: oneshot::Sender<()>) -> bool {
        match self.sessions.get_mut(id) {
            Some(mut session) => {
                session.cancel = Some(cancel);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<PairingView> {
        self.sessions.get(id).map(|s| PairingView {
            id: id.to_string(),
            state: s.state.clone(),
            created_at: format_utc_rfc3339(s.created_at),
        })
    }

    /// Drop a session, closing its socket if still open.
    pub fn remove(&self, id: &str) -> bool {
        match self.sessions.remove(id) {
            Some((_, mut session)) => {
                if let Some(cancel) = session.cancel.take() {
                    let _ = cancel.send(());
                }
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop old sessions. Dropping a session closes its socket, if any.
    fn prune_stale(&self, now: DateTime<Utc>) {
        let finished_cutoff = now - chrono::Duration::minutes(SESSION_RETENTION_MINUTES);
        let stuck_cutoff = now - stuck_session_age();
        self.sessions.retain(|_, s| {
            let cutoff = if s.state.is_terminal() {
                finished_cutoff
            } else {
                stuck_cutoff
            };
            s.created_at >= cutoff
        });
    }
}

/// Start a pairing session: get a code, open the socket, start listening.
///
/// The socket is opened before the code is shown so a fast operator cannot
/// complete pairing before we listen.
pub async fn start_pairing(
    payment: &PaymentService,
    registry: &PairingRegistry,
) -> Result<PairingView, AppError> {
    let id = registry.start();

    let pairing = match payment.request_pairing().await {
        Ok(p) => p,
        Err(e) => {
            registry.apply(&id, PairingEvent::InitFailed(e.to_string()));
            return Err(e);
        }
    };

    match tokio_tungstenite::connect_async(pairing.websocket_url.as_str()).await {
        Ok((socket, _)) => {
            registry.apply(&id, PairingEvent::CodeIssued { code: pairing.code });
            spawn_listener(registry, &id, socket, PAIRING_TIMEOUT);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to open pairing socket");
            registry.apply(&id, PairingEvent::SocketError(e.to_string()));
        }
    }

    registry
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("Pairing session {}", id)))
}

/// Spawn the socket listener for a session in `waiting_for_code`.
pub fn spawn_listener<S>(
    registry: &PairingRegistry,
    id: &str,
    socket: tokio_tungstenite::WebSocketStream<S>,
    timeout: Duration,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let (cancel_tx, cancel_rx) = oneshot::channel();
    if !registry.attach_cancel(id, cancel_tx) {
        // Session already gone; dropping the socket closes it.
        return;
    }

    let registry = registry.clone();
    let id = id.to_string();
    tokio::spawn(async move {
        listen(socket, &registry, &id, cancel_rx, timeout).await;
    });
}

/// Listen for the completion event until the session reaches a terminal
/// state, is cancelled, or times out. Always closes the socket on exit.
async fn listen<S>(
    mut socket: tokio_tungstenite::WebSocketStream<S>,
    registry: &PairingRegistry,
    id: &str,
    mut cancel: oneshot::Receiver<()>,
    timeout: Duration,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        let event = tokio::select! {
            // Fires on explicit cancel and when the session (sender) is dropped.
            _ = &mut cancel => {
                tracing::info!(session = id, "Pairing cancelled, closing socket");
                break;
            }
            _ = &mut deadline => PairingEvent::TimedOut,
            frame = socket.next() => match frame {
                Some(Ok(Message::Text(text))) => match SocketMessage::parse_event(text.as_str()) {
                    Some(event) => event,
                    None => continue,
                },
                Some(Ok(Message::Close(_))) | None => PairingEvent::SocketClosed,
                Some(Ok(_)) => continue,
                Some(Err(e)) => PairingEvent::SocketError(e.to_string()),
            },
        };

        match registry.apply(id, event) {
            Some(state) if !state.is_terminal() => continue,
            _ => break,
        }
    }

    if let Err(e) = socket.close(None).await {
        tracing::debug!(session = id, error = %e, "Pairing socket already closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waiting() -> PairingState {
        PairingState::Idle
            .apply(PairingEvent::Start)
            .apply(PairingEvent::CodeIssued {
                code: "1234".to_string(),
            })
    }

    #[test]
    fn test_happy_path() {
        assert_eq!(
            waiting(),
            PairingState::WaitingForCode {
                code: "1234".to_string()
            }
        );
        assert_eq!(
            waiting().apply(PairingEvent::Completed {
                link_id: "link-1".to_string()
            }),
            PairingState::Successful {
                link_id: "link-1".to_string()
            }
        );
    }

    #[test]
    fn test_socket_problems_before_success_always_fail() {
        let states = [
            PairingState::Idle,
            PairingState::Initializing,
            waiting(),
        ];
        let events = [
            PairingEvent::SocketError("reset".to_string()),
            PairingEvent::SocketClosed,
            PairingEvent::TimedOut,
        ];
        for state in &states {
            for event in &events {
                let next = state.clone().apply(event.clone());
                assert!(
                    matches!(next, PairingState::Failed { .. }),
                    "{:?} + {:?} gave {:?}",
                    state,
                    event,
                    next
                );
            }
        }
    }

    #[test]
    fn test_close_after_success_keeps_success() {
        let done = waiting().apply(PairingEvent::Completed {
            link_id: "link-1".to_string(),
        });
        assert_eq!(done.clone().apply(PairingEvent::SocketClosed), done);
        assert_eq!(
            done.clone().apply(PairingEvent::SocketError("x".to_string())),
            done
        );
    }

    #[test]
    fn test_failed_is_terminal() {
        let failed = waiting().apply(PairingEvent::SocketClosed);
        let after = failed.clone().apply(PairingEvent::Completed {
            link_id: "late".to_string(),
        });
        assert_eq!(after, failed);
    }

    #[test]
    fn test_init_failure() {
        let state = PairingState::Idle
            .apply(PairingEvent::Start)
            .apply(PairingEvent::InitFailed("401".to_string()));
        assert_eq!(
            state,
            PairingState::Failed {
                reason: "401".to_string()
            }
        );
    }

    #[test]
    fn test_out_of_order_event_ignored() {
        let state = PairingState::Initializing.apply(PairingEvent::Completed {
            link_id: "x".to_string(),
        });
        assert_eq!(state, PairingState::Initializing);
    }

    #[test]
    fn test_parse_socket_messages() {
        assert_eq!(
            SocketMessage::parse_event(r#"{"type":"PAIRING_COMPLETED","linkId":"abc"}"#),
            Some(PairingEvent::Completed {
                link_id: "abc".to_string()
            })
        );
        assert!(matches!(
            SocketMessage::parse_event(r#"{"type":"PAIRING_FAILED"}"#),
            Some(PairingEvent::Rejected(_))
        ));
        assert_eq!(SocketMessage::parse_event(r#"{"type":"PING"}"#), None);
        assert_eq!(SocketMessage::parse_event("not json"), None);
    }

    #[test]
    fn test_state_wire_format() {
        let json = serde_json::to_value(PairingState::WaitingForCode {
            code: "1234".to_string(),
        })
        .unwrap();
        assert_eq!(json["status"], "waiting_for_code");
        assert_eq!(json["code"], "1234");
    }

    #[test]
    fn test_registry_lifecycle() {
        let registry = PairingRegistry::new();
        let id = registry.start();
        assert_eq!(registry.get(&id).unwrap().state, PairingState::Initializing);

        registry.apply(&id, PairingEvent::SocketClosed);
        assert!(matches!(
            registry.get(&id).unwrap().state,
            PairingState::Failed { .. }
        ));

        assert!(registry.remove(&id));
        assert!(registry.get(&id).is_none());
        assert!(registry.apply(&id, PairingEvent::SocketClosed).is_none());
    }

    fn insert_aged(registry: &PairingRegistry, id: &str, state: PairingState, age_minutes: i64) {
        registry.sessions.insert(
            id.to_string(),
            PairingSession {
                state,
                created_at: Utc::now() - chrono::Duration::minutes(age_minutes),
                cancel: None,
            },
        );
    }

    #[test]
    fn test_prune_stale_sessions() {
        let registry = PairingRegistry::new();
        let failed = || PairingState::Failed {
            reason: "x".to_string(),
        };
        insert_aged(&registry, "abandoned", PairingState::Initializing, 11);
        insert_aged(&registry, "starting", PairingState::Initializing, 1);
        insert_aged(&registry, "old-failed", failed(), 31);
        insert_aged(&registry, "recent-failed", failed(), 20);

        registry.prune_stale(Utc::now());

        assert!(registry.get("abandoned").is_none());
        assert!(registry.get("starting").is_some());
        assert!(registry.get("old-failed").is_none());
        assert!(registry.get("recent-failed").is_some());
    }

    #[tokio::test]
    async fn test_pruning_closes_listener_channel() {
        let registry = PairingRegistry::new();
        let (tx, rx) = oneshot::channel();
        insert_aged(
            &registry,
            "waiting",
            PairingState::WaitingForCode {
                code: "1234".to_string(),
            },
            11,
        );
        assert!(registry.attach_cancel("waiting", tx));

        registry.prune_stale(Utc::now());

        // Sender dropped with the session
        assert!(rx.await.is_err());
        assert!(registry.is_empty());
    }
}
