//! Collaboration wire protocol and the native WebSocket client.
//!
//! Document changes travel as [`Envelope`]s: a sender id, an operation kind
//! and a JSON payload. The relay server wraps them in [`ServerMessage`]s.

use crate::actions::Action;
use crate::shapes::{self, Shape, ShapeId, ValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Identifier the relay server assigns to each connection.
pub type ParticipantId = Uuid;

/// Longest accepted chat message, in characters.
pub const MAX_CHAT_LENGTH: usize = 2000;

/// Display colors handed to participants in join order.
pub const PALETTE: [&str; 10] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEAA7", "#DDA0DD", "#98D8C8", "#F7DC6F",
    "#BB8FCE", "#85C1E9",
];

/// Round-robin palette color for the `index`-th join.
pub fn palette_color(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

/// Errors from encoding, decoding or transporting collaboration messages.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid shape in payload: {0}")]
    InvalidShape(#[from] ValidationError),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("invalid WebSocket URL: {0}")]
    InvalidUrl(String),
    #[error("already connected")]
    AlreadyConnected,
    #[error("not connected")]
    NotConnected,
    #[error("connection closed")]
    ChannelClosed,
}

/// A collaborator as announced by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    /// `#rrggbb` display color.
    pub color: String,
}

/// A remote pointer position in document space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}

/// Kind tag carried by every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    ShapeAdd,
    ShapeUpdate,
    ShapeDelete,
    FullSync,
    CursorMove,
    ChatMessage,
}

impl OperationKind {
    /// Whether operations of this kind change the document.
    pub fn is_document_op(self) -> bool {
        matches!(
            self,
            OperationKind::ShapeAdd
                | OperationKind::ShapeUpdate
                | OperationKind::ShapeDelete
                | OperationKind::FullSync
        )
    }
}

/// The unit relayed between participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub sender_id: ParticipantId,
    pub kind: OperationKind,
    pub payload: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
struct ShapePayload {
    shape: Shape,
}

#[derive(Serialize, Deserialize)]
struct DeletePayload {
    shape_ids: Vec<ShapeId>,
}

#[derive(Serialize, Deserialize)]
struct SyncPayload {
    shapes: Vec<Shape>,
}

#[derive(Serialize, Deserialize)]
struct ChatPayload {
    message: String,
}

/// A decoded, validated envelope payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    ShapeAdd(Shape),
    ShapeUpdate(Shape),
    ShapeDelete(Vec<ShapeId>),
    FullSync(Vec<Shape>),
    CursorMove(CursorPosition),
    ChatMessage(String),
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::ShapeAdd(_) => OperationKind::ShapeAdd,
            Operation::ShapeUpdate(_) => OperationKind::ShapeUpdate,
            Operation::ShapeDelete(_) => OperationKind::ShapeDelete,
            Operation::FullSync(_) => OperationKind::FullSync,
            Operation::CursorMove(_) => OperationKind::CursorMove,
            Operation::ChatMessage(_) => OperationKind::ChatMessage,
        }
    }

    /// The reducer action a document operation maps to.
    pub fn into_action(self) -> Option<Action> {
        match self {
            Operation::ShapeAdd(shape) => Some(Action::AddShape(shape)),
            Operation::ShapeUpdate(shape) => Some(Action::UpdateShape(shape)),
            Operation::ShapeDelete(ids) => Some(Action::DeleteShapes(ids)),
            Operation::FullSync(shapes) => Some(Action::ReplaceAll(shapes)),
            Operation::CursorMove(_) | Operation::ChatMessage(_) => None,
        }
    }

    /// Apply a document operation to a plain shape list. Returns whether it applied.
    pub fn apply_to(&self, doc: &mut Vec<Shape>) -> bool {
        if let Operation::ShapeAdd(shape) | Operation::ShapeUpdate(shape) = self {
            if let Err(e) = shapes::check_placement(doc, shape) {
                log::warn!("not applying {:?} of {}: {e}", self.kind(), shape.id());
                return false;
            }
        }
        match self {
            Operation::ShapeAdd(shape) => {
                match doc.iter_mut().find(|s| s.id() == shape.id()) {
                    Some(existing) => *existing = shape.clone(),
                    None => doc.push(shape.clone()),
                }
                true
            }
            Operation::ShapeUpdate(shape) => match doc.iter_mut().find(|s| s.id() == shape.id()) {
                Some(existing) => {
                    *existing = shape.clone();
                    true
                }
                None => false,
            },
            Operation::ShapeDelete(ids) => {
                let before = doc.len();
                doc.retain(|s| !ids.contains(&s.id()));
                doc.len() != before
            }
            Operation::FullSync(shapes) => {
                *doc = shapes.clone();
                true
            }
            Operation::CursorMove(_) | Operation::ChatMessage(_) => false,
        }
    }
}

impl Envelope {
    /// Encode `op` from `sender_id`.
    pub fn new(sender_id: ParticipantId, op: &Operation) -> Result<Self, SyncError> {
        let payload = match op {
            Operation::ShapeAdd(shape) | Operation::ShapeUpdate(shape) => {
                serde_json::to_value(ShapePayload {
                    shape: shape.clone(),
                })?
            }
            Operation::ShapeDelete(ids) => serde_json::to_value(DeletePayload {
                shape_ids: ids.clone(),
            })?,
            Operation::FullSync(shapes) => serde_json::to_value(SyncPayload {
                shapes: shapes.clone(),
            })?,
            Operation::CursorMove(cursor) => serde_json::to_value(cursor)?,
            Operation::ChatMessage(message) => serde_json::to_value(ChatPayload {
                message: message.clone(),
            })?,
        };
        Ok(Self {
            sender_id,
            kind: op.kind(),
            payload,
        })
    }

    /// Decode and validate the payload.
    pub fn operation(&self) -> Result<Operation, SyncError> {
        let payload = self.payload.clone();
        let op = match self.kind {
            OperationKind::ShapeAdd => {
                let ShapePayload { shape } = serde_json::from_value(payload)?;
                shapes::validate_shapes(std::slice::from_ref(&shape))?;
                Operation::ShapeAdd(shape)
            }
            OperationKind::ShapeUpdate => {
                let ShapePayload { shape } = serde_json::from_value(payload)?;
                shapes::validate_shapes(std::slice::from_ref(&shape))?;
                Operation::ShapeUpdate(shape)
            }
            OperationKind::ShapeDelete => {
                let DeletePayload { shape_ids } = serde_json::from_value(payload)?;
                Operation::ShapeDelete(shape_ids)
            }
            OperationKind::FullSync => {
                let SyncPayload { shapes } = serde_json::from_value(payload)?;
                shapes::validate_shapes(&shapes)?;
                Operation::FullSync(shapes)
            }
            OperationKind::CursorMove => {
                let cursor: CursorPosition = serde_json::from_value(payload)?;
                if !cursor.x.is_finite() || !cursor.y.is_finite() {
                    return Err(SyncError::InvalidPayload("non-finite cursor".into()));
                }
                Operation::CursorMove(cursor)
            }
            OperationKind::ChatMessage => {
                let ChatPayload { message } = serde_json::from_value(payload)?;
                let length = message.chars().count();
                if message.trim().is_empty() || length > MAX_CHAT_LENGTH {
                    return Err(SyncError::InvalidPayload(format!(
                        "chat message length {length}"
                    )));
                }
                Operation::ChatMessage(message)
            }
        };
        Ok(op)
    }
}

/// Messages sent to the relay server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join the room of a drawing.
    Join { drawing_id: String, name: String },
    /// Leave the current room.
    Leave,
    /// Relay an envelope to the room. The server overwrites `sender_id`.
    Publish { envelope: Envelope },
    Ping,
}

/// Messages received from the relay server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Join confirmed. `snapshot` is the room's last known document.
    Connected {
        participant: Participant,
        collaborators: Vec<Participant>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        snapshot: Option<Vec<Shape>>,
    },
    UserJoined {
        participant: Participant,
        collaborators: Vec<Participant>,
    },
    UserLeft {
        participant_id: ParticipantId,
        collaborators: Vec<Participant>,
    },
    Relay { envelope: Envelope },
    Pong,
    Error { message: String },
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events from the WebSocket client.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Connected,
    Disconnected,
    /// A text frame from the server.
    Message(String),
    Error(String),
}

mod native_client {
    use super::*;
    use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tungstenite::{connect, Message};
    use url::Url;

    /// Commands sent to the WebSocket thread.
    enum WsCommand {
        Send(String),
        Close,
    }

    /// Blocking WebSocket client driven from a background thread.
    ///
    /// Events are queued by the thread and collected with `poll_events`.
    pub struct NativeWebSocket {
        state: ConnectionState,
        events: Vec<SyncEvent>,
        cmd_tx: Option<Sender<WsCommand>>,
        event_rx: Option<Receiver<SyncEvent>>,
        _thread: Option<JoinHandle<()>>,
    }

    impl NativeWebSocket {
        pub fn new() -> Self {
            Self {
                state: ConnectionState::Disconnected,
                events: Vec::new(),
                cmd_tx: None,
                event_rx: None,
                _thread: None,
            }
        }

        /// Start connecting to a `ws://` or `wss://` URL.
        pub fn connect(&mut self, url: &str) -> Result<(), SyncError> {
            if self.cmd_tx.is_some() {
                return Err(SyncError::AlreadyConnected);
            }

            let parsed = Url::parse(url).map_err(|e| SyncError::InvalidUrl(e.to_string()))?;
            if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
                return Err(SyncError::InvalidUrl(format!(
                    "unsupported scheme {}",
                    parsed.scheme()
                )));
            }

            self.state = ConnectionState::Connecting;
            let (cmd_tx, cmd_rx) = channel::<WsCommand>();
            let (event_tx, event_rx) = channel::<SyncEvent>();
            let url = parsed.to_string();

            let handle = thread::spawn(move || run_socket(&url, cmd_rx, event_tx));

            self.cmd_tx = Some(cmd_tx);
            self.event_rx = Some(event_rx);
            self._thread = Some(handle);
            Ok(())
        }

        pub fn disconnect(&mut self) {
            if let Some(tx) = self.cmd_tx.take() {
                let _ = tx.send(WsCommand::Close);
            }
            self.event_rx = None;
            self._thread = None;
            self.state = ConnectionState::Disconnected;
        }

        /// Queue a text frame.
        pub fn send(&self, msg: &str) -> Result<(), SyncError> {
            let tx = self.cmd_tx.as_ref().ok_or(SyncError::NotConnected)?;
            tx.send(WsCommand::Send(msg.to_string()))
                .map_err(|_| SyncError::ChannelClosed)
        }

        /// Serialize and queue a client message.
        pub fn send_message(&self, msg: &ClientMessage) -> Result<(), SyncError> {
            let json = serde_json::to_string(msg)?;
            self.send(&json)
        }

        /// Drain pending events without blocking.
        pub fn poll_events(&mut self) -> Vec<SyncEvent> {
            if let Some(rx) = &self.event_rx {
                while let Ok(event) = rx.try_recv() {
                    match &event {
                        SyncEvent::Connected => self.state = ConnectionState::Connected,
                        SyncEvent::Disconnected => self.state = ConnectionState::Disconnected,
                        SyncEvent::Error(_) => self.state = ConnectionState::Error,
                        SyncEvent::Message(_) => {}
                    }
                    self.events.push(event);
                }
            }
            std::mem::take(&mut self.events)
        }

        pub fn state(&self) -> ConnectionState {
            self.state
        }

        pub fn is_connected(&self) -> bool {
            self.state == ConnectionState::Connected
        }
    }

    fn run_socket(url: &str, cmd_rx: Receiver<WsCommand>, event_tx: Sender<SyncEvent>) {
        log::info!("connecting to {url}");
        let (mut socket, response) = match connect(url) {
            Ok(pair) => pair,
            Err(e) => {
                log::error!("WebSocket connection failed: {e}");
                let _ = event_tx.send(SyncEvent::Error(format!("connection failed: {e}")));
                return;
            }
        };
        log::info!("WebSocket connected, status: {}", response.status());
        let _ = event_tx.send(SyncEvent::Connected);

        // A short read timeout keeps the loop responsive to outgoing commands.
        match socket.get_mut() {
            tungstenite::stream::MaybeTlsStream::Plain(tcp) => {
                let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
                let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
            }
            #[allow(unreachable_patterns)]
            _ => log::debug!("non-plain stream, using default timeouts"),
        }

        loop {
            match cmd_rx.try_recv() {
                Ok(WsCommand::Send(msg)) => {
                    if let Err(e) = socket.send(Message::Text(msg)) {
                        log::error!("WebSocket send error: {e}");
                        break;
                    }
                }
                Ok(WsCommand::Close) => {
                    let _ = socket.close(None);
                    break;
                }
                Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }

            match socket.read() {
                Ok(Message::Text(txt)) => {
                    let _ = event_tx.send(SyncEvent::Message(txt));
                }
                Ok(Message::Ping(data)) => {
                    let _ = socket.send(Message::Pong(data));
                }
                Ok(Message::Close(_)) => {
                    log::info!("server closed the connection");
                    break;
                }
                Ok(_) => {}
                Err(tungstenite::Error::Io(ref e))
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => {
                    log::error!("WebSocket read error: {e}");
                    break;
                }
            }
        }

        let _ = event_tx.send(SyncEvent::Disconnected);
    }

    impl Default for NativeWebSocket {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Drop for NativeWebSocket {
        fn drop(&mut self) {
            self.disconnect();
        }
    }
}

pub use native_client::NativeWebSocket;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Circle, Rectangle};
    use kurbo::Point;
    use serde_json::json;

    #[test]
    fn test_envelope_shape_add() {
        let shape = Shape::Rectangle(Rectangle::new(Point::new(1.0, 2.0), 3.0, 4.0));
        let sender = Uuid::new_v4();
        let envelope = Envelope::new(sender, &Operation::ShapeAdd(shape.clone())).unwrap();
        assert_eq!(envelope.kind, OperationKind::ShapeAdd);
        assert_eq!(envelope.payload["shape"]["type"], "rectangle");

        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"kind\":\"shape_add\""));
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.operation().unwrap(), Operation::ShapeAdd(shape));
    }

    #[test]
    fn test_malformed_payload_rejected() {
        let envelope = Envelope {
            sender_id: Uuid::new_v4(),
            kind: OperationKind::ShapeAdd,
            payload: json!({ "shape": { "type": "circle" } }),
        };
        assert!(matches!(envelope.operation(), Err(SyncError::Json(_))));

        let mut shape = Circle::new(Point::ZERO, 5.0);
        shape.radius = -1.0;
        let envelope = Envelope::new(Uuid::new_v4(), &Operation::ShapeUpdate(Shape::Circle(shape))).unwrap();
        assert!(matches!(envelope.operation(), Err(SyncError::InvalidShape(_))));
    }

    #[test]
    fn test_full_sync_rejects_duplicate_ids() {
        let shape = Shape::Circle(Circle::new(Point::ZERO, 5.0));
        let envelope = Envelope::new(
            Uuid::new_v4(),
            &Operation::FullSync(vec![shape.clone(), shape]),
        )
        .unwrap();
        assert!(envelope.operation().is_err());
    }

    #[test]
    fn test_chat_and_cursor_validation() {
        let sender = Uuid::new_v4();
        let ok = Envelope::new(sender, &Operation::ChatMessage("hello".into())).unwrap();
        assert_eq!(ok.payload, json!({ "message": "hello" }));
        assert!(ok.operation().is_ok());

        let blank = Envelope::new(sender, &Operation::ChatMessage("   ".into())).unwrap();
        assert!(matches!(blank.operation(), Err(SyncError::InvalidPayload(_))));

        let cursor = Envelope {
            sender_id: sender,
            kind: OperationKind::CursorMove,
            payload: json!({ "x": 1.5, "y": -2 }),
        };
        assert_eq!(
            cursor.operation().unwrap(),
            Operation::CursorMove(CursorPosition { x: 1.5, y: -2.0 })
        );
    }

    #[test]
    fn test_operation_into_action() {
        let ids = vec![Uuid::new_v4()];
        assert_eq!(
            Operation::ShapeDelete(ids.clone()).into_action(),
            Some(Action::DeleteShapes(ids))
        );
        assert!(Operation::ChatMessage("x".into()).into_action().is_none());
        assert!(OperationKind::FullSync.is_document_op());
        assert!(!OperationKind::CursorMove.is_document_op());
    }

    #[test]
    fn test_apply_to_plain_document() {
        let mut doc = Vec::new();
        let shape = Shape::Circle(Circle::new(Point::ZERO, 5.0));
        assert!(Operation::ShapeAdd(shape.clone()).apply_to(&mut doc));
        assert!(Operation::ShapeAdd(shape.clone()).apply_to(&mut doc));
        assert_eq!(doc.len(), 1);
        assert!(!Operation::ShapeUpdate(Shape::Circle(Circle::new(Point::ZERO, 1.0))).apply_to(&mut doc));
        assert!(Operation::ShapeDelete(vec![shape.id()]).apply_to(&mut doc));
        assert!(doc.is_empty());
    }

    #[test]
    fn test_apply_to_rejects_ids_taken_by_group_children() {
        let child = Shape::Circle(Circle::new(Point::ZERO, 5.0));
        let group = Shape::Group(shapes::Group::from_world(vec![child.clone()]));
        let mut doc = vec![group.clone()];

        assert!(!Operation::ShapeAdd(child.clone()).apply_to(&mut doc));
        let adopter = Shape::Group(shapes::Group::from_world(vec![child]));
        assert!(!Operation::ShapeUpdate(adopter).apply_to(&mut doc));
        assert_eq!(doc, vec![group]);
        assert!(shapes::validate_shapes(&doc).is_ok());
    }

    #[test]
    fn test_client_message_serialize() {
        let msg = ClientMessage::Join {
            drawing_id: "d1".into(),
            name: "Ada".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"join\""));
        assert!(json.contains("d1"));
        let ping: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(ping, ClientMessage::Ping);
    }

    #[test]
    fn test_server_message_deserialize() {
        let id = Uuid::new_v4();
        let json = format!(
            r##"{{"type":"connected","participant":{{"id":"{id}","name":"Ada","color":"#FF6B6B"}},"collaborators":[]}}"##
        );
        match serde_json::from_str::<ServerMessage>(&json).unwrap() {
            ServerMessage::Connected {
                participant,
                snapshot,
                ..
            } => {
                assert_eq!(participant.id, id);
                assert!(snapshot.is_none());
            }
            other => panic!("wrong message type: {other:?}"),
        }
    }

    #[test]
    fn test_palette_wraps() {
        assert_eq!(palette_color(0), "#FF6B6B");
        assert_eq!(palette_color(10), palette_color(0));
        assert_eq!(palette_color(13), "#96CEB4");
    }

    #[test]
    fn test_client_requires_ws_url() {
        let mut client = NativeWebSocket::new();
        assert!(matches!(client.connect("http://localhost"), Err(SyncError::InvalidUrl(_))));
        assert!(matches!(client.connect("not a url"), Err(SyncError::InvalidUrl(_))));
        assert!(matches!(client.send("x"), Err(SyncError::NotConnected)));
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(client.poll_events().is_empty());
    }
}
