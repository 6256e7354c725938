//! Drawing rooms: roster, cached document and the per-room broadcast channel.

use dashmap::DashMap;
use inkframe_core::shapes::{self, Shape};
use inkframe_core::sync::{
    palette_color, Envelope, Operation, OperationKind, Participant, ParticipantId, ServerMessage,
    SyncError,
};
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

pub const CHANNEL_CAPACITY: usize = 256;
/// Longest display name kept, in characters.
pub const MAX_NAME_LEN: usize = 50;
pub const DEFAULT_NAME: &str = "Anonymous";

/// A message fanned out to a room.
#[derive(Debug, Clone)]
pub struct RoomEvent {
    pub from: ParticipantId,
    /// Deliver to the originating connection as well.
    pub include_sender: bool,
    pub message: ServerMessage,
}

impl RoomEvent {
    pub fn is_for(&self, participant: ParticipantId) -> bool {
        self.include_sender || self.from != participant
    }
}

struct Room {
    tx: broadcast::Sender<RoomEvent>,
    /// Participants in join order.
    participants: Vec<Participant>,
    /// Last known document, kept current from relayed operations.
    snapshot: Option<Vec<Shape>>,
    /// Joins so far, for palette assignment.
    joins: usize,
}

impl Room {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            participants: Vec::new(),
            snapshot: None,
            joins: 0,
        }
    }

    fn send(&self, from: ParticipantId, include_sender: bool, message: ServerMessage) {
        // No receivers just means nobody else is listening.
        let _ = self.tx.send(RoomEvent {
            from,
            include_sender,
            message,
        });
    }
}

/// What a joining connection needs.
pub struct JoinTicket {
    pub participant: Participant,
    pub welcome: ServerMessage,
    pub events: broadcast::Receiver<RoomEvent>,
}

/// Shared server state.
#[derive(Default)]
pub struct AppState {
    rooms: DashMap<String, Room>,
}

fn clean_name(name: &str) -> String {
    let trimmed: String = name.trim().chars().take(MAX_NAME_LEN).collect();
    if trimmed.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        trimmed
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Add a participant and announce them to the room.
    pub fn join(&self, drawing_id: &str, name: &str) -> JoinTicket {
        let mut room = self
            .rooms
            .entry(drawing_id.to_string())
            .or_insert_with(Room::new);
        let participant = Participant {
            id: Uuid::new_v4(),
            name: clean_name(name),
            color: palette_color(room.joins).to_string(),
        };
        room.joins += 1;
        room.participants.push(participant.clone());
        let events = room.tx.subscribe();
        let collaborators = room.participants.clone();

        room.send(
            participant.id,
            false,
            ServerMessage::UserJoined {
                participant: participant.clone(),
                collaborators: collaborators.clone(),
            },
        );
        info!(
            "{} ({}) joined {drawing_id}, {} present",
            participant.name,
            participant.id,
            collaborators.len()
        );

        let welcome = ServerMessage::Connected {
            participant: participant.clone(),
            collaborators,
            snapshot: room.snapshot.clone(),
        };
        JoinTicket {
            participant,
            welcome,
            events,
        }
    }

    /// Remove a participant. Empty rooms are dropped.
    pub fn leave(&self, drawing_id: &str, participant_id: ParticipantId) {
        let Some(mut room) = self.rooms.get_mut(drawing_id) else {
            return;
        };
        room.participants.retain(|p| p.id != participant_id);
        if room.participants.is_empty() {
            drop(room);
            self.rooms.remove(drawing_id);
            info!("room {drawing_id} closed");
            return;
        }
        let collaborators = room.participants.clone();
        room.send(
            participant_id,
            false,
            ServerMessage::UserLeft {
                participant_id,
                collaborators,
            },
        );
        info!("{participant_id} left {drawing_id}");
    }

    /// Validate and relay an envelope from `sender`.
    ///
    /// The sender id is taken from the connection, never from the payload.
    /// Document operations also update the room's cached snapshot.
    pub fn publish(
        &self,
        drawing_id: &str,
        sender: ParticipantId,
        mut envelope: Envelope,
    ) -> Result<(), SyncError> {
        envelope.sender_id = sender;
        let op = envelope.operation()?;

        let Some(mut room) = self.rooms.get_mut(drawing_id) else {
            return Err(SyncError::NotConnected);
        };
        if let Operation::ShapeAdd(shape) | Operation::ShapeUpdate(shape) = &op {
            let current = room.snapshot.as_deref().unwrap_or_default();
            shapes::check_placement(current, shape).map_err(SyncError::InvalidShape)?;
        }
        if !matches!(op, Operation::CursorMove(_) | Operation::ChatMessage(_)) {
            let snapshot = room.snapshot.get_or_insert_with(Vec::new);
            op.apply_to(snapshot);
            debug!(
                "{drawing_id} snapshot now {} shapes after {:?}",
                snapshot.len(),
                envelope.kind
            );
        }
        let echo = envelope.kind == OperationKind::ChatMessage;
        room.send(sender, echo, ServerMessage::Relay { envelope });
        Ok(())
    }

    #[cfg(test)]
    fn snapshot(&self, drawing_id: &str) -> Option<Vec<Shape>> {
        self.rooms.get(drawing_id)?.snapshot.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkframe_core::shapes::Rectangle;
    use kurbo::Point;

    fn rect() -> Shape {
        Shape::Rectangle(Rectangle::new(Point::ZERO, 10.0, 10.0))
    }

    fn drain(rx: &mut broadcast::Receiver<RoomEvent>, me: ParticipantId) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if event.is_for(me) {
                out.push(event.message);
            }
        }
        out
    }

    #[test]
    fn test_join_assigns_palette_colors() {
        let state = AppState::new();
        let a = state.join("d", "Ada");
        let b = state.join("d", "  ");
        assert_eq!(a.participant.color, "#FF6B6B");
        assert_eq!(b.participant.color, "#4ECDC4");
        assert_eq!(b.participant.name, DEFAULT_NAME);

        match b.welcome {
            ServerMessage::Connected {
                collaborators,
                snapshot,
                ..
            } => {
                assert_eq!(collaborators.len(), 2);
                assert_eq!(collaborators[0].id, a.participant.id);
                assert!(snapshot.is_none());
            }
            other => panic!("unexpected welcome {other:?}"),
        }
    }

    #[test]
    fn test_join_and_leave_are_announced() {
        let state = AppState::new();
        let mut a = state.join("d", "Ada");
        let b = state.join("d", "Bob");

        let seen = drain(&mut a.events, a.participant.id);
        assert!(matches!(
            &seen[..],
            [ServerMessage::UserJoined { participant, .. }] if participant.id == b.participant.id
        ));

        state.leave("d", b.participant.id);
        let seen = drain(&mut a.events, a.participant.id);
        assert!(matches!(
            &seen[..],
            [ServerMessage::UserLeft { collaborators, .. }] if collaborators.len() == 1
        ));

        state.leave("d", a.participant.id);
        assert_eq!(state.room_count(), 0);
    }

    #[test]
    fn test_relay_skips_sender_except_chat() {
        let state = AppState::new();
        let mut a = state.join("d", "Ada");
        let mut b = state.join("d", "Bob");
        drain(&mut a.events, a.participant.id);

        let add = Envelope::new(Uuid::new_v4(), &Operation::ShapeAdd(rect())).unwrap();
        state.publish("d", a.participant.id, add).unwrap();
        assert!(drain(&mut a.events, a.participant.id).is_empty());
        match &drain(&mut b.events, b.participant.id)[..] {
            [ServerMessage::Relay { envelope }] => {
                // The claimed sender is replaced by the connection's id.
                assert_eq!(envelope.sender_id, a.participant.id);
            }
            other => panic!("unexpected {other:?}"),
        }

        let chat = Envelope::new(a.participant.id, &Operation::ChatMessage("hi".into())).unwrap();
        state.publish("d", a.participant.id, chat).unwrap();
        assert_eq!(drain(&mut a.events, a.participant.id).len(), 1);
        assert_eq!(drain(&mut b.events, b.participant.id).len(), 1);
    }

    #[test]
    fn test_snapshot_follows_document_ops() {
        let state = AppState::new();
        let a = state.join("d", "Ada");
        let shape = rect();
        let id = shape.id();

        let sync = Envelope::new(a.participant.id, &Operation::FullSync(vec![shape])).unwrap();
        state.publish("d", a.participant.id, sync).unwrap();
        let cursor = Envelope::new(
            a.participant.id,
            &Operation::CursorMove(inkframe_core::sync::CursorPosition { x: 1.0, y: 2.0 }),
        )
        .unwrap();
        state.publish("d", a.participant.id, cursor).unwrap();
        assert_eq!(state.snapshot("d").map(|s| s.len()), Some(1));

        let late = state.join("d", "Late");
        assert!(matches!(
            late.welcome,
            ServerMessage::Connected { snapshot: Some(ref s), .. } if s.len() == 1
        ));

        let delete = Envelope::new(a.participant.id, &Operation::ShapeDelete(vec![id])).unwrap();
        state.publish("d", a.participant.id, delete).unwrap();
        assert_eq!(state.snapshot("d"), Some(vec![]));
    }

    #[test]
    fn test_colliding_ids_not_relayed() {
        let state = AppState::new();
        let a = state.join("d", "Ada");
        let mut b = state.join("d", "Bob");
        let child = rect();
        let group = Shape::Group(inkframe_core::shapes::Group::from_world(vec![child.clone()]));

        let add = Envelope::new(a.participant.id, &Operation::ShapeAdd(group.clone())).unwrap();
        state.publish("d", a.participant.id, add).unwrap();
        drain(&mut b.events, b.participant.id);

        let clash = Envelope::new(a.participant.id, &Operation::ShapeAdd(child)).unwrap();
        assert!(matches!(
            state.publish("d", a.participant.id, clash),
            Err(SyncError::InvalidShape(_))
        ));
        assert_eq!(state.snapshot("d"), Some(vec![group]));
        assert!(drain(&mut b.events, b.participant.id).is_empty());
    }

    #[test]
    fn test_invalid_envelope_rejected() {
        let state = AppState::new();
        let a = state.join("d", "Ada");
        let bad = Envelope {
            sender_id: a.participant.id,
            kind: OperationKind::ShapeAdd,
            payload: serde_json::json!({ "shape": 42 }),
        };
        assert!(state.publish("d", a.participant.id, bad).is_err());
        assert!(state.snapshot("d").is_none());

        let ok = Envelope::new(a.participant.id, &Operation::ShapeAdd(rect())).unwrap();
        assert!(matches!(
            state.publish("missing", a.participant.id, ok),
            Err(SyncError::NotConnected)
        ));
    }
}
