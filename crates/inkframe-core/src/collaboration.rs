//! Collaboration management for real-time multi-user editing.
//!
//! Bridges a local [`Editor`] and the relay channel: committed local edits
//! are diffed into envelopes, and inbound envelopes are applied as remote
//! actions. Conflicts resolve as last-applier-wins.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::actions::Action;
use crate::reducer::Editor;
use crate::shapes::{Shape, ShapeId};
use crate::sync::{
    ClientMessage, CursorPosition, Envelope, Operation, Participant, ParticipantId, ServerMessage,
    SyncError,
};

/// Chat entries kept before the oldest are dropped.
pub const CHAT_LOG_LIMIT: usize = 200;

/// A received chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEntry {
    pub sender_id: ParticipantId,
    pub text: String,
}

/// What an inbound message did, for the host to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum CollabEvent {
    Joined { participant: Participant },
    ParticipantJoined(Participant),
    ParticipantLeft(ParticipantId),
    DocumentChanged,
    CursorMoved(ParticipantId),
    Chat(ChatEntry),
    Pong,
    Error(String),
}

/// Collaboration session state for one client.
#[derive(Debug, Default)]
pub struct CollaborationManager {
    local_id: Option<ParticipantId>,
    drawing_id: Option<String>,
    /// Participants in join order.
    roster: Vec<Participant>,
    cursors: HashMap<ParticipantId, CursorPosition>,
    chat: VecDeque<ChatEntry>,
    /// The document as peers last saw it from us.
    published: Arc<Vec<Shape>>,
    /// Pending outgoing messages (JSON strings).
    outgoing: Vec<String>,
}

impl CollaborationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id assigned by the server, once joined.
    pub fn local_id(&self) -> Option<ParticipantId> {
        self.local_id
    }

    pub fn drawing_id(&self) -> Option<&str> {
        self.drawing_id.as_deref()
    }

    pub fn is_in_room(&self) -> bool {
        self.local_id.is_some()
    }

    pub fn roster(&self) -> &[Participant] {
        &self.roster
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.roster.iter().find(|p| p.id == id)
    }

    /// Remote cursor positions.
    pub fn cursors(&self) -> &HashMap<ParticipantId, CursorPosition> {
        &self.cursors
    }

    /// Chat history, oldest first.
    pub fn chat_log(&self) -> impl Iterator<Item = &ChatEntry> {
        self.chat.iter()
    }

    // --- Room management ---

    /// Request to join a drawing's room. Queues the join message.
    pub fn join_room(&mut self, drawing_id: &str, name: &str) {
        self.drawing_id = Some(drawing_id.to_string());
        self.queue(&ClientMessage::Join {
            drawing_id: drawing_id.to_string(),
            name: name.to_string(),
        });
    }

    /// Leave the current room and forget its participants.
    pub fn leave_room(&mut self) {
        if self.drawing_id.take().is_some() {
            self.queue(&ClientMessage::Leave);
        }
        self.local_id = None;
        self.roster.clear();
        self.cursors.clear();
    }

    pub fn ping(&mut self) {
        self.queue(&ClientMessage::Ping);
    }

    /// Take pending outgoing messages (drains the queue).
    pub fn take_outgoing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outgoing)
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    // --- Outbound ---

    /// Dispatch a local action and publish the resulting document change.
    ///
    /// Returns whether the document changed.
    pub fn dispatch_local(&mut self, editor: &mut Editor, action: Action) -> bool {
        let commit = action.is_commit_point() || action.is_history_navigation();
        let changed = editor.dispatch(action);
        if commit {
            self.publish_changes(editor);
        }
        changed
    }

    /// Diff the editor against what was last published and queue the difference.
    pub fn publish_changes(&mut self, editor: &Editor) {
        let current = Arc::clone(&editor.state().shapes);
        if Arc::ptr_eq(&current, &self.published) || *current == *self.published {
            self.published = current;
            return;
        }
        let ops = diff_documents(&self.published, &current);
        self.published = current;
        for op in ops {
            self.publish(&op);
        }
    }

    /// Send the whole document to the room.
    pub fn publish_full_sync(&mut self, editor: &Editor) {
        self.published = Arc::clone(&editor.state().shapes);
        let op = Operation::FullSync(editor.shapes().to_vec());
        self.publish(&op);
    }

    /// Broadcast the local pointer. Best effort; nothing queues outside a room.
    pub fn set_cursor(&mut self, x: f64, y: f64) {
        self.publish(&Operation::CursorMove(CursorPosition { x, y }));
    }

    /// Send a chat message. It shows up in the log when the server echoes it.
    pub fn send_chat(&mut self, text: &str) {
        self.publish(&Operation::ChatMessage(text.to_string()));
    }

    fn publish(&mut self, op: &Operation) {
        let Some(local_id) = self.local_id else {
            return;
        };
        match Envelope::new(local_id, op) {
            Ok(envelope) => self.queue(&ClientMessage::Publish { envelope }),
            Err(e) => log::error!("failed to encode {:?}: {e}", op.kind()),
        }
    }

    fn queue(&mut self, msg: &ClientMessage) {
        match serde_json::to_string(msg) {
            Ok(json) => self.outgoing.push(json),
            Err(e) => log::error!("failed to serialize client message: {e}"),
        }
    }

    // --- Inbound ---

    /// Handle a message from the server.
    ///
    /// Malformed or invalid messages are logged and dropped.
    pub fn handle_message(&mut self, editor: &mut Editor, json: &str) -> Option<CollabEvent> {
        let msg: ServerMessage = match serde_json::from_str(json) {
            Ok(msg) => msg,
            Err(e) => {
                log::warn!("dropping malformed server message: {e}");
                return None;
            }
        };

        match msg {
            ServerMessage::Connected {
                participant,
                collaborators,
                snapshot,
            } => {
                log::info!(
                    "joined as {} with {} collaborator(s)",
                    participant.name,
                    collaborators.len()
                );
                self.local_id = Some(participant.id);
                self.roster = collaborators;
                self.cursors.clear();
                match snapshot {
                    Some(shapes) => match crate::shapes::validate_shapes(&shapes) {
                        Ok(()) => {
                            editor.apply_remote(Action::ReplaceAll(shapes));
                            self.published = Arc::clone(&editor.state().shapes);
                        }
                        Err(e) => log::warn!("dropping invalid room snapshot: {e}"),
                    },
                    // An empty room is seeded with whatever we already have.
                    None if !editor.shapes().is_empty() => self.publish_full_sync(editor),
                    None => self.published = Arc::clone(&editor.state().shapes),
                }
                Some(CollabEvent::Joined { participant })
            }
            ServerMessage::UserJoined {
                participant,
                collaborators,
            } => {
                self.roster = collaborators;
                if self.is_longest_present_other(participant.id) {
                    log::debug!("pushing full sync to {}", participant.name);
                    self.publish_full_sync(editor);
                }
                Some(CollabEvent::ParticipantJoined(participant))
            }
            ServerMessage::UserLeft {
                participant_id,
                collaborators,
            } => {
                self.roster = collaborators;
                self.cursors.remove(&participant_id);
                Some(CollabEvent::ParticipantLeft(participant_id))
            }
            ServerMessage::Relay { envelope } => self.handle_envelope(editor, &envelope),
            ServerMessage::Pong => Some(CollabEvent::Pong),
            ServerMessage::Error { message } => {
                log::error!("server error: {message}");
                Some(CollabEvent::Error(message))
            }
        }
    }

    fn handle_envelope(&mut self, editor: &mut Editor, envelope: &Envelope) -> Option<CollabEvent> {
        let own = self.local_id == Some(envelope.sender_id);
        if own && envelope.kind.is_document_op() {
            log::debug!("suppressing echo of {:?}", envelope.kind);
            return None;
        }

        let op = match envelope.operation() {
            Ok(op) => op,
            Err(e) => {
                log_rejected(envelope, &e);
                return None;
            }
        };

        match op {
            Operation::CursorMove(cursor) => {
                if own {
                    return None;
                }
                self.cursors.insert(envelope.sender_id, cursor);
                Some(CollabEvent::CursorMoved(envelope.sender_id))
            }
            Operation::ChatMessage(text) => {
                let entry = ChatEntry {
                    sender_id: envelope.sender_id,
                    text,
                };
                if self.chat.len() == CHAT_LOG_LIMIT {
                    self.chat.pop_front();
                }
                self.chat.push_back(entry.clone());
                Some(CollabEvent::Chat(entry))
            }
            op => {
                let mut published = (*self.published).clone();
                op.apply_to(&mut published);
                self.published = Arc::new(published);

                let action = op.into_action()?;
                editor
                    .apply_remote(action)
                    .then_some(CollabEvent::DocumentChanged)
            }
        }
    }

    /// Whether we are the first roster member other than `joiner`.
    fn is_longest_present_other(&self, joiner: ParticipantId) -> bool {
        let Some(local_id) = self.local_id else {
            return false;
        };
        self.roster
            .iter()
            .find(|p| p.id != joiner)
            .is_some_and(|p| p.id == local_id)
    }
}

fn log_rejected(envelope: &Envelope, error: &SyncError) {
    log::warn!(
        "dropping {:?} from {}: {error}",
        envelope.kind,
        envelope.sender_id
    );
}

/// Operations that turn `old` into `new`.
///
/// Falls back to a single full sync when paint order changed, since
/// individual adds always land on top.
fn diff_documents(old: &[Shape], new: &[Shape]) -> Vec<Operation> {
    let old_ids: HashSet<ShapeId> = old.iter().map(Shape::id).collect();
    let new_ids: HashSet<ShapeId> = new.iter().map(Shape::id).collect();

    let kept_old: Vec<ShapeId> = old
        .iter()
        .map(Shape::id)
        .filter(|id| new_ids.contains(id))
        .collect();
    let kept_new: Vec<ShapeId> = new
        .iter()
        .map(Shape::id)
        .filter(|id| old_ids.contains(id))
        .collect();
    let first_added = new.iter().position(|s| !old_ids.contains(&s.id()));
    let last_kept = new.iter().rposition(|s| old_ids.contains(&s.id()));
    let adds_on_top = match (first_added, last_kept) {
        (Some(added), Some(kept)) => added > kept,
        _ => true,
    };

    if kept_old != kept_new || !adds_on_top {
        return vec![Operation::FullSync(new.to_vec())];
    }

    let mut ops = Vec::new();
    let deleted: Vec<ShapeId> = old
        .iter()
        .map(Shape::id)
        .filter(|id| !new_ids.contains(id))
        .collect();
    if !deleted.is_empty() {
        ops.push(Operation::ShapeDelete(deleted));
    }

    let old_by_id: HashMap<ShapeId, &Shape> = old.iter().map(|s| (s.id(), s)).collect();
    for shape in new {
        match old_by_id.get(&shape.id()) {
            Some(previous) if *previous != shape => ops.push(Operation::ShapeUpdate(shape.clone())),
            Some(_) => {}
            None => ops.push(Operation::ShapeAdd(shape.clone())),
        }
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Circle, Rectangle};
    use crate::sync::OperationKind;
    use kurbo::{Point, Vec2};
    use uuid::Uuid;

    fn participant(name: &str) -> Participant {
        Participant {
            id: Uuid::new_v4(),
            name: name.to_string(),
            color: "#FF6B6B".to_string(),
        }
    }

    fn rect(x: f64) -> Shape {
        Shape::Rectangle(Rectangle::new(Point::new(x, 0.0), 10.0, 10.0))
    }

    fn connect(manager: &mut CollaborationManager, editor: &mut Editor, me: &Participant) {
        let msg = ServerMessage::Connected {
            participant: me.clone(),
            collaborators: vec![me.clone()],
            snapshot: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        manager.handle_message(editor, &json);
        manager.take_outgoing();
    }

    fn relay(sender: ParticipantId, op: Operation) -> String {
        let envelope = Envelope::new(sender, &op).unwrap();
        serde_json::to_string(&ServerMessage::Relay { envelope }).unwrap()
    }

    fn published(manager: &mut CollaborationManager) -> Vec<Envelope> {
        manager
            .take_outgoing()
            .iter()
            .filter_map(|json| match serde_json::from_str(json).unwrap() {
                ClientMessage::Publish { envelope } => Some(envelope),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_join_room_queues_message() {
        let mut manager = CollaborationManager::new();
        manager.join_room("drawing-1", "Ada");
        let out = manager.take_outgoing();
        assert_eq!(out.len(), 1);
        assert!(out[0].contains("\"type\":\"join\""));
        assert!(!manager.has_outgoing());
        assert_eq!(manager.drawing_id(), Some("drawing-1"));
        assert!(!manager.is_in_room());
    }

    #[test]
    fn test_leave_room_resets_session() {
        let mut manager = CollaborationManager::new();
        let mut editor = Editor::default();
        let me = participant("me");
        manager.join_room("drawing-1", "me");
        connect(&mut manager, &mut editor, &me);

        manager.leave_room();
        let out = manager.take_outgoing();
        assert_eq!(out.len(), 1);
        assert!(out[0].contains("\"type\":\"leave\""));
        assert!(!manager.is_in_room());
        assert!(manager.roster().is_empty());

        manager.leave_room();
        assert!(!manager.has_outgoing());
    }

    #[test]
    fn test_own_echo_is_suppressed() {
        let mut manager = CollaborationManager::new();
        let mut editor = Editor::default();
        let me = participant("me");
        connect(&mut manager, &mut editor, &me);

        let before = editor.shapes().to_vec();
        let event = manager.handle_message(&mut editor, &relay(me.id, Operation::ShapeAdd(rect(0.0))));
        assert!(event.is_none());
        assert_eq!(editor.shapes(), before.as_slice());
    }

    #[test]
    fn test_remote_add_skips_history() {
        let mut manager = CollaborationManager::new();
        let mut editor = Editor::default();
        connect(&mut manager, &mut editor, &participant("me"));

        let other = Uuid::new_v4();
        let event = manager.handle_message(&mut editor, &relay(other, Operation::ShapeAdd(rect(5.0))));
        assert_eq!(event, Some(CollabEvent::DocumentChanged));
        assert_eq!(editor.shapes().len(), 1);
        assert!(!editor.state().history.can_undo());
        // Remote changes are not re-published.
        manager.publish_changes(&editor);
        assert!(!manager.has_outgoing());
    }

    #[test]
    fn test_invalid_payload_dropped() {
        let mut manager = CollaborationManager::new();
        let mut editor = Editor::default();
        connect(&mut manager, &mut editor, &participant("me"));

        let mut circle = Circle::new(Point::ZERO, 5.0);
        circle.radius = f64::NAN;
        let json = relay(Uuid::new_v4(), Operation::ShapeAdd(Shape::Circle(circle)));
        assert!(manager.handle_message(&mut editor, &json).is_none());
        assert!(editor.shapes().is_empty());
        assert!(manager.handle_message(&mut editor, "{not json").is_none());
    }

    #[test]
    fn test_dispatch_local_publishes_diff() {
        let mut manager = CollaborationManager::new();
        let mut editor = Editor::default();
        let me = participant("me");
        connect(&mut manager, &mut editor, &me);

        let shape = rect(0.0);
        let id = shape.id();
        assert!(manager.dispatch_local(&mut editor, Action::AddShape(shape)));
        let sent = published(&mut manager);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, OperationKind::ShapeAdd);
        assert_eq!(sent[0].sender_id, me.id);

        // A drag is published once history is saved.
        manager.dispatch_local(&mut editor, Action::Select(vec![id]));
        manager.dispatch_local(&mut editor, Action::MoveSelected(Vec2::new(5.0, 0.0)));
        assert!(!manager.has_outgoing());
        manager.dispatch_local(&mut editor, Action::SaveHistory);
        let sent = published(&mut manager);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, OperationKind::ShapeUpdate);

        manager.dispatch_local(&mut editor, Action::DeleteSelected);
        let sent = published(&mut manager);
        assert_eq!(sent[0].kind, OperationKind::ShapeDelete);
    }

    #[test]
    fn test_reorder_publishes_full_sync() {
        let mut manager = CollaborationManager::new();
        let mut editor = Editor::default();
        connect(&mut manager, &mut editor, &participant("me"));

        let a = rect(0.0);
        let b = rect(50.0);
        let a_id = a.id();
        manager.dispatch_local(&mut editor, Action::AddShape(a));
        manager.dispatch_local(&mut editor, Action::AddShape(b));
        manager.take_outgoing();

        manager.dispatch_local(&mut editor, Action::Select(vec![a_id]));
        manager.dispatch_local(&mut editor, Action::BringToFront);
        let sent = published(&mut manager);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, OperationKind::FullSync);
    }

    #[test]
    fn test_connected_snapshot_replaces_document() {
        let mut manager = CollaborationManager::new();
        let mut editor = Editor::default();
        editor.dispatch(Action::AddShape(rect(0.0)));

        let me = participant("me");
        let remote = vec![rect(100.0), rect(200.0)];
        let msg = ServerMessage::Connected {
            participant: me.clone(),
            collaborators: vec![participant("first"), me.clone()],
            snapshot: Some(remote.clone()),
        };
        let event = manager.handle_message(&mut editor, &serde_json::to_string(&msg).unwrap());
        assert_eq!(event, Some(CollabEvent::Joined { participant: me.clone() }));
        assert_eq!(editor.shapes(), remote.as_slice());
        assert_eq!(manager.local_id(), Some(me.id));
        assert_eq!(manager.roster().len(), 2);
        assert!(!manager.has_outgoing());
    }

    #[test]
    fn test_first_participant_pushes_full_sync_on_join() {
        let mut manager = CollaborationManager::new();
        let mut editor = Editor::default();
        let me = participant("me");
        connect(&mut manager, &mut editor, &me);
        manager.dispatch_local(&mut editor, Action::AddShape(rect(0.0)));
        manager.take_outgoing();

        let newcomer = participant("new");
        let msg = ServerMessage::UserJoined {
            participant: newcomer.clone(),
            collaborators: vec![me.clone(), newcomer.clone()],
        };
        manager.handle_message(&mut editor, &serde_json::to_string(&msg).unwrap());
        let sent = published(&mut manager);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, OperationKind::FullSync);

        // A later participant stays quiet.
        let mut second = CollaborationManager::new();
        let mut second_editor = Editor::default();
        let other = participant("other");
        connect(&mut second, &mut second_editor, &other);
        let msg = ServerMessage::UserJoined {
            participant: newcomer.clone(),
            collaborators: vec![me, other, newcomer],
        };
        second.handle_message(&mut second_editor, &serde_json::to_string(&msg).unwrap());
        assert!(!second.has_outgoing());
    }

    #[test]
    fn test_chat_echo_and_cursor() {
        let mut manager = CollaborationManager::new();
        let mut editor = Editor::default();
        let me = participant("me");
        connect(&mut manager, &mut editor, &me);

        manager.send_chat("hi all");
        assert_eq!(published(&mut manager)[0].kind, OperationKind::ChatMessage);
        assert_eq!(manager.chat_log().count(), 0);

        manager.handle_message(&mut editor, &relay(me.id, Operation::ChatMessage("hi all".into())));
        assert_eq!(manager.chat_log().count(), 1);

        let other = Uuid::new_v4();
        let cursor = Operation::CursorMove(CursorPosition { x: 3.0, y: 4.0 });
        assert_eq!(
            manager.handle_message(&mut editor, &relay(other, cursor)),
            Some(CollabEvent::CursorMoved(other))
        );
        assert_eq!(manager.cursors()[&other], CursorPosition { x: 3.0, y: 4.0 });

        let left = ServerMessage::UserLeft {
            participant_id: other,
            collaborators: vec![me],
        };
        manager.handle_message(&mut editor, &serde_json::to_string(&left).unwrap());
        assert!(manager.cursors().is_empty());
    }

    #[test]
    fn test_chat_log_is_bounded() {
        let mut manager = CollaborationManager::new();
        let mut editor = Editor::default();
        let sender = Uuid::new_v4();
        for i in 0..CHAT_LOG_LIMIT + 5 {
            manager.handle_message(&mut editor, &relay(sender, Operation::ChatMessage(format!("m{i}"))));
        }
        assert_eq!(manager.chat_log().count(), CHAT_LOG_LIMIT);
        assert_eq!(manager.chat_log().next().unwrap().text, "m5");
    }

    #[test]
    fn test_outside_room_publishes_nothing() {
        let mut manager = CollaborationManager::new();
        let mut editor = Editor::default();
        manager.dispatch_local(&mut editor, Action::AddShape(rect(0.0)));
        manager.set_cursor(1.0, 1.0);
        assert!(!manager.has_outgoing());
    }
}
