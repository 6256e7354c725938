//! Undo/redo history as immutable document snapshots plus a cursor.

use crate::shapes::Shape;
use std::sync::Arc;

/// Default number of snapshots kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Snapshot history. Index 0 is the oldest retained snapshot.
///
/// Starts with a single empty snapshot. `cursor` always points at the
/// snapshot matching the current document after a commit or restore.
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    snapshots: Vec<Arc<Vec<Shape>>>,
    cursor: usize,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl History {
    /// Empty history holding one empty snapshot. `limit` is at least 1.
    pub fn new(limit: usize) -> Self {
        Self {
            snapshots: vec![Arc::new(Vec::new())],
            cursor: 0,
            limit: limit.max(1),
        }
    }

    /// Append `shapes` after the cursor, dropping any redo tail and evicting
    /// the oldest snapshot once over the limit.
    pub fn commit(&mut self, shapes: Arc<Vec<Shape>>) {
        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push(shapes);
        if self.snapshots.len() > self.limit {
            let excess = self.snapshots.len() - self.limit;
            self.snapshots.drain(..excess);
        }
        self.cursor = self.snapshots.len() - 1;
    }

    /// Step back. Returns the snapshot to restore, or `None` at the oldest.
    pub fn undo(&mut self) -> Option<Arc<Vec<Shape>>> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        self.current()
    }

    /// Step forward. Returns the snapshot to restore, or `None` at the newest.
    pub fn redo(&mut self) -> Option<Arc<Vec<Shape>>> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        self.current()
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    /// Snapshot at the cursor.
    pub fn current(&self) -> Option<Arc<Vec<Shape>>> {
        self.snapshots.get(self.cursor).cloned()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}
