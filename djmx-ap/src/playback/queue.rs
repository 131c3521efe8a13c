//! Playback queue
//!
//! Ordered list of items plus the index of the current one. Items are never
//! edited in place; only their positions change as content is inserted.

use djmx_common::types::QueueItem;

/// Queue contents and current position
#[derive(Debug, Clone, Default)]
pub struct PlaybackQueue {
    items: Vec<QueueItem>,
    current_index: usize,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all items and rewind to the first
    pub fn set(&mut self, items: Vec<QueueItem>) {
        self.items = items;
        self.current_index = 0;
    }

    /// Add items at the tail
    pub fn append(&mut self, items: Vec<QueueItem>) {
        self.items.extend(items);
    }

    /// Insert items directly after the current one, keeping their order
    ///
    /// On an empty queue this behaves like `append`.
    pub fn insert_after_current(&mut self, items: Vec<QueueItem>) {
        if self.items.is_empty() {
            self.items = items;
            return;
        }
        let at = self.current_index + 1;
        self.items.splice(at..at, items);
    }

    /// Move to `index`; returns false (and changes nothing) when out of bounds
    pub fn set_current(&mut self, index: usize) -> bool {
        if index >= self.items.len() {
            return false;
        }
        self.current_index = index;
        true
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current(&self) -> Option<&QueueItem> {
        self.items.get(self.current_index)
    }

    /// Item after the current one
    pub fn peek_next(&self) -> Option<&QueueItem> {
        self.items.get(self.current_index + 1)
    }

    pub fn has_next(&self) -> bool {
        self.current_index + 1 < self.items.len()
    }

    pub fn get(&self, index: usize) -> Option<&QueueItem> {
        self.items.get(index)
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use djmx_common::types::{QueueItemKind, QueueItemMetadata};

    fn item(id: &str) -> QueueItem {
        QueueItem {
            id: id.to_string(),
            kind: QueueItemKind::CatalogTrack,
            audio_url: format!("https://cdn.test/{}.mp3", id),
            metadata: QueueItemMetadata {
                title: id.to_uppercase(),
                ..Default::default()
            },
            duration_seconds: 30.0,
        }
    }

    fn ids(queue: &PlaybackQueue) -> Vec<&str> {
        queue.items().iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_new_queue_is_empty() {
        let queue = PlaybackQueue::new();
        assert!(queue.is_empty());
        assert!(queue.current().is_none());
        assert!(!queue.has_next());
    }

    #[test]
    fn test_set_rewinds() {
        let mut queue = PlaybackQueue::new();
        queue.set(vec![item("a"), item("b"), item("c")]);
        assert!(queue.set_current(2));

        queue.set(vec![item("x"), item("y")]);
        assert_eq!(queue.current_index(), 0);
        assert_eq!(queue.current().unwrap().id, "x");
        assert_eq!(queue.peek_next().unwrap().id, "y");
    }

    #[test]
    fn test_set_current_out_of_bounds_is_rejected() {
        let mut queue = PlaybackQueue::new();
        queue.set(vec![item("a"), item("b")]);
        assert!(queue.set_current(1));

        assert!(!queue.set_current(2));
        assert_eq!(queue.current_index(), 1);
        assert!(!queue.has_next());
    }

    #[test]
    fn test_insert_after_current_preserves_order() {
        let mut queue = PlaybackQueue::new();
        queue.set(vec![item("a"), item("b"), item("c")]);
        queue.set_current(1);

        queue.insert_after_current(vec![item("intro"), item("song"), item("outro")]);
        assert_eq!(ids(&queue), vec!["a", "b", "intro", "song", "outro", "c"]);
        assert_eq!(queue.current().unwrap().id, "b");
        assert_eq!(queue.peek_next().unwrap().id, "intro");
    }

    #[test]
    fn test_insert_into_empty_queue() {
        let mut queue = PlaybackQueue::new();
        queue.insert_after_current(vec![item("intro")]);
        assert_eq!(ids(&queue), vec!["intro"]);
        assert_eq!(queue.current_index(), 0);
    }

    #[test]
    fn test_append() {
        let mut queue = PlaybackQueue::new();
        queue.set(vec![item("a")]);
        queue.append(vec![item("b"), item("c")]);
        assert_eq!(ids(&queue), vec!["a", "b", "c"]);
        assert!(queue.has_next());
    }
}
