use std::collections::HashSet;

use super::types::ChatEntry;

/// 配信済みコメントIDの記録
///
/// ポーリング窓が重なると同じアクションが再送されるため、ここで重複を弾く。
/// セッション中は削除しない（チャット量は配信時間で上限がある）。
#[derive(Debug, Default)]
pub struct DedupTracker {
    delivered: HashSet<String>,
}

impl DedupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 未配信ならIDを記録してtrue、配信済みならfalse
    pub fn accept(&mut self, entry: &ChatEntry) -> bool {
        self.accept_id(entry.id())
    }

    pub fn accept_id(&mut self, id: &str) -> bool {
        if self.delivered.contains(id) {
            return false;
        }
        self.delivered.insert(id.to_string())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.delivered.contains(id)
    }

    pub fn len(&self) -> usize {
        self.delivered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delivered.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::youtube::types::{Author, ChatRecord, Thumbnails};

    fn entry(id: &str) -> ChatEntry {
        ChatEntry::Chat(ChatRecord {
            id: id.to_string(),
            author: Author {
                id: String::new(),
                name: "user".to_string(),
                thumbnails: Thumbnails::default(),
            },
            message: "hi".to_string(),
            message_spans: vec![],
            emotes: vec![],
            badges: vec![],
            timestamp_usec: 0,
        })
    }

    #[test]
    fn test_accept_twice() {
        let mut tracker = DedupTracker::new();
        let chat = entry("a1");
        assert!(tracker.accept(&chat));
        assert!(!tracker.accept(&chat));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_distinct_ids() {
        let mut tracker = DedupTracker::new();
        assert!(tracker.is_empty());
        for id in ["a1", "a2", "a3"] {
            assert!(tracker.accept(&entry(id)));
        }
        assert!(tracker.contains("a2"));
        assert!(!tracker.contains("a4"));
        assert!(!tracker.accept_id("a3"));
        assert_eq!(tracker.len(), 3);
    }
}
