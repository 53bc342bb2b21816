//! Per-participant conversation history.
//!
//! Held in process memory only, partitioned by chat id so concurrent
//! participants never contend. Empty turns are filtered on write and on
//! read-merge; the store trims to the most recent N user/assistant pairs.

use std::collections::HashMap;
use std::sync::Mutex;

use homemind_core::message::ChatMessage;

/// In-memory history store.
pub struct HistoryStore {
    histories: Mutex<HashMap<i64, Vec<ChatMessage>>>,
    max_pairs: usize,
}

impl HistoryStore {
    pub fn new(max_pairs: usize) -> Self {
        Self {
            histories: Mutex::new(HashMap::new()),
            max_pairs,
        }
    }

    /// History for a participant, empty turns filtered out.
    pub fn get(&self, chat_id: i64) -> Vec<ChatMessage> {
        self.histories
            .lock()
            .unwrap()
            .get(&chat_id)
            .map(|history| {
                history
                    .iter()
                    .filter(|m| m.is_substantive())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Replace a participant's history, filtering empty turns and trimming
    /// to the most recent pairs.
    pub fn set(&self, chat_id: i64, history: Vec<ChatMessage>) {
        let mut filtered: Vec<ChatMessage> = history
            .into_iter()
            .filter(ChatMessage::is_substantive)
            .collect();
        let max_messages = self.max_pairs * 2;
        if filtered.len() > max_messages {
            filtered.drain(..filtered.len() - max_messages);
        }
        self.histories.lock().unwrap().insert(chat_id, filtered);
    }

    /// Forget a participant's history.
    pub fn clear(&self, chat_id: i64) {
        self.histories.lock().unwrap().remove(&chat_id);
    }

    /// Number of stored messages for a participant.
    pub fn len(&self, chat_id: i64) -> usize {
        self.histories
            .lock()
            .unwrap()
            .get(&chat_id)
            .map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_turns_filtered_on_write() {
        let store = HistoryStore::new(10);
        store.set(
            1,
            vec![
                ChatMessage::user("hello"),
                ChatMessage::assistant("   "),
                ChatMessage::assistant("hi"),
            ],
        );
        assert_eq!(store.len(1), 2);
    }

    #[test]
    fn test_trims_to_recent_pairs() {
        let store = HistoryStore::new(2);
        let mut history = Vec::new();
        for i in 0..6 {
            history.push(ChatMessage::user(format!("question {i}")));
            history.push(ChatMessage::assistant(format!("answer {i}")));
        }
        store.set(1, history);
        let kept = store.get(1);
        assert_eq!(kept.len(), 4);
        assert_eq!(kept[0].text(), "question 4");
        assert_eq!(kept[3].text(), "answer 5");
    }

    #[test]
    fn test_partitioned_by_participant() {
        let store = HistoryStore::new(10);
        store.set(1, vec![ChatMessage::user("from one")]);
        store.set(2, vec![ChatMessage::user("from two")]);
        store.clear(1);
        assert_eq!(store.len(1), 0);
        assert_eq!(store.len(2), 1);
    }
}
