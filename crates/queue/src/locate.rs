//! Entry lookup within the live queue.
//!
//! Lookup results carry an explicit found/not-found tag. Position zero
//! is a perfectly good hit — never test the position itself for
//! truthiness, that silently loses the first entry in the queue.

use crate::entry::QueueEntry;

/// A successful lookup: where the entry sits and a borrow of it.
#[derive(Debug)]
pub struct Located<'a> {
    /// Index into the queued collection. Zero is valid.
    pub position: usize,
    pub entry: &'a QueueEntry,
}

/// Find a prompt among the queued entries.
///
/// The currently executing prompt is an ordinary queued member and is
/// found by this same search; there is no separate running collection.
pub fn locate<'a>(queued: &'a [QueueEntry], prompt_id: &str) -> Option<Located<'a>> {
    queued
        .iter()
        .position(|e| e.prompt_id == prompt_id)
        .map(|position| Located {
            position,
            entry: &queued[position],
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::QueueEntry;
    use std::collections::HashMap;

    fn entry(id: &str, number: i64) -> QueueEntry {
        QueueEntry {
            number,
            prompt_id: id.to_string(),
            inputs: serde_json::json!({}),
            extra_data: serde_json::json!({}),
            output_nodes: vec![],
            queued_at: None,
            finished_at: None,
            outputs: HashMap::new(),
        }
    }

    #[test]
    fn first_entry_is_found_at_position_zero() {
        let queued = vec![entry("head", 0), entry("tail", 1)];
        let hit = locate(&queued, "head").expect("position zero is a valid hit");
        assert_eq!(hit.position, 0);
        assert_eq!(hit.entry.prompt_id, "head");
    }

    #[test]
    fn later_entry_reports_its_position() {
        let queued = vec![entry("a", 0), entry("b", 1), entry("c", 2)];
        let hit = locate(&queued, "c").unwrap();
        assert_eq!(hit.position, 2);
    }

    #[test]
    fn missing_id_is_none_not_a_sentinel() {
        let queued = vec![entry("a", 0)];
        assert!(locate(&queued, "ghost").is_none());
    }

    #[test]
    fn empty_queue_finds_nothing() {
        assert!(locate(&[], "a").is_none());
    }
}
