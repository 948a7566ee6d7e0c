use std::collections::HashSet;

use sha2::{Digest, Sha256};

use crate::hierarchy::UiElement;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenChange {
    Unchanged,
    Changed,
}

/// Per-screen state carried across scan cycles.
#[derive(Debug, Clone, Default)]
pub struct ScreenSession {
    last_hash: Option<String>,
    processed: HashSet<String>,
}

impl ScreenSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compares the hierarchy's content hash with the previous cycle. A new
    /// hash forgets which fields were handled; an equal one changes nothing.
    pub fn observe(&mut self, raw_hierarchy: &str) -> ScreenChange {
        let hash = content_hash(raw_hierarchy);
        if self.last_hash.as_deref() == Some(hash.as_str()) {
            return ScreenChange::Unchanged;
        }
        self.last_hash = Some(hash);
        self.processed.clear();
        ScreenChange::Changed
    }

    pub fn is_processed(&self, key: &str) -> bool {
        self.processed.contains(key)
    }

    pub fn mark_processed(&mut self, key: String) {
        self.processed.insert(key);
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    pub fn last_hash(&self) -> Option<&str> {
        self.last_hash.as_deref()
    }
}

pub fn content_hash(raw: &str) -> String {
    format!("{:x}", Sha256::digest(raw.as_bytes()))
}

pub fn field_key(element: &UiElement) -> String {
    format!("{}-{}", element.bounds, element.resource_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_screen_keeps_processed_fields() {
        let mut session = ScreenSession::new();
        assert_eq!(session.observe("screen-a"), ScreenChange::Changed);
        session.mark_processed("[0,0][10,10]-id/a".to_string());

        assert_eq!(session.observe("screen-a"), ScreenChange::Unchanged);
        assert!(session.is_processed("[0,0][10,10]-id/a"));
        assert_eq!(session.processed_count(), 1);
    }

    #[test]
    fn changed_screen_clears_processed_fields() {
        let mut session = ScreenSession::new();
        session.observe("screen-a");
        session.mark_processed("k".to_string());
        let first = session.last_hash().map(str::to_string);

        assert_eq!(session.observe("screen-b"), ScreenChange::Changed);
        assert!(!session.is_processed("k"));
        assert_ne!(session.last_hash().map(str::to_string), first);

        assert_eq!(session.observe("screen-a"), ScreenChange::Changed);
    }

    #[test]
    fn keys_combine_bounds_and_id() {
        let element = UiElement {
            bounds: "[100,200][300,250]".to_string(),
            resource_id: "com.example.shop:id/email_input".to_string(),
            ..UiElement::default()
        };
        assert_eq!(
            field_key(&element),
            "[100,200][300,250]-com.example.shop:id/email_input"
        );
        assert_eq!(content_hash("abc").len(), 64);
        assert_eq!(content_hash("abc"), content_hash("abc"));
    }
}
