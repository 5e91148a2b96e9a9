//! Contact directory: the known peers plus the latest search results.
//!
//! The contact set only grows while a session lives. Merging is keyed by
//! peer id, so adding the same peer twice never yields two entries.
//! Search results are transient: they are replaced by each new search
//! and cleared when one of them is selected.

use std::collections::HashSet;
use tandem_chat_types::{Peer, UserId};

/// Known peers and transient search results.
#[derive(Debug, Default)]
pub struct ContactDirectory {
    /// Contacts in the order they were first seen.
    contacts: Vec<Peer>,
    /// Ids present in `contacts`.
    index: HashSet<UserId>,
    /// Results of the latest search.
    search_results: Vec<Peer>,
}

impl ContactDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contact set with the server's list, dropping duplicate ids.
    pub fn load(&mut self, contacts: impl IntoIterator<Item = Peer>) {
        self.contacts.clear();
        self.index.clear();
        for peer in contacts {
            self.merge(peer);
        }
    }

    /// Add a peer unless its id is already present.
    ///
    /// Returns `true` if the peer was added.
    pub fn merge(&mut self, peer: Peer) -> bool {
        if !self.index.insert(peer.id.clone()) {
            return false;
        }
        self.contacts.push(peer);
        true
    }

    /// Whether a peer with this id is a contact.
    pub fn contains(&self, id: &UserId) -> bool {
        self.index.contains(id)
    }

    /// Contacts in display order.
    pub fn contacts(&self) -> &[Peer] {
        &self.contacts
    }

    /// Find a contact by id.
    pub fn find(&self, id: &UserId) -> Option<&Peer> {
        self.contacts.iter().find(|p| &p.id == id)
    }

    /// Number of contacts.
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    /// Whether there are no contacts.
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Start a new search.
    ///
    /// A blank query leaves the current results untouched and returns
    /// `None`. Otherwise the old results are cleared and the trimmed query
    /// is returned for the remote lookup.
    pub fn begin_search<'q>(&mut self, query: &'q str) -> Option<&'q str> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        self.search_results.clear();
        Some(query)
    }

    /// Store the results of a completed search.
    pub fn set_search_results(&mut self, results: Vec<Peer>) {
        self.search_results = results;
    }

    /// Results of the latest search.
    pub fn search_results(&self) -> &[Peer] {
        &self.search_results
    }

    /// Take one search result by id, clearing all results.
    ///
    /// Returns `None` (and keeps the results) if the id is not among them.
    pub fn take_search_result(&mut self, id: &UserId) -> Option<Peer> {
        let peer = self.search_results.iter().find(|p| &p.id == id).cloned()?;
        self.search_results.clear();
        Some(peer)
    }

    /// Clear the search results.
    pub fn clear_search_results(&mut self) {
        self.search_results.clear();
    }

    /// Drop all contacts and results (logout).
    pub fn reset(&mut self) {
        self.contacts.clear();
        self.index.clear();
        self.search_results.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bob() -> Peer {
        Peer::new("u2", "bob")
    }

    fn robert() -> Peer {
        Peer::new("u9", "robert9")
    }

    // ===========================================
    // Contact Set Tests
    // ===========================================

    #[test]
    fn merge_is_idempotent_by_id() {
        let mut dir = ContactDirectory::new();
        assert!(dir.merge(bob()));
        assert!(!dir.merge(bob()));
        // Same id, different name: still a duplicate
        assert!(!dir.merge(Peer::new("u2", "bobby")));

        assert_eq!(dir.len(), 1);
        assert_eq!(dir.contacts()[0].display_name, "bob");
    }

    #[test]
    fn load_preserves_order_and_dedupes() {
        let mut dir = ContactDirectory::new();
        dir.load(vec![robert(), bob(), robert()]);

        let ids: Vec<&str> = dir.contacts().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["u9", "u2"]);
    }

    #[test]
    fn load_replaces_previous_contacts() {
        let mut dir = ContactDirectory::new();
        dir.merge(bob());
        dir.load(vec![robert()]);

        assert!(!dir.contains(&UserId::from("u2")));
        assert!(dir.contains(&UserId::from("u9")));
    }

    #[test]
    fn find_by_id() {
        let mut dir = ContactDirectory::new();
        dir.merge(bob());
        assert_eq!(dir.find(&UserId::from("u2")), Some(&bob()));
        assert!(dir.find(&UserId::from("nope")).is_none());
    }

    // ===========================================
    // Search Result Tests
    // ===========================================

    #[test]
    fn blank_query_keeps_existing_results() {
        let mut dir = ContactDirectory::new();
        dir.set_search_results(vec![robert()]);

        assert!(dir.begin_search("   ").is_none());
        assert!(dir.begin_search("").is_none());
        assert_eq!(dir.search_results(), &[robert()]);
    }

    #[test]
    fn new_search_clears_old_results_and_trims() {
        let mut dir = ContactDirectory::new();
        dir.set_search_results(vec![bob()]);

        assert_eq!(dir.begin_search("  robert "), Some("robert"));
        assert!(dir.search_results().is_empty());
    }

    #[test]
    fn take_search_result_clears_results() {
        let mut dir = ContactDirectory::new();
        dir.set_search_results(vec![robert(), bob()]);

        let taken = dir.take_search_result(&UserId::from("u9"));
        assert_eq!(taken, Some(robert()));
        assert!(dir.search_results().is_empty());
    }

    #[test]
    fn take_unknown_search_result_keeps_results() {
        let mut dir = ContactDirectory::new();
        dir.set_search_results(vec![robert()]);

        assert!(dir.take_search_result(&UserId::from("zzz")).is_none());
        assert_eq!(dir.search_results().len(), 1);
    }

    #[test]
    fn reset_clears_everything() {
        let mut dir = ContactDirectory::new();
        dir.merge(bob());
        dir.set_search_results(vec![robert()]);

        dir.reset();

        assert!(dir.is_empty());
        assert!(!dir.contains(&UserId::from("u2")));
        assert!(dir.search_results().is_empty());
    }
}
