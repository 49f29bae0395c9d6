//! Dedup/merge of freshly generated opportunities into the retained book.
//!
//! The book is newest-first, keyed by opportunity id, and capped. A merge
//! only ever prepends genuinely new items; previously retained items keep
//! their relative order and the oldest fall off the end when the cap is
//! exceeded.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::types::Opportunity;

/// Default number of opportunities retained.
pub const DEFAULT_BOOK_CAP: usize = 50;

/// Bounded, newest-first collection of opportunities with unique ids.
///
/// Cloning is cheap: the items are shared until the next merge that
/// actually changes something.
#[derive(Debug, Clone)]
pub struct OpportunityBook {
    items: Arc<Vec<Opportunity>>,
    cap: usize,
}

/// Result of merging one batch.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// The updated book. Shares storage with the input when nothing was new.
    pub book: OpportunityBook,
    /// Batch items whose id was not already retained, in batch order.
    pub new_items: Vec<Opportunity>,
}

impl OpportunityBook {
    pub fn new(cap: usize) -> Self {
        Self {
            items: Arc::new(Vec::new()),
            cap: cap.max(1),
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn items(&self) -> &[Opportunity] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Opportunity> {
        self.items.iter().find(|o| o.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Whether both books share the same storage (no-op merge).
    pub fn same_as(&self, other: &OpportunityBook) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
    }

    /// Merge a batch into the book.
    ///
    /// Items already retained, and repeats within the batch, are dropped.
    /// An empty batch or one with nothing new returns this book unchanged.
    pub fn merge(&self, batch: Vec<Opportunity>) -> MergeOutcome {
        let mut seen: HashSet<&str> = self.items.iter().map(|o| o.id.as_str()).collect();
        let mut fresh_ids: Vec<String> = Vec::new();

        for opp in &batch {
            if seen.insert(opp.id.as_str()) {
                fresh_ids.push(opp.id.clone());
            }
        }
        drop(seen);

        if fresh_ids.is_empty() {
            return MergeOutcome {
                book: self.clone(),
                new_items: Vec::new(),
            };
        }

        let fresh: HashSet<String> = fresh_ids.into_iter().collect();
        let mut taken: HashSet<String> = HashSet::with_capacity(fresh.len());
        let new_items: Vec<Opportunity> = batch
            .into_iter()
            .filter(|o| fresh.contains(&o.id) && taken.insert(o.id.clone()))
            .collect();

        let mut combined = Vec::with_capacity((new_items.len() + self.items.len()).min(self.cap));
        combined.extend(new_items.iter().cloned());
        combined.extend(self.items.iter().cloned());
        let dropped = combined.len().saturating_sub(self.cap);
        combined.truncate(self.cap);

        debug!(
            new = new_items.len(),
            retained = combined.len(),
            evicted = dropped,
            "Opportunities merged"
        );

        MergeOutcome {
            book: OpportunityBook {
                items: Arc::new(combined),
                cap: self.cap,
            },
            new_items,
        }
    }
}

impl Default for OpportunityBook {
    fn default() -> Self {
        Self::new(DEFAULT_BOOK_CAP)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests::sample_opportunity;

    fn opp(id: &str) -> Opportunity {
        sample_opportunity(id, "EUR/USD")
    }

    fn ids(book: &OpportunityBook) -> Vec<&str> {
        book.items().iter().map(|o| o.id.as_str()).collect()
    }

    #[test]
    fn test_empty_batch_is_identity() {
        let book = OpportunityBook::new(50).merge(vec![opp("a")]).book;
        let out = book.merge(Vec::new());
        assert!(out.new_items.is_empty());
        assert!(out.book.same_as(&book));
    }

    #[test]
    fn test_all_known_batch_is_identity() {
        let book = OpportunityBook::new(50).merge(vec![opp("a"), opp("b")]).book;
        let out = book.merge(vec![opp("b"), opp("a")]);
        assert!(out.new_items.is_empty());
        assert!(out.book.same_as(&book));
    }

    #[test]
    fn test_new_items_prepended_newest_first() {
        let book = OpportunityBook::new(50).merge(vec![opp("a"), opp("b")]).book;
        let out = book.merge(vec![opp("c"), opp("a"), opp("d")]);
        let new_ids: Vec<&str> = out.new_items.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(new_ids, vec!["c", "d"]);
        assert_eq!(ids(&out.book), vec!["c", "d", "a", "b"]);
    }

    #[test]
    fn test_duplicates_within_batch_collapse() {
        let out = OpportunityBook::new(50).merge(vec![opp("x"), opp("x"), opp("y")]);
        assert_eq!(out.new_items.len(), 2);
        assert_eq!(ids(&out.book), vec!["x", "y"]);
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let mut book = OpportunityBook::new(3);
        for id in ["a", "b", "c"] {
            book = book.merge(vec![opp(id)]).book;
        }
        assert_eq!(ids(&book), vec!["c", "b", "a"]);

        let out = book.merge(vec![opp("d")]);
        assert_eq!(ids(&out.book), vec!["d", "c", "b"]);
        assert!(!out.book.contains("a"));
    }

    #[test]
    fn test_never_exceeds_cap_and_ids_stay_unique() {
        let mut book = OpportunityBook::new(DEFAULT_BOOK_CAP);
        for round in 0..40 {
            let batch = (0..3).map(|i| opp(&format!("r{}-{i}", round % 25))).collect();
            book = book.merge(batch).book;
            assert!(book.len() <= DEFAULT_BOOK_CAP);
            let unique: HashSet<&str> = book.items().iter().map(|o| o.id.as_str()).collect();
            assert_eq!(unique.len(), book.len());
        }
        assert_eq!(book.len(), DEFAULT_BOOK_CAP);
    }

    #[test]
    fn test_preserves_relative_order_of_retained() {
        let mut book = OpportunityBook::new(10);
        for id in ["a", "b", "c", "d"] {
            book = book.merge(vec![opp(id)]).book;
        }
        let before: Vec<String> = book.items().iter().map(|o| o.id.clone()).collect();
        let out = book.merge(vec![opp("e"), opp("f")]);
        let after: Vec<&str> = out.book.items().iter().skip(2).map(|o| o.id.as_str()).collect();
        assert_eq!(after, before.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn test_batch_larger_than_cap_still_reports_all_new() {
        let out = OpportunityBook::new(2).merge(vec![opp("a"), opp("b"), opp("c")]);
        assert_eq!(out.new_items.len(), 3);
        assert_eq!(ids(&out.book), vec!["a", "b"]);
    }

    #[test]
    fn test_get_by_id() {
        let book = OpportunityBook::default().merge(vec![opp("a")]).book;
        assert_eq!(book.get("a").map(|o| o.pair.as_str()), Some("EUR/USD"));
        assert!(book.get("zzz").is_none());
        assert_eq!(book.cap(), DEFAULT_BOOK_CAP);
    }
}
