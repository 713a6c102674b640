use crate::cursor::{ReviewCursor, ReviewPhase};
use crate::ledger::{DecisionLedger, DecisionRecord};
use crate::prefetch::PrefetchWindow;
use crate::sink::SubmissionFilter;
use crate::{Asset, Decision, Item, ReviewTally, StatusEntry};
use tracing::warn;

/// One review pass over a fixed list of items.
///
/// Owns the items, the cursor, the decision ledger and the prefetch set.
/// Everything here is synchronous; the controller drives the async parts.
#[derive(Debug)]
pub struct Session<H> {
    items: Vec<Item>,
    cursor: ReviewCursor,
    ledger: DecisionLedger,
    resume_token: Option<String>,
    prefetch: PrefetchWindow<H>,
}

impl<H> Session<H> {
    pub fn new(
        assets: Vec<Asset>,
        resume_token: Option<String>,
        prefetch: PrefetchWindow<H>,
    ) -> Self {
        let items: Vec<Item> = assets.into_iter().map(Item::new).collect();
        Self {
            cursor: ReviewCursor::new(items.len()),
            items,
            ledger: DecisionLedger::new(),
            resume_token,
            prefetch,
        }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    /// The item under the cursor, `None` once complete.
    pub fn current(&self) -> Option<&Item> {
        self.items.get(self.cursor.position())
    }

    pub fn cursor(&self) -> &ReviewCursor {
        &self.cursor
    }

    pub fn ledger(&self) -> &DecisionLedger {
        &self.ledger
    }

    pub fn resume_token(&self) -> Option<&str> {
        self.resume_token.as_deref()
    }

    pub fn prefetch(&self) -> &PrefetchWindow<H> {
        &self.prefetch
    }

    pub fn prefetch_mut(&mut self) -> &mut PrefetchWindow<H> {
        &mut self.prefetch
    }

    pub fn phase(&self) -> ReviewPhase {
        self.cursor.phase()
    }

    pub fn is_complete(&self) -> bool {
        self.cursor.is_complete()
    }

    /// Apply `decision` to the current item and advance.
    ///
    /// Returns the committed record, or `None` when there is nothing left to
    /// decide.
    pub fn decide(&mut self, decision: Decision) -> Option<DecisionRecord> {
        let index = self.cursor.position();
        let item = self.items.get_mut(index)?;
        let previous_status = item.status;
        let new_status = decision.status();

        self.ledger.record(index, previous_status, new_status);
        item.status = new_status;
        self.cursor.advance();
        self.ledger.last().copied()
    }

    /// Revert the most recent decision.
    ///
    /// Works from the complete state too, re-entering review at the
    /// last-decided item.
    pub fn undo(&mut self) -> Option<DecisionRecord> {
        let record = self.ledger.undo()?;
        if let Err(err) = self.cursor.retreat(record.item_index) {
            warn!(error = %err, "undo record points outside the session");
            self.ledger
                .record(record.item_index, record.previous_status, record.new_status);
            return None;
        }
        self.items[record.item_index].status = record.previous_status;
        Some(record)
    }

    pub fn tally(&self) -> ReviewTally {
        ReviewTally::from_items(&self.items)
    }

    pub fn snapshot_statuses(&self) -> Vec<StatusEntry> {
        self.ledger.snapshot_statuses(&self.items)
    }

    /// Status entries selected for submission.
    pub fn submission_entries(&self, filter: SubmissionFilter) -> Vec<StatusEntry> {
        self.snapshot_statuses()
            .into_iter()
            .filter(|entry| filter.matches(entry.status))
            .collect()
    }

    /// Tear down the prefetch set, returning handles for release.
    pub fn into_handles(mut self) -> Vec<H> {
        self.prefetch.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ItemStatus;

    fn session(ids: &[&str]) -> Session<()> {
        let assets = ids.iter().map(|id| Asset::with_id(*id)).collect();
        Session::new(assets, Some("token".to_string()), PrefetchWindow::default())
    }

    #[test]
    fn decide_records_and_advances() {
        let mut s = session(&["a", "b"]);
        let record = s.decide(Decision::Reject).unwrap();
        assert_eq!(record.item_index, 0);
        assert_eq!(record.previous_status, ItemStatus::Undecided);
        assert_eq!(record.new_status, ItemStatus::Rejected);
        assert_eq!(s.cursor().position(), 1);
        assert_eq!(s.ledger().len(), 1);
        assert_eq!(s.current().map(Item::id), Some("b"));
    }

    #[test]
    fn decide_after_completion_is_a_no_op() {
        let mut s = session(&["a"]);
        s.decide(Decision::Approve);
        assert!(s.is_complete());
        assert!(s.decide(Decision::Reject).is_none());
        assert_eq!(s.ledger().len(), 1);
        assert_eq!(s.items()[0].status, ItemStatus::Approved);
    }

    #[test]
    fn undo_from_complete_reenters_review() {
        let mut s = session(&["a", "b"]);
        s.decide(Decision::Approve);
        s.decide(Decision::Reject);
        assert_eq!(s.phase(), ReviewPhase::Complete);

        let record = s.undo().unwrap();
        assert_eq!(record.item_index, 1);
        assert_eq!(s.phase(), ReviewPhase::InProgress);
        assert_eq!(s.items()[1].status, ItemStatus::Undecided);
        assert_eq!(s.items()[0].status, ItemStatus::Approved);
    }

    #[test]
    fn undo_with_empty_ledger_reports_nothing() {
        let mut s = session(&["a"]);
        assert!(s.undo().is_none());
        assert_eq!(s.cursor().position(), 0);
    }

    #[test]
    fn submission_entries_default_to_rejected() {
        let mut s = session(&["a", "b", "c"]);
        s.decide(Decision::Approve);
        s.decide(Decision::Reject);
        s.decide(Decision::Reject);

        let entries = s.submission_entries(SubmissionFilter::default());
        let ids: Vec<&str> = entries.iter().map(|e| e.file_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(s.resume_token(), Some("token"));
    }
}
