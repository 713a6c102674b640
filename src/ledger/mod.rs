use crate::{Item, ItemStatus, StatusEntry};

/// One committed decision, enough to revert it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionRecord {
    pub item_index: usize,
    pub previous_status: ItemStatus,
    pub new_status: ItemStatus,
}

/// Ordered history of decisions enabling undo.
///
/// Records are appended on every decision and popped in LIFO order, so the
/// ledger length always equals the number of committed advances.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecisionLedger {
    records: Vec<DecisionRecord>,
}

impl DecisionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record for the item at `index`.
    pub fn record(&mut self, index: usize, previous_status: ItemStatus, new_status: ItemStatus) {
        self.records.push(DecisionRecord {
            item_index: index,
            previous_status,
            new_status,
        });
    }

    /// Pop the most recent record.
    ///
    /// Returns `None` when there is nothing to undo. The caller restores
    /// `previous_status` and moves the cursor back to `item_index`.
    pub fn undo(&mut self) -> Option<DecisionRecord> {
        self.records.pop()
    }

    pub fn last(&self) -> Option<&DecisionRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `{id, status}` for every item, in session order.
    pub fn snapshot_statuses(&self, items: &[Item]) -> Vec<StatusEntry> {
        items
            .iter()
            .map(|item| StatusEntry {
                file_id: item.id().to_string(),
                status: item.status,
            })
            .collect()
    }
}
