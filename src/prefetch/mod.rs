use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use tracing::debug;

pub const DEFAULT_BUFFER_SIZE: usize = 3;
pub const DEFAULT_RETAIN_SLACK: usize = 3;

/// Identifies one preparation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrepareTicket(u64);

/// Preparation state of one item's presentation asset.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetState<H> {
    Pending(PrepareTicket),
    Ready(H),
    /// Preparation failed; the item is shown with an error placeholder.
    Unavailable(String),
}

impl<H> AssetState<H> {
    pub fn is_pending(&self) -> bool {
        matches!(self, AssetState::Pending(_))
    }

    pub fn ticket(&self) -> Option<PrepareTicket> {
        match self {
            AssetState::Pending(ticket) => Some(*ticket),
            _ => None,
        }
    }

    /// The owned handle, if this state holds one.
    pub fn into_handle(self) -> Option<H> {
        match self {
            AssetState::Ready(handle) => Some(handle),
            _ => None,
        }
    }
}

/// Ask the caller to prepare the asset for `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrepareRequest {
    pub index: usize,
    pub ticket: PrepareTicket,
}

/// Result of a reconcile pass.
#[derive(Debug)]
pub struct Reconciliation<H> {
    /// Missing targets, closest to the cursor first.
    pub requests: Vec<PrepareRequest>,
    /// Handles that fell out of range; the caller must release them.
    pub evicted: Vec<H>,
}

/// What happened to a finished preparation.
#[derive(Debug, PartialEq)]
pub enum Completion<H> {
    Ready,
    Unavailable(String),
    /// No pending slot matched the ticket. A handle, if any, must be released.
    Discarded(Option<H>),
}

/// Window of prepared assets around the review cursor.
///
/// Only does bookkeeping: it hands out [`PrepareRequest`]s for the caller to
/// run, accepts their outcomes through [`PrefetchWindow::complete`], and
/// returns evicted or stale handles for release. An outcome whose ticket no
/// longer matches a pending slot is discarded.
#[derive(Debug)]
pub struct PrefetchWindow<H> {
    buffer_size: usize,
    retain_slack: usize,
    entries: BTreeMap<usize, AssetState<H>>,
    next_ticket: u64,
    cursor: usize,
    len: usize,
}

impl<H> Default for PrefetchWindow<H> {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE, DEFAULT_RETAIN_SLACK)
    }
}

impl<H> PrefetchWindow<H> {
    pub fn new(buffer_size: usize, retain_slack: usize) -> Self {
        Self {
            buffer_size,
            retain_slack,
            entries: BTreeMap::new(),
            next_ticket: 0,
            cursor: 0,
            len: 0,
        }
    }

    /// Allocate a fresh ticket. Also used for the eagerly prepared current item.
    pub fn issue_ticket(&mut self) -> PrepareTicket {
        let ticket = PrepareTicket(self.next_ticket);
        self.next_ticket += 1;
        ticket
    }

    /// Indices that should be prepared for `cursor`: the next `buffer_size`
    /// items, excluding the current one.
    pub fn target_range(&self, cursor: usize, len: usize) -> Option<RangeInclusive<usize>> {
        let start = cursor.saturating_add(1);
        let end = cursor
            .saturating_add(self.buffer_size)
            .min(len.saturating_sub(1));
        (self.buffer_size > 0 && start < len && start <= end).then(|| start..=end)
    }

    fn retains(&self, index: usize) -> bool {
        let reach = self
            .cursor
            .saturating_add(self.buffer_size)
            .saturating_add(self.retain_slack);
        index >= self.cursor && index <= reach
    }

    /// Bring the window in line with `cursor`.
    ///
    /// Idempotent: a second call with the same arguments issues no requests
    /// and evicts nothing.
    pub fn reconcile(&mut self, cursor: usize, len: usize) -> Reconciliation<H> {
        self.cursor = cursor;
        self.len = len;

        let stale: Vec<usize> = self
            .entries
            .keys()
            .copied()
            .filter(|&index| !self.retains(index) || index >= len)
            .collect();
        let mut evicted = Vec::new();
        for index in &stale {
            if let Some(handle) = self.entries.remove(index).and_then(AssetState::into_handle) {
                evicted.push(handle);
            }
        }

        let mut requests = Vec::new();
        if let Some(targets) = self.target_range(cursor, len) {
            for index in targets {
                if self.entries.contains_key(&index) {
                    continue;
                }
                let ticket = self.issue_ticket();
                self.entries.insert(index, AssetState::Pending(ticket));
                requests.push(PrepareRequest { index, ticket });
            }
        }

        if !stale.is_empty() || !requests.is_empty() {
            debug!(
                cursor,
                len,
                evicted = ?stale,
                requested = requests.len(),
                "prefetch window reconciled"
            );
        }

        Reconciliation { requests, evicted }
    }

    /// Record the outcome of a preparation.
    pub fn complete(
        &mut self,
        index: usize,
        ticket: PrepareTicket,
        outcome: Result<H, String>,
    ) -> Completion<H> {
        let matches = self
            .entries
            .get(&index)
            .and_then(AssetState::ticket)
            .is_some_and(|pending| pending == ticket);
        if !matches {
            debug!(index, ?ticket, "discarding preparation for evicted slot");
            return Completion::Discarded(outcome.ok());
        }

        match outcome {
            Ok(handle) => {
                self.entries.insert(index, AssetState::Ready(handle));
                Completion::Ready
            }
            Err(reason) => {
                self.entries
                    .insert(index, AssetState::Unavailable(reason.clone()));
                Completion::Unavailable(reason)
            }
        }
    }

    /// Move the slot at `index` out of the window.
    pub fn take(&mut self, index: usize) -> Option<AssetState<H>> {
        self.entries.remove(&index)
    }

    /// Put a slot back, e.g. the card the cursor just left.
    ///
    /// Range is not checked here; the next [`reconcile`](Self::reconcile)
    /// evicts the slot if it no longer belongs. Returns the handle when the
    /// index is already occupied; the caller must release it.
    pub fn restore(&mut self, index: usize, state: AssetState<H>) -> Option<H> {
        if self.entries.contains_key(&index) {
            return state.into_handle();
        }
        self.entries.insert(index, state);
        None
    }

    pub fn state(&self, index: usize) -> Option<&AssetState<H>> {
        self.entries.get(&index)
    }

    /// Indices in the target set of the last reconcile that have a slot.
    pub fn prepared_indices(&self) -> Vec<usize> {
        match self.target_range(self.cursor, self.len) {
            Some(targets) => self
                .entries
                .keys()
                .copied()
                .filter(|index| targets.contains(index))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Every index currently holding a slot, including slack.
    pub fn held_indices(&self) -> Vec<usize> {
        self.entries.keys().copied().collect()
    }

    /// Drop every slot, returning handles for release.
    pub fn clear(&mut self) -> Vec<H> {
        std::mem::take(&mut self.entries)
            .into_values()
            .filter_map(AssetState::into_handle)
            .collect()
    }
}
