use crate::config::ReviewSettings;
use crate::cursor::ReviewPhase;
use crate::gesture::{ReviewAction, ReviewInput};
use crate::ledger::DecisionRecord;
use crate::prefetch::{AssetState, Completion, PrefetchWindow, PrepareTicket};
use crate::preview::AssetPreparer;
use crate::session::Session;
use crate::sink::{Submission, SubmissionFilter, SubmissionReceipt, SubmissionSink};
use crate::source::ImageSource;
use crate::{Asset, Decision, Item, ReviewTally};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::SendError};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Failed to fetch images: {0}")]
    Fetch(String),
    #[error("No images found in the specified folder")]
    EmptySource,
    #[error("Failed to submit review: {0}")]
    Submission(String),
    #[error("no review session loaded")]
    NotLoaded,
    #[error("review is not complete: {remaining} items left")]
    NotComplete { remaining: usize },
    #[error("review results were already submitted")]
    AlreadySubmitted,
}

/// Presentation notifications, queued after the state change they describe.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewEvent {
    Loading { folder: String },
    Loaded { total: usize },
    LoadFailed { message: String },
    /// The card at `index` was decided; animate it away.
    CardCommitted { index: usize, decision: Decision },
    /// The card at `index` came back through undo.
    CardRestored { index: usize },
    NothingToUndo,
    Progress { position: usize, total: usize },
    Completed(ReviewTally),
    AssetReady { index: usize },
    AssetUnavailable { index: usize, reason: String },
    Submitted(SubmissionReceipt),
    SubmissionFailed { message: String },
    Reset,
}

/// Finished preparation travelling back from a spawned task.
struct PreparedOutcome<H> {
    epoch: u64,
    index: usize,
    ticket: PrepareTicket,
    outcome: Result<H, String>,
}

/// Reports a preparation back to the controller exactly once.
///
/// Dropped without sending (the preparer panicked), it reports the slot as
/// unavailable so `in_flight` still drains.
struct OutcomeReporter<H> {
    tx: UnboundedSender<PreparedOutcome<H>>,
    epoch: u64,
    index: usize,
    ticket: PrepareTicket,
    sent: bool,
}

impl<H> OutcomeReporter<H> {
    fn send(mut self, outcome: Result<H, String>) -> Result<(), SendError<PreparedOutcome<H>>> {
        self.sent = true;
        self.tx.send(self.outcome(outcome))
    }

    fn outcome(&self, outcome: Result<H, String>) -> PreparedOutcome<H> {
        PreparedOutcome {
            epoch: self.epoch,
            index: self.index,
            ticket: self.ticket,
            outcome,
        }
    }
}

impl<H> Drop for OutcomeReporter<H> {
    fn drop(&mut self) {
        if !self.sent {
            let _ = self
                .tx
                .send(self.outcome(Err("preparation aborted".to_string())));
        }
    }
}

/// The card under the cursor, prepared outside the prefetch window.
struct Stage<H> {
    index: usize,
    state: AssetState<H>,
}

/// Drives one review: fetch, the decide/undo loop, and submission.
///
/// State changes commit synchronously before the matching [`ReviewEvent`]
/// is queued. Preparation results are applied only through
/// [`pump`](Self::pump) or [`settle`](Self::settle); results for evicted
/// slots, superseded tickets or a previous session are released, never
/// stored.
pub struct ReviewController<P: AssetPreparer> {
    preparer: Arc<P>,
    settings: ReviewSettings,
    session: Option<Session<P::Handle>>,
    stage: Option<Stage<P::Handle>>,
    submitted: bool,
    epoch: u64,
    events: VecDeque<ReviewEvent>,
    tx: UnboundedSender<PreparedOutcome<P::Handle>>,
    rx: UnboundedReceiver<PreparedOutcome<P::Handle>>,
    in_flight: usize,
}

impl<P: AssetPreparer> ReviewController<P> {
    pub fn new(preparer: Arc<P>, settings: ReviewSettings) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            preparer,
            settings,
            session: None,
            stage: None,
            submitted: false,
            epoch: 0,
            events: VecDeque::new(),
            tx,
            rx,
            in_flight: 0,
        }
    }

    pub fn settings(&self) -> &ReviewSettings {
        &self.settings
    }

    pub fn phase(&self) -> ReviewPhase {
        match &self.session {
            None => ReviewPhase::Idle,
            Some(_) if self.submitted => ReviewPhase::Submitted,
            Some(session) => session.phase(),
        }
    }

    pub fn session(&self) -> Option<&Session<P::Handle>> {
        self.session.as_ref()
    }

    /// The item under the cursor and its preparation state.
    pub fn current_card(&self) -> Option<(&Item, &AssetState<P::Handle>)> {
        let session = self.session.as_ref()?;
        let stage = self.stage.as_ref()?;
        let item = session.item(stage.index)?;
        Some((item, &stage.state))
    }

    /// Up to `count` items after the current one, for the card stack.
    pub fn upcoming(&self, count: usize) -> Vec<(usize, &Item, Option<&AssetState<P::Handle>>)> {
        let Some(session) = self.session.as_ref() else {
            return Vec::new();
        };
        let start = session.cursor().position() + 1;
        session
            .items()
            .iter()
            .enumerate()
            .skip(start)
            .take(count)
            .map(|(index, item)| (index, item, session.prefetch().state(index)))
            .collect()
    }

    pub fn tally(&self) -> ReviewTally {
        self.session
            .as_ref()
            .map(Session::tally)
            .unwrap_or_default()
    }

    pub fn can_undo(&self) -> bool {
        !self.submitted
            && self
                .session
                .as_ref()
                .is_some_and(|session| !session.ledger().is_empty())
    }

    /// Preparations spawned but not yet applied.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn drain_events(&mut self) -> Vec<ReviewEvent> {
        self.events.drain(..).collect()
    }

    /// Fetch the item list and start a new session.
    ///
    /// On failure the current state is left untouched, so a controller that
    /// was idle stays idle. Returns the number of items loaded.
    pub async fn load(
        &mut self,
        source: &dyn ImageSource,
        folder: &str,
    ) -> Result<usize, ReviewError> {
        self.events.push_back(ReviewEvent::Loading {
            folder: folder.to_string(),
        });

        let fetched = match source.fetch_assets(folder).await {
            Ok(fetched) => fetched,
            Err(err) => return Err(self.fail_load(ReviewError::Fetch(err.to_string()))),
        };

        let assets = dedupe_assets(fetched.assets);
        if assets.is_empty() {
            return Err(self.fail_load(ReviewError::EmptySource));
        }

        self.teardown();
        let total = assets.len();
        let window = PrefetchWindow::new(self.settings.buffer_size, self.settings.retain_slack);
        self.session = Some(Session::new(assets, fetched.resume_token, window));
        info!(folder, total, "review session loaded");

        self.events.push_back(ReviewEvent::Loaded { total });
        self.refresh_window();
        self.events
            .push_back(ReviewEvent::Progress { position: 0, total });
        Ok(total)
    }

    fn fail_load(&mut self, error: ReviewError) -> ReviewError {
        warn!(error = %error, "load failed");
        self.events.push_back(ReviewEvent::LoadFailed {
            message: error.to_string(),
        });
        error
    }

    /// Apply a decision to the current item.
    ///
    /// Returns `None` when no session is in progress.
    pub fn decide(&mut self, decision: Decision) -> Option<DecisionRecord> {
        if self.submitted {
            return None;
        }
        let session = self.session.as_mut()?;
        let record = session.decide(decision)?;
        let (position, total) = session.cursor().progress();
        let completed = session.is_complete().then(|| session.tally());
        debug!(index = record.item_index, ?decision, "decision committed");

        self.events.push_back(ReviewEvent::CardCommitted {
            index: record.item_index,
            decision,
        });
        self.refresh_window();
        self.events
            .push_back(ReviewEvent::Progress { position, total });
        if let Some(tally) = completed {
            info!(
                approved = tally.approved,
                rejected = tally.rejected,
                total = tally.total,
                "review complete"
            );
            self.events.push_back(ReviewEvent::Completed(tally));
        }
        Some(record)
    }

    /// Revert the most recent decision.
    pub fn undo(&mut self) -> Option<DecisionRecord> {
        if self.submitted {
            return None;
        }
        let session = self.session.as_mut()?;
        let Some(record) = session.undo() else {
            self.events.push_back(ReviewEvent::NothingToUndo);
            return None;
        };
        let (position, total) = session.cursor().progress();
        debug!(index = record.item_index, "decision undone");

        self.events.push_back(ReviewEvent::CardRestored {
            index: record.item_index,
        });
        self.refresh_window();
        self.events
            .push_back(ReviewEvent::Progress { position, total });
        Some(record)
    }

    pub fn handle_input(&mut self, input: ReviewInput) -> Option<DecisionRecord> {
        debug!(action = ?input.action, source = ?input.source, "review input");
        match input.action {
            ReviewAction::Approve => self.decide(Decision::Approve),
            ReviewAction::Reject => self.decide(Decision::Reject),
            ReviewAction::Undo => self.undo(),
        }
    }

    /// Deliver the results of a completed review.
    ///
    /// On failure the session stays complete so the reviewer can retry or
    /// keep undoing.
    pub async fn submit(
        &mut self,
        sink: &dyn SubmissionSink,
        filter: SubmissionFilter,
    ) -> Result<SubmissionReceipt, ReviewError> {
        if self.submitted {
            return Err(ReviewError::AlreadySubmitted);
        }
        let session = self.session.as_ref().ok_or(ReviewError::NotLoaded)?;
        if !session.is_complete() {
            let (position, total) = session.cursor().progress();
            return Err(ReviewError::NotComplete {
                remaining: total - position,
            });
        }

        let submission = Submission {
            resume_token: session.resume_token().map(str::to_string),
            items: session.submission_entries(filter),
            summary: session.tally(),
        };

        match sink.submit(&submission).await {
            Ok(receipt) => {
                self.submitted = true;
                info!(
                    destination = %receipt.destination,
                    delivered = receipt.delivered,
                    "review submitted"
                );
                self.events
                    .push_back(ReviewEvent::Submitted(receipt.clone()));
                Ok(receipt)
            }
            Err(err) => {
                let error = ReviewError::Submission(err.to_string());
                warn!(error = %error, "submission failed");
                self.events.push_back(ReviewEvent::SubmissionFailed {
                    message: error.to_string(),
                });
                Err(error)
            }
        }
    }

    /// Drop the session and every prepared handle ("review again").
    pub fn reset(&mut self) {
        self.teardown();
        self.events.push_back(ReviewEvent::Reset);
    }

    /// Apply every preparation that has already finished. Never blocks.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(prepared) = self.rx.try_recv() {
            self.apply(prepared);
            applied += 1;
        }
        applied
    }

    /// Wait for all spawned preparations and apply them.
    pub async fn settle(&mut self) {
        while self.in_flight > 0 {
            match self.rx.recv().await {
                Some(prepared) => self.apply(prepared),
                None => break,
            }
        }
    }

    fn apply(&mut self, prepared: PreparedOutcome<P::Handle>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let PreparedOutcome {
            epoch,
            index,
            ticket,
            outcome,
        } = prepared;

        if epoch != self.epoch {
            debug!(index, "discarding preparation from a previous session");
            if let Ok(handle) = outcome {
                self.preparer.release(handle);
            }
            return;
        }

        if let Some(stage) = self.stage.as_mut()
            && stage.index == index
            && stage.state.ticket() == Some(ticket)
        {
            stage.state = match outcome {
                Ok(handle) => AssetState::Ready(handle),
                Err(reason) => AssetState::Unavailable(reason),
            };
            let event = match &stage.state {
                AssetState::Unavailable(reason) => Some(reason.clone()),
                _ => None,
            };
            self.report_prepared(index, event);
            return;
        }

        let Some(session) = self.session.as_mut() else {
            if let Ok(handle) = outcome {
                self.preparer.release(handle);
            }
            return;
        };
        match session.prefetch_mut().complete(index, ticket, outcome) {
            Completion::Ready => self.report_prepared(index, None),
            Completion::Unavailable(reason) => self.report_prepared(index, Some(reason)),
            Completion::Discarded(Some(handle)) => self.preparer.release(handle),
            Completion::Discarded(None) => {}
        }
    }

    fn report_prepared(&mut self, index: usize, unavailable: Option<String>) {
        match unavailable {
            None => self.events.push_back(ReviewEvent::AssetReady { index }),
            Some(reason) => {
                let id = self
                    .session
                    .as_ref()
                    .and_then(|session| session.item(index))
                    .map(|item| item.id().to_string())
                    .unwrap_or_default();
                warn!(index, id = %id, reason = %reason, "asset preparation failed");
                self.events
                    .push_back(ReviewEvent::AssetUnavailable { index, reason });
            }
        }
    }

    /// Re-stage the current card and reconcile the prefetch window.
    fn refresh_window(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let cursor = session.cursor().position();
        let len = session.items().len();

        if let Some(stage) = self.stage.take_if(|stage| stage.index != cursor)
            && let Some(handle) = session.prefetch_mut().restore(stage.index, stage.state)
        {
            self.preparer.release(handle);
        }

        let plan = session.prefetch_mut().reconcile(cursor, len);
        for handle in plan.evicted {
            self.preparer.release(handle);
        }

        let mut jobs: Vec<(usize, PrepareTicket, Asset)> = Vec::new();
        if cursor < len && self.stage.is_none() {
            let state = match session.prefetch_mut().take(cursor) {
                Some(state) => state,
                None => {
                    let ticket = session.prefetch_mut().issue_ticket();
                    jobs.push((cursor, ticket, session.items()[cursor].asset.clone()));
                    AssetState::Pending(ticket)
                }
            };
            self.stage = Some(Stage {
                index: cursor,
                state,
            });
        }
        for request in plan.requests {
            let asset = session.items()[request.index].asset.clone();
            jobs.push((request.index, request.ticket, asset));
        }

        for (index, ticket, asset) in jobs {
            self.spawn_prepare(index, ticket, asset);
        }
    }

    fn spawn_prepare(&mut self, index: usize, ticket: PrepareTicket, asset: Asset) {
        let preparer = Arc::clone(&self.preparer);
        let tx = self.tx.clone();
        let epoch = self.epoch;
        self.in_flight += 1;
        debug!(index, id = %asset.id, "preparing asset");

        tokio::spawn(async move {
            let reporter = OutcomeReporter {
                tx,
                epoch,
                index,
                ticket,
                sent: false,
            };
            let outcome = preparer.prepare(&asset).await;
            if let Err(SendError(prepared)) = reporter.send(outcome)
                && let Ok(handle) = prepared.outcome
            {
                preparer.release(handle);
            }
        });
    }

    fn teardown(&mut self) {
        if let Some(stage) = self.stage.take()
            && let Some(handle) = stage.state.into_handle()
        {
            self.preparer.release(handle);
        }
        if let Some(session) = self.session.take() {
            for handle in session.into_handles() {
                self.preparer.release(handle);
            }
        }
        self.submitted = false;
        self.epoch += 1;
    }
}

impl<P: AssetPreparer> Drop for ReviewController<P> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Keep the first occurrence of each id.
fn dedupe_assets(assets: Vec<Asset>) -> Vec<Asset> {
    let mut seen = HashSet::new();
    assets
        .into_iter()
        .filter(|asset| {
            let fresh = seen.insert(asset.id.clone());
            if !fresh {
                warn!(id = %asset.id, "dropping duplicate asset id");
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let mut second = Asset::with_id("a");
        second.name = Some("second".to_string());
        let assets = vec![Asset::with_id("a"), Asset::with_id("b"), second];
        let kept = dedupe_assets(assets);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].name, None);
        assert_eq!(kept[1].id, "b");
    }
}
