use swipe_review::cursor::ReviewPhase;
use swipe_review::gesture::{DragTracker, ReviewAction};
use swipe_review::prefetch::PrefetchWindow;
use swipe_review::session::Session;
use swipe_review::sink::SubmissionFilter;
use swipe_review::{Asset, Decision, ItemStatus, ReviewTally};

/// Helper to create a session over assets with the given ids
fn session_of(ids: &[&str]) -> Session<String> {
    let assets = ids.iter().map(|id| Asset::with_id(*id)).collect();
    Session::new(assets, Some("tok".to_string()), PrefetchWindow::default())
}

fn statuses(session: &Session<String>) -> Vec<ItemStatus> {
    session.items().iter().map(|item| item.status).collect()
}

#[test]
fn decisions_then_equal_undos_restore_initial_state() {
    let patterns: [&[Decision]; 4] = [
        &[Decision::Approve],
        &[Decision::Reject, Decision::Reject],
        &[Decision::Approve, Decision::Reject, Decision::Approve],
        &[
            Decision::Reject,
            Decision::Approve,
            Decision::Approve,
            Decision::Reject,
        ],
    ];

    for decisions in patterns {
        let mut session = session_of(&["a", "b", "c", "d"]);
        let initial = statuses(&session);

        for decision in decisions {
            session.decide(*decision).unwrap();
            assert_eq!(session.ledger().len(), session.cursor().position());
        }
        for _ in decisions {
            session.undo().unwrap();
            assert_eq!(session.ledger().len(), session.cursor().position());
        }

        assert_eq!(session.cursor().position(), 0);
        assert_eq!(statuses(&session), initial);
        assert!(session.ledger().is_empty());
        assert_eq!(session.phase(), ReviewPhase::InProgress);
    }
}

#[test]
fn reject_then_approve_scenario() {
    let mut session = session_of(&["A", "B", "C"]);
    session.decide(Decision::Reject).unwrap();
    session.decide(Decision::Approve).unwrap();

    assert_eq!(session.cursor().position(), 2);
    assert_eq!(
        statuses(&session),
        vec![
            ItemStatus::Rejected,
            ItemStatus::Approved,
            ItemStatus::Undecided
        ]
    );
    assert_eq!(session.ledger().len(), 2);

    let record = session.undo().unwrap();
    assert_eq!(record.item_index, 1);
    assert_eq!(record.previous_status, ItemStatus::Undecided);
    assert_eq!(record.new_status, ItemStatus::Approved);
    assert_eq!(session.cursor().position(), 1);
    assert_eq!(session.items()[1].status, ItemStatus::Undecided);
    assert_eq!(session.ledger().len(), 1);
}

#[test]
fn single_item_completes_with_tallies() {
    let mut session = session_of(&["A"]);
    session.decide(Decision::Approve).unwrap();

    assert!(session.is_complete());
    assert_eq!(session.phase(), ReviewPhase::Complete);
    assert_eq!(
        session.tally(),
        ReviewTally {
            approved: 1,
            rejected: 0,
            total: 1
        }
    );

    // Nothing left to decide
    assert!(session.decide(Decision::Reject).is_none());
    assert_eq!(session.ledger().len(), 1);
}

#[test]
fn undo_from_complete_reenters_review() {
    let mut session = session_of(&["A", "B"]);
    session.decide(Decision::Approve).unwrap();
    session.decide(Decision::Reject).unwrap();
    assert!(session.is_complete());

    session.undo().unwrap();
    assert_eq!(session.phase(), ReviewPhase::InProgress);
    assert_eq!(session.current().map(|item| item.id()), Some("B"));
}

#[test]
fn undo_with_empty_ledger_is_a_no_op() {
    let mut session = session_of(&["A"]);
    assert!(session.undo().is_none());
    assert_eq!(session.cursor().position(), 0);
}

#[test]
fn drag_below_threshold_records_nothing() {
    let mut session = session_of(&["A", "B"]);
    let mut drag = DragTracker::new(100.0);

    drag.begin(0.0);
    drag.update(-99.0);
    assert!(drag.finish().is_none());
    assert!(session.ledger().is_empty());

    drag.begin(0.0);
    drag.update(-101.0);
    let input = drag.finish().unwrap();
    assert_eq!(input.action, ReviewAction::Reject);
    session.decide(Decision::Reject).unwrap();
    assert_eq!(session.ledger().len(), 1);
    assert_eq!(session.items()[0].status, ItemStatus::Rejected);
}

#[test]
fn default_filter_selects_rejected_entries() {
    let mut session = session_of(&["A", "B", "C"]);
    session.decide(Decision::Approve).unwrap();
    session.decide(Decision::Reject).unwrap();
    session.decide(Decision::Reject).unwrap();

    let entries = session.submission_entries(SubmissionFilter::default());
    let ids: Vec<&str> = entries.iter().map(|e| e.file_id.as_str()).collect();
    assert_eq!(ids, vec!["B", "C"]);
    assert!(entries.iter().all(|e| e.status == ItemStatus::Rejected));

    assert_eq!(session.submission_entries(SubmissionFilter::All).len(), 3);
    assert_eq!(session.submission_entries(SubmissionFilter::Approved).len(), 1);
}
