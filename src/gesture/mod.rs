use crate::Decision;

/// Horizontal displacement a drag must exceed to count as a swipe.
pub const DEFAULT_DRAG_THRESHOLD: f64 = 100.0;

/// What the reviewer asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Approve,
    Reject,
    Undo,
}

impl From<Decision> for ReviewAction {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approve => ReviewAction::Approve,
            Decision::Reject => ReviewAction::Reject,
        }
    }
}

/// Where an input came from. Only used for logging and presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    Key,
    Pointer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewInput {
    pub action: ReviewAction,
    pub source: InputSource,
}

impl ReviewInput {
    pub fn new(action: ReviewAction, source: InputSource) -> Self {
        Self { action, source }
    }

    pub fn key(action: ReviewAction) -> Self {
        Self::new(action, InputSource::Key)
    }
}

/// Map a horizontal displacement to a decision.
///
/// Right is approve, left is reject. A displacement whose magnitude does not
/// strictly exceed `threshold` is a cancelled gesture.
pub fn classify_drag(displacement: f64, threshold: f64) -> Option<Decision> {
    if displacement.abs() <= threshold {
        None
    } else if displacement > 0.0 {
        Some(Decision::Approve)
    } else {
        Some(Decision::Reject)
    }
}

/// Tracks one pointer drag from press to release.
#[derive(Debug, Clone)]
pub struct DragTracker {
    threshold: f64,
    start: Option<f64>,
    current: f64,
}

impl Default for DragTracker {
    fn default() -> Self {
        Self::new(DEFAULT_DRAG_THRESHOLD)
    }
}

impl DragTracker {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            start: None,
            current: 0.0,
        }
    }

    pub fn begin(&mut self, x: f64) {
        self.start = Some(x);
        self.current = x;
    }

    pub fn is_dragging(&self) -> bool {
        self.start.is_some()
    }

    /// Update the pointer position. Returns the decision the drag would
    /// produce if released now, for swipe feedback.
    pub fn update(&mut self, x: f64) -> Option<Decision> {
        if !self.is_dragging() {
            return None;
        }
        self.current = x;
        classify_drag(self.displacement(), self.threshold)
    }

    pub fn displacement(&self) -> f64 {
        self.start.map_or(0.0, |start| self.current - start)
    }

    /// End the drag. `None` means the card snaps back with no state change.
    pub fn finish(&mut self) -> Option<ReviewInput> {
        let displacement = self.displacement();
        self.start.take()?;
        classify_drag(displacement, self.threshold)
            .map(|decision| ReviewInput::new(decision.into(), InputSource::Pointer))
    }

    pub fn cancel(&mut self) {
        self.start = None;
    }
}
