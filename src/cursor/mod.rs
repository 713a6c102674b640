use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("cursor index {index} out of range for {len} items")]
    OutOfRange { index: usize, len: usize },
}

/// Where the review pass stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewPhase {
    /// No session loaded.
    Idle,
    InProgress,
    /// Every item has a decision; undo can still leave this phase.
    Complete,
    /// Results were delivered. Terminal.
    Submitted,
}

/// Position in the item sequence.
///
/// `position == len` means every item has been decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewCursor {
    position: usize,
    len: usize,
}

impl ReviewCursor {
    pub fn new(len: usize) -> Self {
        Self { position: 0, len }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Step past the current item. No-op once complete.
    pub fn advance(&mut self) {
        if self.position < self.len {
            self.position += 1;
        }
    }

    /// Move back to `to_index`, used by undo.
    pub fn retreat(&mut self, to_index: usize) -> Result<(), CursorError> {
        if to_index >= self.len {
            return Err(CursorError::OutOfRange {
                index: to_index,
                len: self.len,
            });
        }
        self.position = to_index;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.position == self.len
    }

    /// `(position, len)` for display.
    pub fn progress(&self) -> (usize, usize) {
        (self.position, self.len)
    }

    /// Fraction of items decided, `0.0` for an empty sequence.
    pub fn fraction(&self) -> f64 {
        if self.len == 0 {
            0.0
        } else {
            self.position as f64 / self.len as f64
        }
    }

    pub fn phase(&self) -> ReviewPhase {
        if self.is_complete() {
            ReviewPhase::Complete
        } else {
            ReviewPhase::InProgress
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_stops_at_end() {
        let mut cursor = ReviewCursor::new(2);
        cursor.advance();
        cursor.advance();
        assert!(cursor.is_complete());
        cursor.advance();
        assert_eq!(cursor.position(), 2);
    }

    #[test]
    fn retreat_rejects_out_of_range() {
        let mut cursor = ReviewCursor::new(2);
        cursor.advance();
        assert_eq!(
            cursor.retreat(2),
            Err(CursorError::OutOfRange { index: 2, len: 2 })
        );
        assert_eq!(cursor.position(), 1);

        cursor.retreat(0).unwrap();
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn fraction_of_empty_sequence_is_zero() {
        let cursor = ReviewCursor::new(0);
        assert_eq!(cursor.fraction(), 0.0);
        assert!(cursor.is_complete());
    }

    #[test]
    fn phase_follows_position() {
        let mut cursor = ReviewCursor::new(1);
        assert_eq!(cursor.phase(), ReviewPhase::InProgress);
        cursor.advance();
        assert_eq!(cursor.phase(), ReviewPhase::Complete);
        assert_eq!(cursor.progress(), (1, 1));
        assert_eq!(cursor.fraction(), 1.0);
    }
}
