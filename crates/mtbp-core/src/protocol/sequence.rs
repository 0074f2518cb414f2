//! Sequence numbering for a protocol session.
//!
//! # Inbound: strict ordering
//!
//! Every frame of a session carries a 16-bit sequence number.  The
//! [`SequenceValidator`] accepts any value for the first frame after creation
//! or [`reset`](SequenceValidator::reset), then requires each following frame
//! to carry exactly the successor of the last accepted value:
//!
//! ```text
//! 7 ─► 8 ─► 9 ... 65534 ─► 65535 ─► 0 ─► 1
//! ```
//!
//! Duplicates, gaps and reordering are all rejected; nothing is buffered.  A
//! rejected value leaves the state untouched, so the peer can still send the
//! expected number next.
//!
//! # Outbound: the counter
//!
//! [`SequenceCounter`] hands out numbers for frames this side sends.  It uses
//! an `AtomicU16`, so a session shared between a receive task and a send task
//! can number frames without a lock.

use std::sync::atomic::{AtomicU16, Ordering};

use tracing::warn;

use crate::protocol::error::ProtocolError;

/// Last accepted inbound sequence number of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceState {
    last_sequence: Option<u16>,
}

impl SequenceState {
    /// Last accepted value, `None` before the first frame.
    pub fn last_sequence(&self) -> Option<u16> {
        self.last_sequence
    }

    /// The only value the next frame may carry, or `None` before the first.
    pub fn expected(&self) -> Option<u16> {
        self.last_sequence.map(|last| last.wrapping_add(1))
    }
}

/// Enforces strict wrap-around ordering of inbound sequence numbers.
#[derive(Debug, Clone, Default)]
pub struct SequenceValidator {
    state: SequenceState,
}

impl SequenceValidator {
    /// Validator that accepts any first value.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `sequence` if it is the expected successor (or the first value)
    /// and records it.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::SequenceError`] otherwise; the recorded value
    /// does not change.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mtbp_core::protocol::sequence::SequenceValidator;
    ///
    /// let mut validator = SequenceValidator::new();
    /// assert!(validator.validate(65535).is_ok());
    /// assert!(validator.validate(0).is_ok());
    /// assert!(validator.validate(0).is_err());
    /// ```
    pub fn validate(&mut self, sequence: u16) -> Result<(), ProtocolError> {
        self.check(sequence)?;
        self.commit(sequence);
        Ok(())
    }

    /// Same test as [`validate`](Self::validate) without recording anything.
    pub fn check(&self, sequence: u16) -> Result<(), ProtocolError> {
        match self.state.expected() {
            Some(expected) if sequence != expected => {
                warn!("rejected sequence number {sequence}, expected {expected}");
                Err(ProtocolError::SequenceError(format!(
                    "received {sequence}, expected {expected}"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Records `sequence` as the last accepted value.  Callers must have
    /// checked it first.
    pub(crate) fn commit(&mut self, sequence: u16) {
        self.state.last_sequence = Some(sequence);
    }

    /// Forgets the last value; the next frame may carry any number.
    pub fn reset(&mut self) {
        self.state = SequenceState::default();
    }

    /// Snapshot of the accepted history.
    pub fn state(&self) -> SequenceState {
        self.state
    }
}

/// Lock-free outbound sequence counter.
///
/// Starts at 0 and wraps from 65535 back to 0.
#[derive(Debug, Default)]
pub struct SequenceCounter {
    inner: AtomicU16,
}

impl SequenceCounter {
    /// Counter whose first value is 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the counter at `first` instead of 0.
    pub fn starting_at(first: u16) -> Self {
        Self {
            inner: AtomicU16::new(first),
        }
    }

    /// Returns the next number and advances the counter.
    ///
    /// `Relaxed` is enough: the value orders frames, it does not publish
    /// other memory.
    pub fn next(&self) -> u16 {
        // fetch_add wraps on overflow.
        self.inner.fetch_add(1, Ordering::Relaxed)
    }

    /// The number the next call to [`next`](Self::next) will return.
    pub fn current(&self) -> u16 {
        self.inner.load(Ordering::Relaxed)
    }

    /// Restarts numbering at 0.
    pub fn reset(&self) {
        self.inner.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    // ── Validator ────────────────────────────────────────────────────────────

    #[test]
    fn test_first_value_is_always_accepted() {
        for first in [0u16, 1, 12_345, u16::MAX] {
            let mut validator = SequenceValidator::new();
            assert!(validator.validate(first).is_ok(), "first value {first}");
            assert_eq!(validator.state().last_sequence(), Some(first));
        }
    }

    #[test]
    fn test_successor_is_accepted() {
        // Arrange
        let mut validator = SequenceValidator::new();
        validator.validate(41).unwrap();

        // Act
        let result = validator.validate(42);

        // Assert
        assert!(result.is_ok());
        assert_eq!(validator.state().expected(), Some(43));
    }

    #[test]
    fn test_wraps_from_max_to_zero() {
        let mut validator = SequenceValidator::new();
        validator.validate(u16::MAX).unwrap();
        assert!(validator.validate(0).is_ok());
        assert!(validator.validate(1).is_ok());
    }

    #[test]
    fn test_duplicate_is_rejected_without_state_change() {
        // Arrange
        let mut validator = SequenceValidator::new();
        validator.validate(10).unwrap();
        validator.validate(11).unwrap();

        // Act
        let result = validator.validate(11);

        // Assert
        assert!(matches!(result, Err(ProtocolError::SequenceError(_))));
        assert_eq!(validator.state().last_sequence(), Some(11));
    }

    #[test]
    fn test_gap_and_reorder_are_rejected() {
        let mut validator = SequenceValidator::new();
        validator.validate(100).unwrap();

        assert!(validator.validate(102).is_err(), "gap");
        assert!(validator.validate(99).is_err(), "going back");
        assert!(validator.validate(101).is_ok(), "expected value still accepted");
    }

    #[test]
    fn test_reset_accepts_any_value_again() {
        let mut validator = SequenceValidator::new();
        validator.validate(500).unwrap();

        validator.reset();

        assert_eq!(validator.state().last_sequence(), None);
        assert!(validator.validate(3).is_ok());
    }

    #[test]
    fn test_check_does_not_record() {
        let mut validator = SequenceValidator::new();
        validator.validate(7).unwrap();

        assert!(validator.check(8).is_ok());
        assert!(validator.check(8).is_ok());
        assert_eq!(validator.state().last_sequence(), Some(7));
    }

    #[test]
    fn test_error_message_names_expected_value() {
        let mut validator = SequenceValidator::new();
        validator.validate(1).unwrap();

        let err = validator.validate(5).unwrap_err();

        assert_eq!(err.to_string(), "sequence error: received 5, expected 2");
    }

    // ── Counter ──────────────────────────────────────────────────────────────

    #[test]
    fn test_counter_starts_at_zero() {
        let counter = SequenceCounter::new();
        assert_eq!(counter.next(), 0);
        assert_eq!(counter.next(), 1);
        assert_eq!(counter.current(), 2);
    }

    #[test]
    fn test_counter_wraps_at_u16_max() {
        // Arrange: one step before overflow
        let counter = SequenceCounter::starting_at(u16::MAX);

        // Act
        let before_wrap = counter.next();
        let after_wrap = counter.next();

        // Assert
        assert_eq!(before_wrap, u16::MAX);
        assert_eq!(after_wrap, 0, "counter must wrap to 0 after u16::MAX");
    }

    #[test]
    fn test_counter_output_satisfies_validator() {
        let counter = SequenceCounter::starting_at(u16::MAX - 2);
        let mut validator = SequenceValidator::new();
        for _ in 0..6 {
            assert!(validator.validate(counter.next()).is_ok());
        }
    }

    #[test]
    fn test_counter_reset() {
        let counter = SequenceCounter::starting_at(900);
        counter.reset();
        assert_eq!(counter.next(), 0);
    }

    #[test]
    fn test_counter_is_thread_safe() {
        // Arrange: fewer increments than the u16 range so values stay unique
        let counter = Arc::new(SequenceCounter::new());
        let thread_count = 8;
        let increments_per_thread = 1000;

        // Act
        let handles: Vec<_> = (0..thread_count)
            .map(|_| {
                let c = Arc::clone(&counter);
                thread::spawn(move || {
                    (0..increments_per_thread)
                        .map(|_| c.next())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut all_values: Vec<u16> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("thread panicked"))
            .collect();

        // Assert
        all_values.sort_unstable();
        all_values.dedup();
        assert_eq!(all_values.len(), thread_count * increments_per_thread);
    }
}
