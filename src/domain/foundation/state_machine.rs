//! State machine trait for lifecycle enums.
//!
//! Lifecycle enums list their legal edges once; illegal jumps are rejected
//! here rather than re-checked by every caller.

use super::ValidationError;

/// Trait for status enums that represent state machines.
///
/// Implementors list their legal edges; validated transitions come for free.
///
/// ```ignore
/// impl StateMachine for ConnectionState {
///     fn can_transition_to(&self, target: &Self) -> bool {
///         matches!((self, target), (Closed, Connecting) | (Connecting, Open) /* ... */)
///     }
///
///     fn valid_transitions(&self) -> Vec<Self> { /* ... */ }
/// }
///
/// state.advance(ConnectionState::Open)?;
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "state_transition",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }

    /// Moves `self` to `target` in place when the edge is legal.
    ///
    /// On error `self` is left untouched.
    fn advance(&mut self, target: Self) -> Result<(), ValidationError> {
        *self = self.transition_to(target)?;
        Ok(())
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Door {
        Shut,
        Ajar,
        Locked,
        Removed,
    }

    impl StateMachine for Door {
        fn can_transition_to(&self, target: &Self) -> bool {
            use Door::*;
            matches!(
                (self, target),
                (Shut, Ajar) | (Ajar, Shut) | (Shut, Locked) | (Locked, Shut) | (Locked, Removed)
            )
        }

        fn valid_transitions(&self) -> Vec<Self> {
            use Door::*;
            match self {
                Shut => vec![Ajar, Locked],
                Ajar => vec![Shut],
                Locked => vec![Shut, Removed],
                Removed => vec![],
            }
        }
    }

    #[test]
    fn advance_moves_on_legal_edge() {
        let mut door = Door::Shut;
        door.advance(Door::Locked).unwrap();
        assert_eq!(door, Door::Locked);
    }

    #[test]
    fn advance_leaves_state_on_illegal_edge() {
        let mut door = Door::Ajar;
        assert!(door.advance(Door::Locked).is_err());
        assert_eq!(door, Door::Ajar);
    }

    #[test]
    fn transition_error_names_both_states() {
        let err = Door::Ajar.transition_to(Door::Removed).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("Ajar"));
        assert!(text.contains("Removed"));
    }

    #[test]
    fn terminal_state_has_no_edges() {
        assert!(Door::Removed.is_terminal());
        assert!(!Door::Locked.is_terminal());
    }

    #[test]
    fn can_transition_to_agrees_with_valid_transitions() {
        for door in [Door::Shut, Door::Ajar, Door::Locked, Door::Removed] {
            for target in door.valid_transitions() {
                assert!(door.can_transition_to(&target), "{:?} -> {:?}", door, target);
            }
        }
    }
}
