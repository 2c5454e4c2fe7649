//! Session lifecycle phases.

use std::fmt;

/// Where a single session is in its lifecycle.
///
/// ```text
/// Idle -> Establishing -> Active -> Completing -> TornDown
///              \______________________________/
///                     (establishment failure)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Nothing started yet.
    Idle,
    /// Dialing, authenticating, negotiating the PTY and shell.
    Establishing,
    /// Relaying bytes in both directions.
    Active,
    /// Remote completion observed; tearing down.
    Completing,
    /// Channel, transport and terminal mode all released.
    TornDown,
}

impl SessionPhase {
    /// Whether `next` is a legal successor of this phase.
    pub fn can_advance_to(self, next: SessionPhase) -> bool {
        use SessionPhase::*;
        matches!(
            (self, next),
            (Idle, Establishing)
                | (Establishing, Active)
                | (Establishing, TornDown)
                | (Active, Completing)
                | (Completing, TornDown)
        )
    }

    /// Move to `next`, or report the illegal transition.
    pub fn advance(&mut self, next: SessionPhase) -> Result<(), InvalidTransition> {
        if self.can_advance_to(next) {
            tracing::debug!(from = %self, to = %next, "session phase");
            *self = next;
            Ok(())
        } else {
            Err(InvalidTransition {
                from: *self,
                to: next,
            })
        }
    }

    /// True while channel or transport resources may be held.
    pub fn holds_resources(self) -> bool {
        matches!(
            self,
            SessionPhase::Establishing | SessionPhase::Active | SessionPhase::Completing
        )
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Establishing => "establishing",
            SessionPhase::Active => "active",
            SessionPhase::Completing => "completing",
            SessionPhase::TornDown => "torn-down",
        };
        f.write_str(name)
    }
}

/// A phase change the lifecycle does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: SessionPhase,
    pub to: SessionPhase,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid session transition {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for InvalidTransition {}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let mut phase = SessionPhase::Idle;
        phase.advance(SessionPhase::Establishing).unwrap();
        phase.advance(SessionPhase::Active).unwrap();
        phase.advance(SessionPhase::Completing).unwrap();
        phase.advance(SessionPhase::TornDown).unwrap();
        assert_eq!(phase, SessionPhase::TornDown);
    }

    #[test]
    fn establishment_failure_goes_straight_to_torn_down() {
        let mut phase = SessionPhase::Establishing;
        phase.advance(SessionPhase::TornDown).unwrap();
        assert!(!phase.holds_resources());
    }

    #[test]
    fn torn_down_is_terminal() {
        let mut phase = SessionPhase::TornDown;
        for next in [
            SessionPhase::Idle,
            SessionPhase::Establishing,
            SessionPhase::Active,
            SessionPhase::Completing,
            SessionPhase::TornDown,
        ] {
            assert!(phase.advance(next).is_err());
        }
    }

    #[test]
    fn active_cannot_skip_completing() {
        let mut phase = SessionPhase::Active;
        let err = phase.advance(SessionPhase::TornDown).unwrap_err();
        assert_eq!(err.to_string(), "invalid session transition active -> torn-down");
        assert_eq!(phase, SessionPhase::Active);
    }
}
