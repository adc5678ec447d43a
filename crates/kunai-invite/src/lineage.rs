//! Lifecycle of one uid + recurrence-id lineage.

use std::fmt;

use crate::error::{InviteError, InviteResult};
use crate::invite::Invite;

/// Where a lineage stands.
///
/// `Draft -> Published -> Updated -> Canceled`; `Canceled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineageState {
    /// Never sent to attendees.
    Draft,
    Published,
    /// Sent again with a higher sequence.
    Updated,
    Canceled,
}

impl LineageState {
    #[must_use]
    pub fn of(invite: &Invite) -> Self {
        if invite.is_never_sent() {
            Self::Draft
        } else if invite.is_cancel() {
            Self::Canceled
        } else if invite.sequence > 0 {
            Self::Updated
        } else {
            Self::Published
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Canceled)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Updated => "updated",
            Self::Canceled => "canceled",
        }
    }

    /// ## Summary
    /// Validates replacing `current` with `next` and returns the new state.
    ///
    /// ## Errors
    /// Returns [`InviteError::InvalidTransition`] if the two belong to
    /// different lineages, `current` is canceled and `next` is not, `next`
    /// would return a sent lineage to draft, or `next` has a lower sequence.
    pub fn transition(current: &Invite, next: &Invite) -> InviteResult<Self> {
        if current.uid != next.uid || current.recur_id() != next.recur_id() {
            return Err(InviteError::InvalidTransition(format!(
                "'{}' and '{}' are different lineages",
                current.uid, next.uid
            )));
        }
        let from = Self::of(current);
        let to = Self::of(next);
        if next.sequence < current.sequence {
            return Err(InviteError::InvalidTransition(format!(
                "sequence {} is older than {}",
                next.sequence, current.sequence
            )));
        }
        if from.is_terminal() && !to.is_terminal() {
            return Err(InviteError::InvalidTransition(format!(
                "'{}' is canceled and cannot become {to}",
                current.uid
            )));
        }
        if from != Self::Draft && to == Self::Draft {
            return Err(InviteError::InvalidTransition(format!(
                "'{}' was already sent",
                current.uid
            )));
        }
        tracing::debug!(uid = %next.uid, %from, %to, "Lineage transition");
        Ok(to)
    }
}

impl fmt::Display for LineageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invite::{ItemType, Method, Status};
    use crate::temporal::{CalDateTime, RecurId};

    fn draft() -> Invite {
        let mut inv = Invite::with_uid(ItemType::Event, "u1");
        inv.set_never_sent(true);
        inv
    }

    fn sent(sequence: i32) -> Invite {
        let mut inv = Invite::with_uid(ItemType::Event, "u1");
        inv.sequence = sequence;
        inv
    }

    fn canceled(sequence: i32) -> Invite {
        let mut inv = sent(sequence);
        inv.method = Method::Cancel;
        inv.status = Status::Cancelled;
        inv
    }

    #[test]
    fn state_derivation() {
        assert_eq!(LineageState::of(&draft()), LineageState::Draft);
        assert_eq!(LineageState::of(&sent(0)), LineageState::Published);
        assert_eq!(LineageState::of(&sent(3)), LineageState::Updated);
        assert_eq!(LineageState::of(&canceled(0)), LineageState::Canceled);
    }

    #[test_log::test]
    fn forward_transitions() {
        assert_eq!(
            LineageState::transition(&draft(), &sent(0)).expect("publish"),
            LineageState::Published
        );
        assert_eq!(
            LineageState::transition(&sent(0), &sent(1)).expect("update"),
            LineageState::Updated
        );
        assert_eq!(
            LineageState::transition(&sent(1), &canceled(2)).expect("cancel"),
            LineageState::Canceled
        );
        assert_eq!(
            LineageState::transition(&canceled(2), &canceled(2)).expect("repeat"),
            LineageState::Canceled
        );
    }

    #[test]
    fn canceled_is_terminal() {
        let err = LineageState::transition(&canceled(2), &sent(3)).expect_err("revive");
        assert!(matches!(err, InviteError::InvalidTransition(_)));
    }

    #[test]
    fn sequence_never_regresses() {
        let err = LineageState::transition(&sent(4), &sent(3)).expect_err("older");
        assert!(matches!(err, InviteError::InvalidTransition(_)));
    }

    #[test]
    fn sent_lineage_cannot_become_draft() {
        assert!(LineageState::transition(&sent(1), &draft()).is_err());
    }

    #[test]
    fn lineages_must_match() {
        let mut other = sent(1);
        other.uid = "u2".into();
        assert!(LineageState::transition(&sent(1), &other).is_err());

        let mut exception = sent(1);
        let day = chrono::NaiveDate::from_ymd_opt(2024, 6, 1).expect("date");
        exception.set_recur_id(Some(RecurId::new(CalDateTime::date(day))));
        assert!(LineageState::transition(&sent(1), &exception).is_err());
    }
}
