//! Matching calendar participants to local accounts.

use crate::account::{Account, AccountDirectory};
use crate::invite::Invite;
use crate::participant::{Attendee, addresses_match};

/// ## Summary
/// Whether `account` organized `invite`.
///
/// Without an ORGANIZER the invite counts as organizer-authored only when
/// it lists no attendees: some clients omit the organizer on single-user
/// events.
#[must_use]
pub fn account_is_organizer(invite: &Invite, account: Option<&Account>) -> bool {
    match &invite.organizer {
        Some(organizer) => account.is_some_and(|acct| acct.owns_address(organizer.address())),
        None => !invite.has_other_attendees(),
    }
}

/// ## Summary
/// The attendee entry standing for `account` when it acts as `identity_id`.
///
/// An attendee whose address equals the identity's From address wins over
/// any other address of the account; otherwise the first attendee owned by
/// the account is returned. Unknown identities fall back to the default one.
#[must_use]
pub fn matching_attendee<'a>(
    invite: &'a Invite,
    account: &Account,
    identity_id: Option<&str>,
) -> Option<&'a Attendee> {
    let identity_address = account
        .identity(identity_id)
        .and_then(|i| i.from_address.as_deref());
    let mut account_match = None;
    for attendee in &invite.attendees {
        if identity_address.is_some_and(|from| addresses_match(from, attendee.address())) {
            return Some(attendee);
        }
        if account_match.is_none() && account.owns_address(attendee.address()) {
            if identity_address.is_none() {
                return Some(attendee);
            }
            account_match = Some(attendee);
        }
    }
    account_match
}

/// Attendee lookups that need to resolve addresses to local accounts.
pub struct ParticipantMatcher<'d, D: AccountDirectory + ?Sized> {
    directory: &'d D,
}

impl<'d, D: AccountDirectory + ?Sized> ParticipantMatcher<'d, D> {
    #[must_use]
    pub const fn new(directory: &'d D) -> Self {
        Self { directory }
    }

    /// ## Summary
    /// Whether `candidate` names the same calendar user as `wanted`.
    ///
    /// Equal addresses match; so does any address of the local account
    /// owning `wanted`'s address.
    #[must_use]
    pub fn same_user(&self, wanted: &Attendee, candidate: &Attendee) -> bool {
        if wanted.addresses_match(candidate) {
            return true;
        }
        self.directory
            .lookup_account(wanted.address())
            .is_some_and(|acct| acct.owns_address(candidate.address()))
    }

    fn position(&self, attendees: &[Attendee], wanted: &Attendee) -> Option<usize> {
        let account = self.directory.lookup_account(wanted.address());
        attendees.iter().position(|at| {
            wanted.addresses_match(at)
                || account
                    .as_ref()
                    .is_some_and(|acct| acct.owns_address(at.address()))
        })
    }

    /// The entry of `invite` matching `other`.
    #[must_use]
    pub fn matching_attendee_for<'a>(
        &self,
        invite: &'a Invite,
        other: &Attendee,
    ) -> Option<&'a Attendee> {
        self.position(&invite.attendees, other)
            .and_then(|i| invite.attendees.get(i))
    }

    /// ## Summary
    /// Applies the attendee entries of an incoming reply.
    ///
    /// Only participation status is taken from a matched entry; role and
    /// RSVP stay as the organizer set them. Entries found only in the reply
    /// are appended. Returns whether anything changed.
    #[tracing::instrument(skip_all, fields(uid = %invite.uid))]
    pub fn apply_reply(&self, invite: &mut Invite, reply: &Invite) -> bool {
        let mut modified = false;
        let mut to_add = Vec::new();
        for replied in &reply.attendees {
            match self.position(&invite.attendees, replied) {
                Some(i) => {
                    let Some(local) = invite.attendees.get_mut(i) else {
                        continue;
                    };
                    if let Some(part_stat) = replied.part_stat
                        && local.part_stat != Some(part_stat)
                    {
                        tracing::debug!(
                            attendee = %local.address(),
                            %part_stat,
                            "Updating participation status from reply"
                        );
                        local.part_stat = Some(part_stat);
                        modified = true;
                    }
                }
                None if self.position(&to_add, replied).is_none() => to_add.push(replied.clone()),
                None => {}
            }
        }
        if !to_add.is_empty() {
            tracing::debug!(count = to_add.len(), "Appending attendees found only in reply");
            invite.attendees.extend(to_add);
            modified = true;
        }
        modified
    }
}
