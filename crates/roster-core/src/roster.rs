//! # Roster Module
//!
//! The service every surface (HTTP, CLI) goes through.
//!
//! The roster owns the rules the stores do not know about:
//! - MSSV and card UID uniqueness
//! - state transitions via [`MemberState::next`] and the [`CheckinPolicy`]
//! - lottery number allocation
//! - user registration and authentication
//!
//! Read-check-write sequences are serialised by a writer lock, so two
//! concurrent adds of the same MSSV cannot both succeed. The optional
//! change listener runs under that same lock, so it observes writes in
//! commit order.

use crate::error::{Error, Result};
use crate::member::{Member, MemberDraft, MemberId};
use crate::password::PasswordHash;
use crate::state::{CheckinPolicy, MemberAction, MemberState};
use crate::storage::{MemberStore, Sequence};
use crate::user::{User, validate_password, validate_username};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};

// =============================================================================
// TYPES
// =============================================================================

/// How a check-in identifies the member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Student ID typed or scanned at the desk.
    Mssv(String),
    /// RFID card UID read by a door device.
    IdCard(String),
}

impl std::fmt::Display for Lookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lookup::Mssv(mssv) => write!(f, "member with MSSV {mssv}"),
            Lookup::IdCard(card) => write!(f, "member with card {card}"),
        }
    }
}

/// Outcome of a state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub member: Member,
    pub from: MemberState,
    pub to: MemberState,
}

/// A committed write, as reported to the change listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Added(Member),
    Edited(Member),
    Deleted(Member),
    /// Arrival, by lookup or through the state endpoint.
    CheckedIn(Transition),
    StateChanged(Transition),
    Reset { count: usize },
}

type Listener = Box<dyn Fn(&Change) + Send + Sync>;

/// Outcome of a bulk import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub inserted: usize,
    pub skipped: usize,
}

// =============================================================================
// ROSTER
// =============================================================================

/// Member and user service over a [`MemberStore`].
pub struct Roster {
    store: Box<dyn MemberStore>,
    policy: CheckinPolicy,
    password_iterations: u32,
    writer: Mutex<()>,
    listener: Option<Listener>,
}

impl std::fmt::Debug for Roster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Roster")
            .field("policy", &self.policy)
            .field("listener", &self.listener.is_some())
            .finish_non_exhaustive()
    }
}

impl Roster {
    /// Wrap a store with the default policy.
    pub fn new(store: impl MemberStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            policy: CheckinPolicy::default(),
            password_iterations: crate::password::DEFAULT_ITERATIONS,
            writer: Mutex::new(()),
            listener: None,
        }
    }

    /// Replace the check-in policy.
    #[must_use]
    pub fn with_policy(mut self, policy: CheckinPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Override the PBKDF2 iteration count for new passwords.
    #[must_use]
    pub fn with_password_iterations(mut self, iterations: u32) -> Self {
        self.password_iterations = iterations.max(1);
        self
    }

    /// Call `listener` after every committed member write, while the
    /// writer lock is still held.
    #[must_use]
    pub fn with_listener(mut self, listener: impl Fn(&Change) + Send + Sync + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    /// The active check-in policy.
    pub fn policy(&self) -> CheckinPolicy {
        self.policy
    }

    fn emit(&self, change: impl FnOnce() -> Change) {
        if let Some(listener) = &self.listener {
            listener(&change());
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.writer
            .lock()
            .map_err(|_| Error::Corrupt("roster writer lock poisoned".to_string()))
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// All members in id order.
    pub fn list(&self) -> Result<Vec<Member>> {
        self.store.load_members()
    }

    /// One member by id.
    pub fn get(&self, id: MemberId) -> Result<Member> {
        self.store
            .load_member(id)?
            .ok_or_else(|| Error::NotFound(format!("member {id}")))
    }

    /// Resolve a check-in lookup.
    pub fn find(&self, lookup: &Lookup) -> Result<Option<Member>> {
        let members = self.store.load_members()?;
        Ok(members.into_iter().find(|m| match lookup {
            Lookup::Mssv(mssv) => m.has_mssv(mssv),
            Lookup::IdCard(card) => m.has_card(card),
        }))
    }

    // -------------------------------------------------------------------------
    // Member CRUD
    // -------------------------------------------------------------------------

    /// Register a new member.
    pub fn add(&self, draft: MemberDraft) -> Result<Member> {
        let draft = draft.validate()?;
        let _guard = self.lock()?;

        let members = self.store.load_members()?;
        ensure_unique(&members, &draft, None)?;

        let id = MemberId(self.store.next_sequence(Sequence::Member)?);
        let member = Member::from_draft(id, draft);
        self.store.store_member(&member)?;
        self.emit(|| Change::Added(member.clone()));
        Ok(member)
    }

    /// Replace a member's editable fields.
    ///
    /// A member who has an MSSV keeps needing one; imported guests may be
    /// edited without.
    pub fn edit(&self, id: MemberId, draft: MemberDraft) -> Result<Member> {
        let draft = draft.validate_import()?;
        let _guard = self.lock()?;

        let mut member = self.get(id)?;
        if member.mssv.is_some() && draft.mssv.is_none() {
            return Err(Error::Validation("MSSV is required".to_string()));
        }
        let members = self.store.load_members()?;
        ensure_unique(&members, &draft, Some(id))?;

        member.apply_draft(draft);
        self.store.store_member(&member)?;
        self.emit(|| Change::Edited(member.clone()));
        Ok(member)
    }

    /// Delete a member.
    pub fn delete(&self, id: MemberId) -> Result<Member> {
        let _guard = self.lock()?;
        let member = self
            .store
            .remove_member(id)?
            .ok_or_else(|| Error::NotFound(format!("member {id}")))?;
        self.emit(|| Change::Deleted(member.clone()));
        Ok(member)
    }

    // -------------------------------------------------------------------------
    // State changes
    // -------------------------------------------------------------------------

    /// Mark a member as arrived.
    pub fn check_in(&self, lookup: &Lookup, now: DateTime<Utc>) -> Result<Transition> {
        let _guard = self.lock()?;
        let member = self
            .find(lookup)?
            .ok_or_else(|| Error::NotFound(lookup.to_string()))?;
        self.check_in_locked(member, now)
    }

    /// Apply a state-machine action to a member.
    pub fn transition(
        &self,
        id: MemberId,
        action: MemberAction,
        now: DateTime<Utc>,
    ) -> Result<Transition> {
        let _guard = self.lock()?;
        let mut member = self.get(id)?;

        if action == MemberAction::CheckIn {
            let transition = self.check_in_locked(member, now)?;
            self.emit(|| Change::StateChanged(transition.clone()));
            return Ok(transition);
        }

        let from = member.state;
        let to = from.next(action)?;
        member.state = to;
        if action == MemberAction::Reset {
            member.checkin_time = None;
            member.lottery_number = None;
        }
        self.store.store_member(&member)?;
        let transition = Transition { member, from, to };
        self.emit(|| Change::StateChanged(transition.clone()));
        Ok(transition)
    }

    fn check_in_locked(&self, mut member: Member, now: DateTime<Utc>) -> Result<Transition> {
        let from = member.state;
        let to = if from.has_arrived() {
            if !self.policy.allow_repeat {
                return Err(Error::AlreadyCheckedIn {
                    who: member
                        .mssv
                        .clone()
                        .unwrap_or_else(|| format!("member {}", member.id)),
                });
            }
            from
        } else {
            from.next(MemberAction::CheckIn)?
        };

        member.state = to;
        member.checkin_time = Some(now);
        if self.policy.assign_lottery && member.lottery_number.is_none() {
            member.lottery_number = Some(self.store.next_sequence(Sequence::Lottery)?);
        }
        self.store.store_member(&member)?;
        let transition = Transition { member, from, to };
        self.emit(|| Change::CheckedIn(transition.clone()));
        Ok(transition)
    }

    /// Put every member back to `NotCheckedIn` and restart lottery numbering.
    pub fn reset_all(&self) -> Result<usize> {
        let _guard = self.lock()?;
        let mut count = 0;
        for mut member in self.store.load_members()? {
            if member.state == MemberState::NotCheckedIn
                && member.checkin_time.is_none()
                && member.lottery_number.is_none()
            {
                continue;
            }
            member.state = MemberState::NotCheckedIn;
            member.checkin_time = None;
            member.lottery_number = None;
            self.store.store_member(&member)?;
            count += 1;
        }
        self.store.reset_sequence(Sequence::Lottery)?;
        self.emit(|| Change::Reset { count });
        Ok(count)
    }

    // -------------------------------------------------------------------------
    // Bulk import
    // -------------------------------------------------------------------------

    /// Insert many drafts. Duplicates of an existing MSSV or card are skipped.
    /// Drafts without an MSSV are accepted.
    ///
    /// With `replace`, the member table is emptied first.
    pub fn import(&self, drafts: Vec<MemberDraft>, replace: bool) -> Result<ImportReport> {
        let _guard = self.lock()?;
        if replace {
            self.store.clear_members()?;
            self.store.reset_sequence(Sequence::Lottery)?;
        }

        let mut existing = self.store.load_members()?;
        let mut report = ImportReport::default();
        for draft in drafts {
            let draft = draft.validate_import()?;
            if ensure_unique(&existing, &draft, None).is_err() {
                report.skipped += 1;
                continue;
            }
            let id = MemberId(self.store.next_sequence(Sequence::Member)?);
            let member = Member::from_draft(id, draft);
            self.store.store_member(&member)?;
            existing.push(member);
            report.inserted += 1;
        }
        Ok(report)
    }

    // -------------------------------------------------------------------------
    // Users
    // -------------------------------------------------------------------------

    /// Create a staff account.
    pub fn register_user(&self, username: &str, password: &str, mssv: &str) -> Result<User> {
        validate_username(username)?;
        validate_password(password)?;
        let mssv = mssv.trim();
        if mssv.is_empty() {
            return Err(Error::Validation("MSSV is required".to_string()));
        }

        let _guard = self.lock()?;
        if self.store.load_user(username)?.is_some() {
            return Err(Error::Conflict("Username already exists".to_string()));
        }

        let user = User {
            username: username.to_string(),
            password: PasswordHash::derive_with(password, self.password_iterations)?,
            mssv: mssv.to_string(),
            created_at: Utc::now(),
        };
        self.store.store_user(&user)?;
        Ok(user)
    }

    /// Check a username/password pair.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<User> {
        match self.store.load_user(username)? {
            Some(user) if user.password.verify(password) => Ok(user),
            _ => Err(Error::InvalidCredentials),
        }
    }

    /// Number of staff accounts.
    pub fn user_count(&self) -> Result<usize> {
        self.store.user_count()
    }
}

fn ensure_unique(members: &[Member], draft: &MemberDraft, except: Option<MemberId>) -> Result<()> {
    for other in members.iter().filter(|m| Some(m.id) != except) {
        if let Some(mssv) = draft.mssv.as_deref() {
            if other.has_mssv(mssv) {
                return Err(Error::Conflict(format!(
                    "MSSV {mssv} already belongs to member {}",
                    other.id
                )));
            }
        }
        if let Some(card) = draft.id_card.as_deref() {
            if other.has_card(card) {
                return Err(Error::Conflict(format!(
                    "card {card} already belongs to member {}",
                    other.id
                )));
            }
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    fn roster() -> Roster {
        Roster::new(MemoryStore::new()).with_password_iterations(1_000)
    }

    fn roster_with(policy: CheckinPolicy) -> Roster {
        roster().with_policy(policy)
    }

    #[test]
    fn add_assigns_increasing_ids() {
        let roster = roster();
        let a = roster.add(MemberDraft::new("1", "A")).unwrap();
        let b = roster.add(MemberDraft::new("2", "B")).unwrap();
        assert_eq!(a.id, MemberId(1));
        assert_eq!(b.id, MemberId(2));
        assert_eq!(a.state, MemberState::NotCheckedIn);
    }

    #[test]
    fn add_rejects_duplicate_mssv_and_card() {
        let roster = roster();
        roster
            .add(MemberDraft::new("1", "A").with_id_card("CARD"))
            .unwrap();
        assert!(matches!(
            roster.add(MemberDraft::new(" 1 ", "B")),
            Err(Error::Conflict(_))
        ));
        assert!(matches!(
            roster.add(MemberDraft::new("2", "B").with_id_card("CARD")),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let roster = roster();
        let a = roster.add(MemberDraft::new("1", "A")).unwrap();
        roster.delete(a.id).unwrap();
        let b = roster.add(MemberDraft::new("1", "A")).unwrap();
        assert_eq!(b.id, MemberId(2));
    }

    #[test]
    fn edit_allows_keeping_own_mssv() {
        let roster = roster();
        let a = roster.add(MemberDraft::new("1", "A")).unwrap();
        roster.add(MemberDraft::new("2", "B")).unwrap();

        let edited = roster
            .edit(a.id, MemberDraft::new("1", "A renamed"))
            .unwrap();
        assert_eq!(edited.name, "A renamed");

        assert!(matches!(
            roster.edit(a.id, MemberDraft::new("2", "A")),
            Err(Error::Conflict(_))
        ));
        assert!(matches!(
            roster.edit(MemberId(99), MemberDraft::new("9", "Z")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn delete_missing_is_not_found() {
        assert!(matches!(
            roster().delete(MemberId(5)),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn check_in_by_mssv_and_card() {
        let roster = roster();
        roster.add(MemberDraft::new("1", "A")).unwrap();
        roster
            .add(MemberDraft::new("2", "B").with_id_card("04A1B2"))
            .unwrap();
        let now = Utc::now();

        let t = roster.check_in(&Lookup::Mssv("1".into()), now).unwrap();
        assert_eq!(t.from, MemberState::NotCheckedIn);
        assert_eq!(t.to, MemberState::CheckedIn);
        assert_eq!(t.member.checkin_time, Some(now));

        let t = roster
            .check_in(&Lookup::IdCard("04A1B2".into()), now)
            .unwrap();
        assert!(t.member.has_mssv("2"));

        assert!(matches!(
            roster.check_in(&Lookup::Mssv("404".into()), now),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn repeat_check_in_follows_policy() {
        let strict = roster();
        strict.add(MemberDraft::new("1", "A")).unwrap();
        let lookup = Lookup::Mssv("1".into());
        strict.check_in(&lookup, Utc::now()).unwrap();
        assert!(matches!(
            strict.check_in(&lookup, Utc::now()),
            Err(Error::AlreadyCheckedIn { .. })
        ));

        let lenient = roster_with(CheckinPolicy {
            allow_repeat: true,
            assign_lottery: false,
        });
        lenient.add(MemberDraft::new("1", "A")).unwrap();
        let first = lenient.check_in(&lookup, Utc::now()).unwrap();
        let later = Utc::now() + chrono::Duration::seconds(30);
        let second = lenient.check_in(&lookup, later).unwrap();
        assert_eq!(second.from, MemberState::CheckedIn);
        assert_eq!(second.to, MemberState::CheckedIn);
        assert!(second.member.checkin_time > first.member.checkin_time);
    }

    #[test]
    fn lottery_numbers_are_sequential_and_stable() {
        let roster = roster_with(CheckinPolicy {
            allow_repeat: true,
            assign_lottery: true,
        });
        roster.add(MemberDraft::new("1", "A")).unwrap();
        roster.add(MemberDraft::new("2", "B")).unwrap();
        let now = Utc::now();

        let b = roster.check_in(&Lookup::Mssv("2".into()), now).unwrap();
        let a = roster.check_in(&Lookup::Mssv("1".into()), now).unwrap();
        assert_eq!(b.member.lottery_number, Some(1));
        assert_eq!(a.member.lottery_number, Some(2));

        let again = roster.check_in(&Lookup::Mssv("2".into()), now).unwrap();
        assert_eq!(again.member.lottery_number, Some(1));
    }

    #[test]
    fn interview_flow_through_transition() {
        let roster = roster();
        let m = roster.add(MemberDraft::new("1", "A")).unwrap();
        let now = Utc::now();

        assert!(matches!(
            roster.transition(m.id, MemberAction::CallForInterview, now),
            Err(Error::InvalidTransition { .. })
        ));

        for (action, expected) in [
            (MemberAction::CheckIn, MemberState::CheckedIn),
            (MemberAction::CallForInterview, MemberState::CalledForInterview),
            (MemberAction::StartInterview, MemberState::Interviewing),
            (MemberAction::FinishInterview, MemberState::Interviewed),
        ] {
            let t = roster.transition(m.id, action, now).unwrap();
            assert_eq!(t.to, expected);
        }

        let reset = roster.transition(m.id, MemberAction::Reset, now).unwrap();
        assert_eq!(reset.from, MemberState::Interviewed);
        assert_eq!(reset.member.state, MemberState::NotCheckedIn);
        assert_eq!(reset.member.checkin_time, None);
    }

    #[test]
    fn reset_all_counts_touched_members() {
        let roster = roster_with(CheckinPolicy {
            allow_repeat: false,
            assign_lottery: true,
        });
        roster.add(MemberDraft::new("1", "A")).unwrap();
        roster.add(MemberDraft::new("2", "B")).unwrap();
        roster
            .check_in(&Lookup::Mssv("1".into()), Utc::now())
            .unwrap();

        assert_eq!(roster.reset_all().unwrap(), 1);
        assert!(
            roster
                .list()
                .unwrap()
                .iter()
                .all(|m| m.state == MemberState::NotCheckedIn && m.lottery_number.is_none())
        );

        let t = roster
            .check_in(&Lookup::Mssv("2".into()), Utc::now())
            .unwrap();
        assert_eq!(t.member.lottery_number, Some(1));
    }

    #[test]
    fn import_skips_duplicates_and_can_replace() {
        let roster = roster();
        roster.add(MemberDraft::new("1", "A")).unwrap();

        let drafts = vec![
            MemberDraft::new("1", "dup"),
            MemberDraft::new("2", "B"),
            MemberDraft::new("2", "dup again"),
        ];
        let report = roster.import(drafts.clone(), false).unwrap();
        assert_eq!(
            report,
            ImportReport {
                inserted: 1,
                skipped: 2
            }
        );

        let report = roster.import(drafts, true).unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(roster.list().unwrap().len(), 2);
    }

    #[test]
    fn register_and_authenticate() {
        let roster = roster();
        roster
            .register_user("staff", "password1", "2012345")
            .unwrap();

        assert!(matches!(
            roster.register_user("staff", "password2", "2012345"),
            Err(Error::Conflict(_))
        ));
        assert_eq!(roster.authenticate("staff", "password1").unwrap().mssv, "2012345");
        assert!(matches!(
            roster.authenticate("staff", "wrong-pass"),
            Err(Error::InvalidCredentials)
        ));
        assert!(matches!(
            roster.authenticate("ghost", "password1"),
            Err(Error::InvalidCredentials)
        ));
    }
    #[test]
    fn policy_is_kept_by_builder() {
        let policy = CheckinPolicy {
            allow_repeat: true,
            assign_lottery: false,
        };
        assert_eq!(roster_with(policy).policy(), policy);
        assert_eq!(roster().policy(), CheckinPolicy::default());
    }

    #[test]
    fn import_accepts_guests_without_mssv() {
        let roster = roster();
        let drafts = vec![
            MemberDraft::new("1", "Student"),
            MemberDraft::guest("Alumni One").with_id_card("CARD-1"),
            MemberDraft::guest("Alumni Two"),
        ];
        let report = roster.import(drafts, false).unwrap();
        assert_eq!(report.inserted, 3);

        let t = roster
            .check_in(&Lookup::IdCard("CARD-1".into()), Utc::now())
            .unwrap();
        assert_eq!(t.member.mssv, None);
        assert!(matches!(
            roster.check_in(&Lookup::IdCard("CARD-1".into()), Utc::now()),
            Err(Error::AlreadyCheckedIn { who }) if who == "member 2"
        ));

        // Guests stay editable without an MSSV; students cannot drop theirs.
        let edited = roster
            .edit(MemberId(3), MemberDraft::guest("Alumni Two renamed"))
            .unwrap();
        assert_eq!(edited.name, "Alumni Two renamed");
        assert!(matches!(
            roster.edit(MemberId(1), MemberDraft::guest("Student")),
            Err(Error::Validation(_))
        ));
        // Staff adds still need one.
        assert!(matches!(
            roster.add(MemberDraft::guest("Walk-in")),
            Err(Error::Validation(_))
        ));
    }

    fn recording(roster: Roster) -> (Roster, Arc<Mutex<Vec<Change>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let roster = roster.with_listener(move |change| sink.lock().unwrap().push(change.clone()));
        (roster, log)
    }

    #[test]
    fn listener_sees_every_write() {
        let (roster, log) = recording(roster());
        let m = roster.add(MemberDraft::new("1", "A")).unwrap();
        roster.edit(m.id, MemberDraft::new("1", "B")).unwrap();
        roster
            .transition(m.id, MemberAction::CheckIn, Utc::now())
            .unwrap();
        roster.reset_all().unwrap();
        roster.delete(m.id).unwrap();
        // Failed writes report nothing.
        assert!(roster.delete(m.id).is_err());

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 6);
        assert!(matches!(log[0], Change::Added(_)));
        assert!(matches!(&log[1], Change::Edited(m) if m.name == "B"));
        assert!(matches!(log[2], Change::CheckedIn(_)));
        assert!(matches!(log[3], Change::StateChanged(_)));
        assert!(matches!(log[4], Change::Reset { count: 1 }));
        assert!(matches!(log[5], Change::Deleted(_)));
    }

    #[test]
    fn listener_order_matches_commit_order() {
        let (roster, log) = recording(roster());
        let roster = Arc::new(roster);
        let id = roster.add(MemberDraft::new("1", "start")).unwrap().id;

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let roster = Arc::clone(&roster);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        roster
                            .edit(id, MemberDraft::new("1", format!("t{t}-{i}")))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stored = roster.get(id).unwrap();
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1 + 8 * 25);
        match log.last() {
            Some(Change::Edited(last)) => assert_eq!(*last, stored),
            other => panic!("unexpected last change {other:?}"),
        }
    }
}
