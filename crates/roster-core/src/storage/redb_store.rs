//! redb-backed store.
//!
//! Tables:
//! - `members`: `u64` id -> postcard-encoded [`Member`]
//! - `users`: username -> postcard-encoded [`User`]
//! - `sequences`: counter name -> last issued value
//!
//! Every trait method is one transaction, so a crash never leaves a
//! half-written row behind.

use super::{MemberStore, Sequence};
use crate::error::{Error, Result};
use crate::member::{Member, MemberId};
use crate::user::User;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

const MEMBERS: TableDefinition<u64, &[u8]> = TableDefinition::new("members");
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");
const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

/// Disk-backed store on a single redb file.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open the database at `path`, creating the file and tables if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path)?;

        // Materialize tables so read transactions never see them missing.
        let txn = db.begin_write()?;
        {
            txn.open_table(MEMBERS)?;
            txn.open_table(USERS)?;
            txn.open_table(SEQUENCES)?;
        }
        txn.commit()?;

        Ok(Self { db })
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(postcard::to_allocvec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    postcard::from_bytes(bytes).map_err(|e| Error::Corrupt(e.to_string()))
}

impl MemberStore for RedbStore {
    fn load_member(&self, id: MemberId) -> Result<Option<Member>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(MEMBERS)?;
        match table.get(id.0)? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    fn load_members(&self) -> Result<Vec<Member>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(MEMBERS)?;
        let mut members = Vec::with_capacity(table.len()? as usize);
        for entry in table.iter()? {
            let (_, value) = entry?;
            members.push(decode(value.value())?);
        }
        Ok(members)
    }

    fn store_member(&self, member: &Member) -> Result<()> {
        let bytes = encode(member)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(MEMBERS)?;
            table.insert(member.id.0, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn remove_member(&self, id: MemberId) -> Result<Option<Member>> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(MEMBERS)?;
            let guard = table.remove(id.0)?;
            match guard {
                Some(bytes) => Some(decode::<Member>(bytes.value())?),
                None => None,
            }
        };
        txn.commit()?;
        Ok(removed)
    }

    fn clear_members(&self) -> Result<usize> {
        let txn = self.db.begin_write()?;
        let count = {
            let mut table = txn.open_table(MEMBERS)?;
            let count = table.len()? as usize;
            table.retain(|_, _| false)?;
            count
        };
        txn.commit()?;
        Ok(count)
    }

    fn next_sequence(&self, sequence: Sequence) -> Result<u64> {
        let txn = self.db.begin_write()?;
        let next = {
            let mut table = txn.open_table(SEQUENCES)?;
            let current = table.get(sequence.key())?.map(|g| g.value()).unwrap_or(0);
            let next = current.saturating_add(1);
            table.insert(sequence.key(), next)?;
            next
        };
        txn.commit()?;
        Ok(next)
    }

    fn reset_sequence(&self, sequence: Sequence) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SEQUENCES)?;
            table.remove(sequence.key())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn load_user(&self, username: &str) -> Result<Option<User>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(USERS)?;
        match table.get(username)? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    fn store_user(&self, user: &User) -> Result<()> {
        let bytes = encode(user)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(USERS)?;
            table.insert(user.username.as_str(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn user_count(&self) -> Result<usize> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(USERS)?;
        Ok(table.len()? as usize)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::member::MemberDraft;
    use crate::state::MemberState;
    use crate::storage::contract;
    use chrono::Utc;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, RedbStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("roster.redb")).unwrap();
        (dir, store)
    }

    #[test]
    fn round_trips_members() {
        let (_dir, store) = open_temp();
        contract::round_trips_members(&store);
    }

    #[test]
    fn sequences_are_monotonic() {
        let (_dir, store) = open_temp();
        contract::sequences_are_monotonic(&store);
    }

    #[test]
    fn clear_keeps_ids_unique() {
        let (_dir, store) = open_temp();
        contract::clear_keeps_ids_unique(&store);
    }

    #[test]
    fn stores_users() {
        let (_dir, store) = open_temp();
        contract::stores_users(&store);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.redb");

        let mut member = Member::from_draft(MemberId(1), MemberDraft::new("2012345", "A"));
        member.state = MemberState::CheckedIn;
        member.checkin_time = Some(Utc::now());
        member.lottery_number = Some(4);
        {
            let store = RedbStore::open(&path).unwrap();
            store.store_member(&member).unwrap();
            store.next_sequence(Sequence::Member).unwrap();
        }

        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.load_member(MemberId(1)).unwrap(), Some(member));
        assert_eq!(store.next_sequence(Sequence::Member).unwrap(), 2);
    }
}
